pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Edge length of the canonical canvas fed to the detection pipeline.
pub const DEFAULT_CANVAS_SIZE: u32 = 256;

/// Letterbox fill. White avoids transparent sources turning black.
pub const DEFAULT_FILL_COLOR: [u8; 3] = [255, 255, 255];

/// Upper bound on photos per batch, enforced by callers.
pub const MAX_BATCH_SIZE: usize = 3;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp", "gif"];
