//! ArcFace descriptor computation using ONNX Runtime.
//!
//! Crops a square around the face, resizes to 112x112 and L2-normalizes the
//! model output so descriptors compare by dot product.
use std::path::Path;
use std::sync::Mutex;

use crate::detection::domain::face_detector::FaceBox;
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::canvas::CanonicalCanvas;
use crate::shared::descriptor::{l2_normalize, Descriptor};

use super::execution_provider::{build_session, ensure_outputs};

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

/// Canvas region handed to the embedder, clamped to canvas bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropWindow {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

pub struct ArcFaceEmbedder {
    session: Mutex<ort::session::Session>,
}

impl ArcFaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: Mutex::new(build_session(model_path)?),
        })
    }

    pub fn embed(
        &self,
        canvas: &CanonicalCanvas,
        window: CropWindow,
    ) -> Result<Descriptor, Box<dyn std::error::Error>> {
        if window.is_empty() {
            return Err(format!("Face crop is empty: {window:?}").into());
        }
        let tensor = preprocess(canvas, window);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input_value])?;
        ensure_outputs(outputs.len(), "ArcFace")?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        let mut embedding = embedding_slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(Descriptor::new(embedding))
    }
}

/// Square crop centered on the landmark centroid (box center when no
/// landmark is visible), sized by the longer box side.
pub fn crop_window(bbox: &FaceBox, landmarks: &FaceLandmarks, canvas_size: u32) -> CropWindow {
    let (cx, cy) = landmarks.center().unwrap_or_else(|| bbox.center());
    let half = (bbox.width().max(bbox.height()) / 2.0).max(1.0);
    let limit = canvas_size as f64;

    let x1 = (cx - half).clamp(0.0, limit);
    let y1 = (cy - half).clamp(0.0, limit);
    let x2 = (cx + half).clamp(0.0, limit);
    let y2 = (cy + half).clamp(0.0, limit);

    CropWindow {
        x: x1.round() as u32,
        y: y1.round() as u32,
        width: (x2.round() - x1.round()) as u32,
        height: (y2.round() - y1.round()) as u32,
    }
}

/// Resize the crop to 112x112, normalize, NCHW layout.
fn preprocess(canvas: &CanonicalCanvas, window: CropWindow) -> ndarray::Array4<f32> {
    let src = canvas.as_ndarray();
    let crop_w = window.width as f64;
    let crop_h = window.height as f64;
    let max_x = (window.x + window.width - 1) as usize;
    let max_y = (window.y + window.height - 1) as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));

    for y in 0..INPUT_SIZE {
        let src_y = (window.y as usize
            + ((y as f64 + 0.5) * crop_h / INPUT_SIZE as f64) as usize)
            .min(max_y);
        for x in 0..INPUT_SIZE {
            let src_x = (window.x as usize
                + ((x as f64 + 0.5) * crop_w / INPUT_SIZE as f64) as usize)
                .min(max_x);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_box(x1: f64, y1: f64, x2: f64, y2: f64) -> FaceBox {
        FaceBox { x1, y1, x2, y2 }
    }

    fn no_landmarks() -> FaceLandmarks {
        FaceLandmarks::new([(0.0, 0.0); 5])
    }

    #[test]
    fn test_crop_window_centered_on_box_without_landmarks() {
        let w = crop_window(&face_box(100.0, 100.0, 140.0, 140.0), &no_landmarks(), 256);
        assert_eq!(
            w,
            CropWindow {
                x: 100,
                y: 100,
                width: 40,
                height: 40
            }
        );
    }

    #[test]
    fn test_crop_window_uses_longer_side() {
        // 10x30 box centered at (45, 50)
        let w = crop_window(&face_box(40.0, 35.0, 50.0, 65.0), &no_landmarks(), 256);
        assert_eq!(w.width, 30);
        assert_eq!(w.height, 30);
        assert_eq!((w.x, w.y), (30, 35));
    }

    #[test]
    fn test_crop_window_follows_landmark_centroid() {
        let mut pts = [(0.0, 0.0); 5];
        pts[2] = (130.0, 110.0);
        let w = crop_window(
            &face_box(100.0, 100.0, 140.0, 140.0),
            &FaceLandmarks::new(pts),
            256,
        );
        assert_eq!((w.x, w.y), (110, 90));
    }

    #[test]
    fn test_crop_window_clamps_to_canvas() {
        let w = crop_window(&face_box(230.0, 230.0, 270.0, 270.0), &no_landmarks(), 256);
        assert_eq!((w.x, w.y), (230, 230));
        assert_eq!((w.width, w.height), (26, 26));
    }

    #[test]
    fn test_crop_window_off_canvas_is_empty() {
        let w = crop_window(&face_box(300.0, 300.0, 340.0, 340.0), &no_landmarks(), 256);
        assert!(w.is_empty());
    }

    #[test]
    fn test_preprocess_shape() {
        let canvas = CanonicalCanvas::filled(64, [128, 128, 128]);
        let tensor = preprocess(
            &canvas,
            CropWindow {
                x: 8,
                y: 8,
                width: 40,
                height: 40,
            },
        );
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_normalization_range() {
        let canvas = CanonicalCanvas::filled(16, [255, 0, 127]);
        let tensor = preprocess(
            &canvas,
            CropWindow {
                x: 0,
                y: 0,
                width: 16,
                height: 16,
            },
        );
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
        assert!((tensor[[0, 1, 0, 0]] - (-1.0)).abs() < 0.01);
        let expected = (127.0 - 127.5) / 127.5;
        assert!((tensor[[0, 2, 111, 111]] - expected).abs() < 0.01);
    }

    #[test]
    fn test_preprocess_reads_only_crop_region() {
        // Left half black, right half white; crop the right half only
        let mut data = Vec::new();
        for _y in 0..32 {
            for x in 0..32 {
                let v = if x < 16 { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let canvas = CanonicalCanvas::new(data, 32);
        let tensor = preprocess(
            &canvas,
            CropWindow {
                x: 16,
                y: 0,
                width: 16,
                height: 32,
            },
        );
        assert!(tensor.iter().all(|v| (*v - 1.0).abs() < 0.01));
    }
}
