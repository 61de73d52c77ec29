pub mod arcface_embedder;
pub mod execution_provider;
pub mod model_resolver;
pub mod onnx_descriptor_extractor;
pub mod yolo_face_locator;
