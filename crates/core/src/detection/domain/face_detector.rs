use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::canvas::CanonicalCanvas;
use crate::shared::descriptor::Descriptor;

pub type DetectError = Box<dyn std::error::Error + Send + Sync>;

/// Axis-aligned face box in canvas pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl FaceBox {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// Output of the detect -> landmarks -> descriptor chain for one face.
#[derive(Clone, Debug)]
pub struct FaceDetection {
    pub descriptor: Descriptor,
    pub landmarks: FaceLandmarks,
    pub bbox: FaceBox,
    pub score: f64,
}

/// Domain interface for the model-backed face pipeline.
///
/// `detect` runs single-face detection, landmark localization and descriptor
/// computation as one call. `Ok(None)` means the models ran and found no face.
/// Implementations must tolerate concurrent calls; callers decide how many
/// are allowed in flight.
pub trait FaceDescriptorExtractor: Send + Sync {
    /// Backend selection and model loading. Called once per batch before any
    /// image is processed; an error here aborts the batch.
    fn ensure_ready(&self) -> Result<(), DetectError> {
        Ok(())
    }

    fn detect(&self, canvas: &CanonicalCanvas) -> Result<Option<FaceDetection>, DetectError>;
}
