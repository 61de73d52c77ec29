use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use crate::detection::domain::face_detector::{
    DetectError, FaceDescriptorExtractor, FaceDetection,
};
use crate::shared::canvas::CanonicalCanvas;

use super::arcface_embedder::{crop_window, ArcFaceEmbedder};
use super::yolo_face_locator::YoloFaceLocator;

/// Default minimum face score for the locator.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct ModelPaths {
    pub face_locator: PathBuf,
    pub face_embedding: PathBuf,
}

struct LoadedModels {
    locator: YoloFaceLocator,
    embedder: ArcFaceEmbedder,
}

/// ONNX-backed face pipeline: YOLO face-pose locator for the box and
/// landmarks, ArcFace for the descriptor.
///
/// Sessions are built on the first `ensure_ready` call and reused for every
/// later batch. A failed load is not cached, so the next batch retries.
pub struct OnnxDescriptorExtractor {
    paths: ModelPaths,
    confidence: f64,
    models: OnceLock<LoadedModels>,
    loading: Mutex<()>,
}

impl OnnxDescriptorExtractor {
    pub fn new(paths: ModelPaths, confidence: f64) -> Self {
        Self {
            paths,
            confidence,
            models: OnceLock::new(),
            loading: Mutex::new(()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.models.get().is_some()
    }

    fn load(&self) -> Result<LoadedModels, Box<dyn std::error::Error>> {
        let locator = YoloFaceLocator::new(&self.paths.face_locator, self.confidence)?;
        let embedder = ArcFaceEmbedder::new(&self.paths.face_embedding)?;
        Ok(LoadedModels { locator, embedder })
    }
}

impl FaceDescriptorExtractor for OnnxDescriptorExtractor {
    fn ensure_ready(&self) -> Result<(), DetectError> {
        if self.is_loaded() {
            return Ok(());
        }
        let _guard = self
            .loading
            .lock()
            .map_err(|e| format!("Lock poisoned: {e}"))?;
        if self.is_loaded() {
            return Ok(());
        }

        let models = self.load().map_err(|e| e.to_string())?;
        // Only the loading-lock holder sets the cell, so this cannot fail.
        let _ = self.models.set(models);
        Ok(())
    }

    fn detect(&self, canvas: &CanonicalCanvas) -> Result<Option<FaceDetection>, DetectError> {
        let models = self
            .models
            .get()
            .ok_or("Face models are not loaded")?;

        let located = models
            .locator
            .locate(canvas)
            .map_err(|e| format!("face detection failed: {e}"))?;
        let Some(face) = located else {
            return Ok(None);
        };

        let window = crop_window(&face.bbox, &face.landmarks, canvas.size());
        let descriptor = models
            .embedder
            .embed(canvas, window)
            .map_err(|e| format!("descriptor computation failed: {e}"))?;

        log::debug!(
            "Face at ({:.0}, {:.0}) score {:.2}, {} landmarks, descriptor len {}",
            face.bbox.x1,
            face.bbox.y1,
            face.score,
            face.landmarks.visible_count(),
            descriptor.len()
        );

        Ok(Some(FaceDetection {
            descriptor,
            landmarks: face.landmarks,
            bbox: face.bbox,
            score: face.score,
        }))
    }
}
