use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use crate::detection::domain::face_detector::FaceDescriptorExtractor;

/// A face extractor together with the permits that bound concurrent
/// `detect` calls on it.
///
/// Clones share the extractor and the permits, so every use case built from
/// the same `SharedExtractor` draws from one gate.
#[derive(Clone)]
pub struct SharedExtractor {
    extractor: Arc<dyn FaceDescriptorExtractor>,
    permits: Arc<Semaphore>,
    width: usize,
}

impl SharedExtractor {
    /// `permits` below 1 is raised to 1.
    pub fn new(extractor: Arc<dyn FaceDescriptorExtractor>, permits: usize) -> Self {
        let width = permits.max(1);
        Self {
            extractor,
            permits: Arc::new(Semaphore::new(width)),
            width,
        }
    }

    pub fn extractor(&self) -> &Arc<dyn FaceDescriptorExtractor> {
        &self.extractor
    }

    /// Maximum number of concurrent `detect` calls.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        Arc::clone(&self.permits).acquire_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detector::{DetectError, FaceDetection};
    use crate::shared::canvas::CanonicalCanvas;

    struct NoFaceExtractor;

    impl FaceDescriptorExtractor for NoFaceExtractor {
        fn detect(&self, _canvas: &CanonicalCanvas) -> Result<Option<FaceDetection>, DetectError> {
            Ok(None)
        }
    }

    #[test]
    fn test_zero_permits_become_one() {
        let shared = SharedExtractor::new(Arc::new(NoFaceExtractor), 0);
        assert_eq!(shared.width(), 1);
        assert_eq!(shared.available_permits(), 1);
    }

    #[tokio::test]
    async fn test_clones_draw_from_the_same_permits() {
        let shared = SharedExtractor::new(Arc::new(NoFaceExtractor), 2);
        let other = shared.clone();

        let _held = shared.acquire().await.unwrap();

        assert_eq!(other.available_permits(), 1);
        assert!(Arc::ptr_eq(shared.extractor(), other.extractor()));
    }

    #[tokio::test]
    async fn test_permit_returns_on_drop() {
        let shared = SharedExtractor::new(Arc::new(NoFaceExtractor), 1);
        {
            let _held = shared.acquire().await.unwrap();
            assert_eq!(shared.available_permits(), 0);
        }
        assert_eq!(shared.available_permits(), 1);
    }
}
