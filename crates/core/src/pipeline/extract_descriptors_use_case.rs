use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;

use crate::normalization::domain::image_normalizer::{ImageNormalizer, NormalizeError};
use crate::normalization::infrastructure::letterbox_normalizer::LetterboxNormalizer;
use crate::pipeline::batch_result::{BatchError, BatchResult, BatchStatus, FailureRecord};
use crate::pipeline::extraction_config::{ConfigError, ExtractionConfig};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::shared_extractor::SharedExtractor;
use crate::shared::canvas::CanonicalCanvas;
use crate::shared::descriptor::Descriptor;
use crate::shared::source_image::SourceImage;

/// `None` when the batch was cancelled before the normalization started.
type NormalizeOutcome = Option<(Result<CanonicalCanvas, NormalizeError>, f64)>;

struct PendingCanvas {
    source: String,
    task: JoinHandle<NormalizeOutcome>,
}

/// Batch pipeline: normalize → detect → collect descriptors.
///
/// Normalization of every image is started up front on the blocking pool.
/// Results are consumed in input order and each canvas goes through the
/// shared extractor, whose permits bound how many detect calls run at once
/// across every batch using it. A bad image becomes a `FailureRecord`; only
/// a model load failure or a batch with no descriptors at all is an error.
pub struct ExtractDescriptorsUseCase {
    normalizer: Arc<dyn ImageNormalizer>,
    extractor: SharedExtractor,
    logger: Box<dyn PipelineLogger>,
}

impl ExtractDescriptorsUseCase {
    pub fn new(
        normalizer: Arc<dyn ImageNormalizer>,
        extractor: SharedExtractor,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            normalizer,
            extractor,
            logger,
        }
    }

    /// Builds the use case with a `LetterboxNormalizer` configured from `config`.
    pub fn from_config(
        config: &ExtractionConfig,
        extractor: SharedExtractor,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let normalizer = LetterboxNormalizer::new(config.canvas_size, config.fill_color);
        Ok(Self::new(Arc::new(normalizer), extractor, logger))
    }

    /// Runs one batch. Setting `cancelled` stops the batch before the next
    /// image and returns what was collected so far as a `Cancelled` result.
    /// Work already running on the blocking pool finishes but its output is
    /// dropped.
    pub async fn execute(
        &mut self,
        images: Vec<SourceImage>,
        cancelled: &Arc<AtomicBool>,
    ) -> Result<BatchResult, BatchError> {
        let total = images.len();
        if total == 0 {
            log::warn!("Empty batch submitted");
            return Err(BatchError::NoFaceDetected {
                failures: Vec::new(),
            });
        }

        self.ensure_ready().await?;
        self.logger
            .info(&format!("Extracting descriptors from {total} images"));

        let mut pending: VecDeque<PendingCanvas> = images
            .into_iter()
            .map(|image| self.spawn_normalize(image, Arc::clone(cancelled)))
            .collect();

        let mut descriptors = Vec::new();
        let mut failures = Vec::new();
        let mut status = BatchStatus::Complete;
        let mut done = 0;

        while let Some(next) = pending.pop_front() {
            let outcome = if cancelled.load(Ordering::Relaxed) {
                None
            } else {
                self.process(next, cancelled).await
            };

            let Some(outcome) = outcome else {
                // Not-yet-started normalizations see the flag and skip.
                pending.drain(..).for_each(|p| p.task.abort());
                status = BatchStatus::Cancelled;
                log::info!("Extraction cancelled after {done}/{total} images");
                break;
            };

            match outcome {
                Ok(descriptor) => {
                    self.logger
                        .metric("descriptor_len", descriptor.len() as f64);
                    descriptors.push(descriptor);
                }
                Err(failure) => {
                    log::warn!("{}", failure.message());
                    failures.push(failure);
                }
            }
            done += 1;
            self.logger.progress(done, total);
        }

        self.logger.info(&format!(
            "Extracted {} descriptors, {} failures",
            descriptors.len(),
            failures.len()
        ));
        self.logger.summary();

        if status == BatchStatus::Complete && descriptors.is_empty() {
            return Err(BatchError::NoFaceDetected { failures });
        }
        Ok(BatchResult::new(descriptors, failures, status))
    }

    async fn ensure_ready(&mut self) -> Result<(), BatchError> {
        let extractor = Arc::clone(self.extractor.extractor());
        let started = Instant::now();
        let outcome =
            tokio::task::spawn_blocking(move || extractor.ensure_ready().map_err(|e| e.to_string()))
                .await;

        match outcome {
            Ok(Ok(())) => {
                self.logger.timing("model_init", elapsed_ms(started));
                Ok(())
            }
            Ok(Err(message)) => {
                log::error!("Face models failed to initialize: {message}");
                Err(BatchError::ModelInitFailed(message))
            }
            Err(e) => Err(BatchError::ModelInitFailed(format!(
                "model initialization task failed: {e}"
            ))),
        }
    }

    fn spawn_normalize(&self, image: SourceImage, cancelled: Arc<AtomicBool>) -> PendingCanvas {
        let normalizer = Arc::clone(&self.normalizer);
        let source = image.name().to_string();
        let task = tokio::task::spawn_blocking(move || {
            if cancelled.load(Ordering::Relaxed) {
                return None;
            }
            let started = Instant::now();
            let result = normalizer.normalize(&image);
            Some((result, elapsed_ms(started)))
        });
        PendingCanvas { source, task }
    }

    /// `None` means the batch was cancelled before this image reached a verdict.
    async fn process(
        &mut self,
        pending: PendingCanvas,
        cancelled: &AtomicBool,
    ) -> Option<Result<Descriptor, FailureRecord>> {
        let PendingCanvas { source, task } = pending;

        let canvas = match task.await {
            Ok(Some((Ok(canvas), ms))) => {
                self.logger.timing("normalize", ms);
                canvas
            }
            Ok(Some((Err(e), _))) => {
                return Some(Err(FailureRecord::decode_failed(source, e.message())))
            }
            Ok(None) => return None,
            Err(e) => {
                return Some(Err(FailureRecord::decode_failed(
                    source,
                    format!("normalization task failed: {e}"),
                )))
            }
        };

        let permit = match self.extractor.acquire().await {
            Ok(permit) => permit,
            Err(e) => return Some(Err(FailureRecord::extraction_error(source, e.to_string()))),
        };
        if cancelled.load(Ordering::Relaxed) {
            return None;
        }

        let extractor = Arc::clone(self.extractor.extractor());
        let started = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            extractor.detect(&canvas)
        })
        .await;
        self.logger.timing("detect", elapsed_ms(started));

        Some(match outcome {
            Ok(Ok(Some(detection))) => Ok(detection.descriptor),
            Ok(Ok(None)) => Err(FailureRecord::no_face(source)),
            Ok(Err(e)) => Err(FailureRecord::extraction_error(source, e.to_string())),
            Err(e) => Err(FailureRecord::extraction_error(
                source,
                format!("detection task failed: {e}"),
            )),
        })
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
