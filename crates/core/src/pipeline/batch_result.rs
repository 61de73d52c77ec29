use std::fmt;

use thiserror::Error;

use crate::shared::descriptor::Descriptor;

/// Why a single photo produced no descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    DecodeFailed,
    NoFaceDetected,
    ExtractionError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::DecodeFailed => write!(f, "decode failed"),
            FailureReason::NoFaceDetected => write!(f, "no face detected"),
            FailureReason::ExtractionError => write!(f, "extraction error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureRecord {
    pub source: String,
    pub reason: FailureReason,
    pub detail: Option<String>,
}

impl FailureRecord {
    pub fn decode_failed(source: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason: FailureReason::DecodeFailed,
            detail: Some(detail.into()),
        }
    }

    pub fn no_face(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason: FailureReason::NoFaceDetected,
            detail: None,
        }
    }

    pub fn extraction_error(source: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason: FailureReason::ExtractionError,
            detail: Some(detail.into()),
        }
    }

    /// One-line, user-facing description of the failure.
    pub fn message(&self) -> String {
        match (&self.reason, &self.detail) {
            (FailureReason::NoFaceDetected, _) => format!("No face detected in {}", self.source),
            (reason, Some(detail)) => match single_line(detail) {
                flat if flat.is_empty() => format!("{}: {reason}", self.source),
                flat => format!("{}: {flat}", self.source),
            },
            (reason, None) => format!("{}: {reason}", self.source),
        }
    }
}

/// Joins the non-blank lines of `text` with "; ".
fn single_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchStatus {
    Complete,
    /// Stopped early; only the images before the cancellation point were processed.
    Cancelled,
}

/// Descriptors and failures of one submitted batch, both in input order.
#[derive(Clone, Debug)]
pub struct BatchResult {
    descriptors: Vec<Descriptor>,
    failures: Vec<FailureRecord>,
    status: BatchStatus,
}

impl BatchResult {
    pub(crate) fn new(
        descriptors: Vec<Descriptor>,
        failures: Vec<FailureRecord>,
        status: BatchStatus,
    ) -> Self {
        Self {
            descriptors,
            failures,
            status,
        }
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BatchStatus::Cancelled
    }

    /// Number of images that reached a verdict.
    pub fn processed(&self) -> usize {
        self.descriptors.len() + self.failures.len()
    }

    pub fn into_parts(self) -> (Vec<Descriptor>, Vec<FailureRecord>) {
        (self.descriptors, self.failures)
    }
}

/// Failures that end a batch without a usable result.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("No valid face descriptors extracted.{}", detail_suffix(.failures))]
    NoFaceDetected { failures: Vec<FailureRecord> },
    #[error("Face models failed to initialize: {0}")]
    ModelInitFailed(String),
}

impl BatchError {
    /// Newline-joined per-image failure messages; empty when there are none.
    pub fn detail(&self) -> String {
        match self {
            BatchError::NoFaceDetected { failures } => failure_lines(failures),
            BatchError::ModelInitFailed(message) => message.clone(),
        }
    }
}

fn failure_lines(failures: &[FailureRecord]) -> String {
    failures
        .iter()
        .map(FailureRecord::message)
        .collect::<Vec<_>>()
        .join("\n")
}

fn detail_suffix(failures: &[FailureRecord]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!("\n{}", failure_lines(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_face_message_names_file() {
        assert_eq!(
            FailureRecord::no_face("me.jpg").message(),
            "No face detected in me.jpg"
        );
    }

    #[test]
    fn test_detail_message_is_prefixed_with_file() {
        let record = FailureRecord::decode_failed("bad.png", "failed to load image");
        assert_eq!(record.message(), "bad.png: failed to load image");
        assert_eq!(record.reason, FailureReason::DecodeFailed);
    }

    #[test]
    fn test_missing_detail_falls_back_to_reason() {
        let record = FailureRecord {
            source: "x.png".into(),
            reason: FailureReason::ExtractionError,
            detail: None,
        };
        assert_eq!(record.message(), "x.png: extraction error");
    }

    #[test]
    fn test_multiline_detail_is_flattened_to_one_line() {
        let record = FailureRecord::extraction_error(
            "x.png",
            "onnx runtime error\n  caused by: bad shape\n",
        );
        assert_eq!(record.message(), "x.png: onnx runtime error; caused by: bad shape");
    }

    #[test]
    fn test_blank_detail_falls_back_to_reason() {
        let record = FailureRecord::extraction_error("x.png", " \n\n");
        assert_eq!(record.message(), "x.png: extraction error");
    }

    #[test]
    fn test_batch_error_detail_has_one_line_per_failure() {
        let err = BatchError::NoFaceDetected {
            failures: (0..3)
                .map(|i| {
                    FailureRecord::extraction_error(
                        format!("{i}.png"),
                        "onnx runtime error\n  caused by: bad shape",
                    )
                })
                .collect(),
        };
        assert_eq!(err.detail().lines().count(), 3);
    }

    #[test]
    fn test_batch_result_counts_processed() {
        let result = BatchResult::new(
            vec![Descriptor::new(vec![1.0])],
            vec![FailureRecord::no_face("b.png")],
            BatchStatus::Complete,
        );
        assert_eq!(result.processed(), 2);
        assert!(!result.is_cancelled());
        let (descriptors, failures) = result.into_parts();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn test_no_face_error_detail_has_one_line_per_failure() {
        let err = BatchError::NoFaceDetected {
            failures: vec![
                FailureRecord::no_face("a.jpg"),
                FailureRecord::decode_failed("b.jpg", "file is empty"),
            ],
        };
        assert_eq!(err.detail(), "No face detected in a.jpg\nb.jpg: file is empty");
        assert_eq!(
            err.to_string(),
            "No valid face descriptors extracted.\nNo face detected in a.jpg\nb.jpg: file is empty"
        );
    }

    #[test]
    fn test_no_face_error_without_failures_has_empty_detail() {
        let err = BatchError::NoFaceDetected { failures: vec![] };
        assert_eq!(err.detail(), "");
        assert_eq!(err.to_string(), "No valid face descriptors extracted.");
    }
}
