use thiserror::Error;

use crate::shared::canvas::CanonicalCanvas;
use crate::shared::source_image::SourceImage;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{name}: {message}")]
    Decode { name: String, message: String },
}

impl NormalizeError {
    pub fn decode(source: &SourceImage, message: impl Into<String>) -> Self {
        NormalizeError::Decode {
            name: source.name().to_string(),
            message: message.into(),
        }
    }

    /// The failure detail without the filename prefix.
    pub fn message(&self) -> &str {
        match self {
            NormalizeError::Decode { message, .. } => message,
        }
    }
}

/// Domain interface for turning an arbitrary photo into a canonical canvas.
///
/// Implementations hold no per-call state, so one instance may normalize
/// several photos of a batch concurrently.
pub trait ImageNormalizer: Send + Sync {
    fn normalize(&self, source: &SourceImage) -> Result<CanonicalCanvas, NormalizeError>;
}

/// Destination rectangle of the scaled photo inside the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Aspect-fit `src_w` x `src_h` into a `target` square, centered.
///
/// The longer side spans the whole canvas; the shorter one is rounded and
/// never collapses below one pixel. Odd margins put the extra pixel on the
/// leading (top/left) side.
/// A `target` of 0 is treated as 1.
pub fn letterbox_placement(src_w: u32, src_h: u32, target: u32) -> Placement {
    debug_assert!(src_w > 0 && src_h > 0, "source dimensions must be non-zero");
    let target = target.max(1);
    let ratio = src_w as f64 / src_h as f64;
    let size = target as f64;

    let (width, height) = if src_w > src_h {
        (target, scaled_side(size / ratio, target))
    } else if src_h > src_w {
        (scaled_side(size * ratio, target), target)
    } else {
        (target, target)
    };

    Placement {
        x: centered_offset(target, width),
        y: centered_offset(target, height),
        width,
        height,
    }
}

fn scaled_side(exact: f64, target: u32) -> u32 {
    (exact.round() as u32).clamp(1, target)
}

fn centered_offset(target: u32, extent: u32) -> u32 {
    ((target - extent) as f64 / 2.0).round() as u32
}
