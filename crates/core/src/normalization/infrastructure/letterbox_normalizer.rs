use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use crate::normalization::domain::image_normalizer::{
    letterbox_placement, ImageNormalizer, NormalizeError,
};
use crate::shared::canvas::CanonicalCanvas;
use crate::shared::constants::{DEFAULT_CANVAS_SIZE, DEFAULT_FILL_COLOR};
use crate::shared::source_image::SourceImage;

/// Decodes with the `image` crate and letterboxes into a square canvas.
///
/// Scaling uses a triangle (bilinear) filter. Transparent source pixels are
/// composited over the fill color, so margins and transparent regions look
/// the same to the detector.
pub struct LetterboxNormalizer {
    size: u32,
    fill: [u8; 3],
}

impl LetterboxNormalizer {
    /// A `size` of 0 is raised to 1; `ExtractionConfig::validate` rejects it earlier.
    pub fn new(size: u32, fill: [u8; 3]) -> Self {
        Self {
            size: size.max(1),
            fill,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn fill(&self) -> [u8; 3] {
        self.fill
    }
}

impl Default for LetterboxNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_CANVAS_SIZE, DEFAULT_FILL_COLOR)
    }
}

impl ImageNormalizer for LetterboxNormalizer {
    fn normalize(&self, source: &SourceImage) -> Result<CanonicalCanvas, NormalizeError> {
        if source.is_empty() {
            return Err(NormalizeError::decode(source, "file is empty"));
        }

        // The decoded buffer lives only inside this block.
        let (scaled, placement) = {
            let decoded = decode(source)?;
            let (width, height) = decoded.dimensions();
            if width == 0 || height == 0 {
                return Err(NormalizeError::decode(
                    source,
                    format!("image has zero dimension ({width}x{height})"),
                ));
            }
            let placement = letterbox_placement(width, height, self.size);
            let scaled = imageops::resize(
                &decoded.to_rgba8(),
                placement.width,
                placement.height,
                FilterType::Triangle,
            );
            (scaled, placement)
        };

        let [r, g, b] = self.fill;
        let mut canvas = RgbaImage::from_pixel(self.size, self.size, Rgba([r, g, b, 255]));
        imageops::overlay(&mut canvas, &scaled, placement.x as i64, placement.y as i64);

        log::debug!(
            "Normalized {} into {}x{} at ({}, {})",
            source.name(),
            placement.width,
            placement.height,
            placement.x,
            placement.y
        );

        Ok(CanonicalCanvas::from(DynamicImage::ImageRgba8(canvas).to_rgb8()))
    }
}

fn decode(source: &SourceImage) -> Result<DynamicImage, NormalizeError> {
    image::load_from_memory(source.bytes())
        .map_err(|e| NormalizeError::decode(source, format!("failed to load image: {e}")))
}
