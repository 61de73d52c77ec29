use image::RgbImage;
use ndarray::ArrayView3;

const CHANNELS: usize = 3;

/// The fixed-size square RGB image every photo is normalized into before
/// detection: contiguous bytes in row-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalCanvas {
    data: Vec<u8>,
    size: u32,
}

impl CanonicalCanvas {
    pub fn new(data: Vec<u8>, size: u32) -> Self {
        debug_assert_eq!(
            data.len(),
            (size as usize) * (size as usize) * CHANNELS,
            "data length must equal size * size * 3"
        );
        Self { data, size }
    }

    /// A canvas painted entirely with `color`.
    pub fn filled(size: u32, color: [u8; 3]) -> Self {
        let pixels = (size as usize) * (size as usize);
        let mut data = Vec::with_capacity(pixels * CHANNELS);
        for _ in 0..pixels {
            data.extend_from_slice(&color);
        }
        Self { data, size }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = ((y as usize) * (self.size as usize) + x as usize) * CHANNELS;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        let edge = self.size as usize;
        ArrayView3::from_shape((edge, edge, CHANNELS), &self.data)
            .expect("Canvas data length must match dimensions")
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_raw(self.size, self.size, self.data.clone())
            .expect("Canvas data length must match dimensions")
    }
}

impl From<RgbImage> for CanonicalCanvas {
    /// Non-square images are not canvases; callers only convert the
    /// normalizer's own output.
    fn from(image: RgbImage) -> Self {
        debug_assert_eq!(image.width(), image.height(), "canvas must be square");
        let size = image.width();
        Self::new(image.into_raw(), size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![7u8; 12]; // 2x2x3
        let canvas = CanonicalCanvas::new(data.clone(), 2);
        assert_eq!(canvas.size(), 2);
        assert_eq!(canvas.data(), &data[..]);
    }

    #[test]
    fn test_filled_paints_every_pixel() {
        let canvas = CanonicalCanvas::filled(4, [10, 20, 30]);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(canvas.pixel(x, y), [10, 20, 30]);
            }
        }
    }

    #[test]
    #[should_panic(expected = "data length must equal size * size * 3")]
    fn test_mismatched_data_length_panics_in_debug() {
        CanonicalCanvas::new(vec![0u8; 10], 2);
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        // 2x2 RGB: set pixel (row=1, col=0) to red
        let mut data = vec![0u8; 12];
        data[6] = 255;
        let canvas = CanonicalCanvas::new(data, 2);
        let arr = canvas.as_ndarray();
        assert_eq!(arr.shape(), &[2, 2, 3]);
        assert_eq!(arr[[1, 0, 0]], 255);
        assert_eq!(arr[[1, 0, 1]], 0);
        assert_eq!(canvas.pixel(0, 1), [255, 0, 0]);
    }

    #[test]
    fn test_rgb_image_conversion_keeps_pixels() {
        let canvas = CanonicalCanvas::filled(3, [1, 2, 3]);
        let image = canvas.to_rgb_image();
        assert_eq!(image.dimensions(), (3, 3));
        assert_eq!(CanonicalCanvas::from(image), canvas);
    }
}
