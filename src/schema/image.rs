//! Raw source image type.

use serde::{Deserialize, Serialize};

use super::Color;

/// Bytes per pixel of the only supported color depth (24-bit RGB).
pub const BYTES_PER_PIXEL: usize = 3;

/// A packed, top-down, 24-bit RGB raster.
///
/// Rows are stored top to bottom, pixels left to right, three bytes
/// (`r`, `g`, `b`) per pixel, with no row padding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRgbImage")]
pub struct RgbImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

/// Unchecked serialized form of [`RgbImage`].
#[derive(Deserialize)]
struct RawRgbImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl TryFrom<RawRgbImage> for RgbImage {
    type Error = ImageError;

    fn try_from(raw: RawRgbImage) -> Result<Self, Self::Error> {
        Self::new(raw.width, raw.height, raw.data)
    }
}

impl RgbImage {
    /// Build an image from packed RGB data (`width * height * 3` bytes).
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, ImageError> {
        Self::from_rows(width, height, width.saturating_mul(BYTES_PER_PIXEL), data)
    }

    /// Build an image from RGB rows laid out with an arbitrary stride.
    ///
    /// Padding bytes at the end of each row are dropped. When the stride is
    /// already packed the buffer is adopted without copying.
    pub fn from_rows(
        width: usize,
        height: usize,
        stride: usize,
        mut data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::EmptyImage);
        }
        let row_len = width.saturating_mul(BYTES_PER_PIXEL);
        if stride < row_len {
            return Err(ImageError::StrideTooSmall { stride, row_len });
        }
        let required = stride.saturating_mul(height - 1).saturating_add(row_len);
        if data.len() < required {
            return Err(ImageError::BufferTooSmall {
                expected: required,
                actual: data.len(),
            });
        }

        if stride != row_len {
            for row in 1..height {
                data.copy_within(row * stride..row * stride + row_len, row * row_len);
            }
        }
        data.truncate(row_len * height);

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Solid image filled with one color.
    pub fn filled(width: usize, height: usize, color: Color) -> Self {
        let mut data = Vec::with_capacity(width * height * BYTES_PER_PIXEL);
        for _ in 0..width * height {
            data.extend_from_slice(&[color.r, color.g, color.b]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Packed RGB bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// One packed row.
    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        let row_len = self.width * BYTES_PER_PIXEL;
        &self.data[row * row_len..(row + 1) * row_len]
    }

    #[inline]
    pub fn pixel(&self, col: usize, row: usize) -> Color {
        let i = (row * self.width + col) * BYTES_PER_PIXEL;
        Color::new(self.data[i], self.data[i + 1], self.data[i + 2])
    }

    #[inline]
    pub fn set_pixel(&mut self, col: usize, row: usize, color: Color) {
        let i = (row * self.width + col) * BYTES_PER_PIXEL;
        self.data[i] = color.r;
        self.data[i + 1] = color.g;
        self.data[i + 2] = color.b;
    }
}

/// Raw pixel buffer contract violations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image dimensions must be non-zero")]
    EmptyImage,
    #[error("Row stride {stride} is shorter than a packed row ({row_len} bytes)")]
    StrideTooSmall { stride: usize, row_len: usize },
    #[error("Pixel buffer too small: expected at least {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_buffer_is_adopted() {
        let data = vec![1, 2, 3, 4, 5, 6];
        let image = RgbImage::new(2, 1, data).unwrap();
        assert_eq!(image.pixel(1, 0), Color::new(4, 5, 6));
    }

    #[test]
    fn test_padded_rows_are_normalized() {
        // 1x2 image with stride 4 (one padding byte per row)
        let data = vec![10, 20, 30, 0, 40, 50, 60, 0];
        let image = RgbImage::from_rows(1, 2, 4, data).unwrap();
        assert_eq!(image.data(), &[10, 20, 30, 40, 50, 60]);
        assert_eq!(image.pixel(0, 1), Color::new(40, 50, 60));
    }

    #[test]
    fn test_last_row_padding_optional() {
        let data = vec![1, 2, 3, 0, 4, 5, 6];
        let image = RgbImage::from_rows(1, 2, 4, data).unwrap();
        assert_eq!(image.row(1), &[4, 5, 6]);
    }

    #[test]
    fn test_rejects_bad_buffers() {
        assert!(matches!(
            RgbImage::new(0, 3, vec![]),
            Err(ImageError::EmptyImage)
        ));
        assert!(matches!(
            RgbImage::from_rows(2, 1, 5, vec![0; 6]),
            Err(ImageError::StrideTooSmall { .. })
        ));
        assert!(matches!(
            RgbImage::new(2, 2, vec![0; 11]),
            Err(ImageError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_filled_and_set_pixel() {
        let mut image = RgbImage::filled(3, 2, Color::new(255, 0, 0));
        assert_eq!(image.pixel_count(), 6);
        assert_eq!(image.pixel(2, 1), Color::new(255, 0, 0));
        image.set_pixel(2, 1, Color::BLACK);
        assert_eq!(image.pixel(2, 1), Color::BLACK);
    }

    #[test]
    fn test_deserialize_validates_buffer() {
        let image: RgbImage =
            serde_json::from_str(r#"{"width":1,"height":1,"data":[7,8,9]}"#).unwrap();
        assert_eq!(image.pixel(0, 0), Color::new(7, 8, 9));

        let json = serde_json::to_string(&RgbImage::filled(2, 2, Color::BLACK)).unwrap();
        assert!(serde_json::from_str::<RgbImage>(&json).is_ok());

        for bad in [
            r#"{"width":4,"height":4,"data":[1,2,3]}"#,
            r#"{"width":0,"height":1,"data":[]}"#,
            r#"{"width":18446744073709551615,"height":2,"data":[0]}"#,
        ] {
            assert!(serde_json::from_str::<RgbImage>(bad).is_err(), "{bad}");
        }
    }
}
