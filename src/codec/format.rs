//! Compressed point-file format.
//!
//! Layout (little-endian):
//!
//! ```text
//! width u32 | height u32 | depth u16 (= 24) | point count u32
//! then per point: x u32 | y u32 | r u8 | g u8 | b u8
//! ```

use std::io::{self, Read, Write};

use crate::compute::fitness::nearest_point;
use crate::schema::{Color, ConfigError, Point, RgbImage};

/// Bits per pixel of every image this format describes.
pub const COLOR_DEPTH: u16 = 24;

/// Width(4) + Height(4) + Depth(2) + PointCount(4) = 14
pub const HEADER_SIZE: usize = 14;

/// X(4) + Y(4) + RGB(3) = 11
pub const POINT_RECORD_SIZE: usize = 11;

/// Largest point count whose encoding fits in `max_bytes`.
pub fn point_count_for_budget(max_bytes: u64) -> Result<usize, ConfigError> {
    let header = HEADER_SIZE as u64;
    if max_bytes < header + POINT_RECORD_SIZE as u64 {
        return Err(ConfigError::BudgetTooSmall(max_bytes));
    }
    Ok(((max_bytes - header) / POINT_RECORD_SIZE as u64) as usize)
}

/// Errors decoding a compressed file.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Unsupported color depth {0}, expected 24")]
    UnsupportedDepth(u16),
    #[error("Image dimensions must be non-zero, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },
    #[error("File contains no points")]
    NoPoints,
    #[error("Point count {count} exceeds the pixel count of the image")]
    TooManyPoints { count: u32 },
    #[error("Point {index} at ({x}, {y}) lies outside the image")]
    PointOutOfBounds { index: usize, x: u32, y: u32 },
}

/// A decoded compressed image: dimensions plus one color per point.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub width: u32,
    pub height: u32,
    pub points: Vec<Point>,
    pub colors: Vec<Color>,
}

impl CompressedImage {
    /// Exact size of the encoding in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.points.len() * POINT_RECORD_SIZE
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        debug_assert_eq!(self.points.len(), self.colors.len());
        w.write_all(&self.width.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        w.write_all(&COLOR_DEPTH.to_le_bytes())?;
        w.write_all(&(self.points.len() as u32).to_le_bytes())?;
        for (point, color) in self.points.iter().zip(&self.colors) {
            w.write_all(&point.x.to_le_bytes())?;
            w.write_all(&point.y.to_le_bytes())?;
            w.write_all(&[color.r, color.g, color.b])?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, FormatError> {
        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];

        r.read_exact(&mut buf4)?;
        let width = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf4)?;
        let height = u32::from_le_bytes(buf4);

        r.read_exact(&mut buf2)?;
        let depth = u16::from_le_bytes(buf2);
        if depth != COLOR_DEPTH {
            return Err(FormatError::UnsupportedDepth(depth));
        }
        if width == 0 || height == 0 {
            return Err(FormatError::EmptyImage { width, height });
        }

        r.read_exact(&mut buf4)?;
        let count = u32::from_le_bytes(buf4);
        if count == 0 {
            return Err(FormatError::NoPoints);
        }
        if count as u64 > width as u64 * height as u64 {
            return Err(FormatError::TooManyPoints { count });
        }

        // Don't trust the header for the allocation size.
        let capacity = (count as usize).min(1 << 16);
        let mut points = Vec::with_capacity(capacity);
        let mut colors = Vec::with_capacity(capacity);
        let mut record = [0u8; POINT_RECORD_SIZE];
        for index in 0..count as usize {
            r.read_exact(&mut record)?;
            let x = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
            let y = u32::from_le_bytes([record[4], record[5], record[6], record[7]]);
            if x >= width || y >= height {
                return Err(FormatError::PointOutOfBounds { index, x, y });
            }
            points.push(Point::new(x, y));
            colors.push(Color::new(record[8], record[9], record[10]));
        }

        Ok(Self {
            width,
            height,
            points,
            colors,
        })
    }

    /// Rebuild the raster by giving every pixel the color of its nearest
    /// point.
    pub fn reconstruct(&self) -> RgbImage {
        let mut pairs: Vec<(Point, Color)> =
            self.points.iter().copied().zip(self.colors.iter().copied()).collect();
        // Stable, so duplicate points keep their file order.
        pairs.sort_by_key(|&(point, _)| point);
        let points: Vec<Point> = pairs.iter().map(|&(point, _)| point).collect();

        let (width, height) = (self.width as usize, self.height as usize);
        let mut image = RgbImage::filled(width, height, Color::BLACK);
        for row in 0..height {
            for col in 0..width {
                let nearest = nearest_point(&points, col as u32, row as u32);
                image.set_pixel(col, row, pairs[nearest].1);
            }
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> CompressedImage {
        CompressedImage {
            width: 4,
            height: 2,
            points: vec![Point::new(0, 0), Point::new(3, 1)],
            colors: vec![Color::new(10, 20, 30), Color::new(200, 100, 0)],
        }
    }

    #[test]
    fn test_point_count_for_budget() {
        assert_eq!(point_count_for_budget(25).unwrap(), 1);
        assert_eq!(point_count_for_budget(35).unwrap(), 1);
        assert_eq!(point_count_for_budget(36).unwrap(), 2);
        assert_eq!(point_count_for_budget(14 + 11 * 100).unwrap(), 100);
        assert!(matches!(
            point_count_for_budget(24),
            Err(ConfigError::BudgetTooSmall(24))
        ));
    }

    #[test]
    fn test_encoding_layout() {
        let image = sample();
        let mut bytes = Vec::new();
        image.write_to(&mut bytes).unwrap();

        assert_eq!(bytes.len(), image.encoded_len());
        assert_eq!(bytes.len(), 14 + 2 * 11);
        assert_eq!(&bytes[0..4], &4u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..10], &24u16.to_le_bytes());
        assert_eq!(&bytes[10..14], &2u32.to_le_bytes());
        // Second record: x=3, y=1, rgb
        assert_eq!(&bytes[25..29], &3u32.to_le_bytes());
        assert_eq!(&bytes[29..33], &1u32.to_le_bytes());
        assert_eq!(&bytes[33..36], &[200, 100, 0]);

        let decoded = CompressedImage::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_rejects_bad_depth() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        bytes[8] = 32;
        assert!(matches!(
            CompressedImage::read_from(&mut Cursor::new(bytes)),
            Err(FormatError::UnsupportedDepth(32))
        ));
    }

    #[test]
    fn test_rejects_point_outside_image() {
        let mut image = sample();
        image.points[1] = Point::new(4, 0);
        let mut bytes = Vec::new();
        image.write_to(&mut bytes).unwrap();
        assert!(matches!(
            CompressedImage::read_from(&mut Cursor::new(bytes)),
            Err(FormatError::PointOutOfBounds { index: 1, x: 4, y: 0 })
        ));
    }

    #[test]
    fn test_truncated_file() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        bytes.truncate(30);
        assert!(matches!(
            CompressedImage::read_from(&mut Cursor::new(bytes)),
            Err(FormatError::Io(_))
        ));
    }

    #[test]
    fn test_reconstruct_unsorted_points() {
        let image = CompressedImage {
            width: 3,
            height: 1,
            points: vec![Point::new(2, 0), Point::new(0, 0)],
            colors: vec![Color::new(255, 0, 0), Color::new(0, 0, 255)],
        };
        let raster = image.reconstruct();
        assert_eq!(raster.pixel(0, 0), Color::new(0, 0, 255));
        // Column 1 is equidistant; the point first in position order wins.
        assert_eq!(raster.pixel(1, 0), Color::new(0, 0, 255));
        assert_eq!(raster.pixel(2, 0), Color::new(255, 0, 0));
    }
}
