//! Uncompressed 24-bit BMP reading and writing.
//!
//! Only the `BITMAPINFOHEADER` family with `BI_RGB` (no compression) at 24
//! bits per pixel is accepted. Rows are padded to 4 bytes and stored
//! bottom-up unless the height is negative.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::schema::{BYTES_PER_PIXEL, ImageError, RgbImage};

const FILE_HEADER_SIZE: usize = 14;
const INFO_HEADER_SIZE: usize = 40;
const BITS_PER_PIXEL: u16 = 24;
const BI_RGB: u32 = 0;
/// 72 DPI
const PIXELS_PER_METER: i32 = 2835;

#[derive(Debug, thiserror::Error)]
pub enum BitmapError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not a BMP file")]
    BadSignature,
    #[error("Unsupported info header of {0} bytes")]
    UnsupportedHeader(u32),
    #[error("Unsupported bit depth {0}, only 24-bit images are handled")]
    UnsupportedDepth(u16),
    #[error("Unsupported compression mode {0}")]
    UnsupportedCompression(u32),
    #[error("Image of {width}x{height} pixels is too large")]
    TooLarge { width: u32, height: u32 },
    #[error("Pixel data offset {0} points inside the headers")]
    BadDataOffset(u32),
    #[error("Invalid pixel data: {0}")]
    Image(#[from] ImageError),
}

/// Bytes per stored row, including padding.
fn padded_row_len(width: usize) -> usize {
    (width * BYTES_PER_PIXEL + 3) & !3
}

fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Decode a 24-bit BMP into a packed top-down RGB image.
pub fn read_bmp<R: Read>(r: &mut R) -> Result<RgbImage, BitmapError> {
    let mut signature = [0u8; 2];
    r.read_exact(&mut signature)?;
    if &signature != b"BM" {
        return Err(BitmapError::BadSignature);
    }
    let _file_size = read_u32(r)?;
    let _reserved = read_u32(r)?;
    let data_offset = read_u32(r)?;

    let header_size = read_u32(r)?;
    if (header_size as usize) < INFO_HEADER_SIZE {
        return Err(BitmapError::UnsupportedHeader(header_size));
    }
    let width = read_i32(r)?;
    let height = read_i32(r)?;
    let _planes = read_u16(r)?;
    let depth = read_u16(r)?;
    if depth != BITS_PER_PIXEL {
        return Err(BitmapError::UnsupportedDepth(depth));
    }
    let compression = read_u32(r)?;
    if compression != BI_RGB {
        return Err(BitmapError::UnsupportedCompression(compression));
    }

    // Skip the rest of the info header and anything before the pixel data.
    let headers_end = (FILE_HEADER_SIZE + INFO_HEADER_SIZE - 20) as u64;
    let pixel_start = data_offset as u64;
    if pixel_start < (FILE_HEADER_SIZE as u64 + header_size as u64) {
        return Err(BitmapError::BadDataOffset(data_offset));
    }
    io::copy(&mut (&mut *r).take(pixel_start - headers_end), &mut io::sink())?;

    if width <= 0 || height == 0 {
        return Err(ImageError::EmptyImage.into());
    }
    let width = width as usize;
    let top_down = height < 0;
    let height = height.unsigned_abs() as usize;

    let oversized = || BitmapError::TooLarge {
        width: width as u32,
        height: height as u32,
    };
    let stride = width
        .checked_mul(BYTES_PER_PIXEL)
        .and_then(|len| len.checked_add(3))
        .map(|len| len & !3)
        .ok_or_else(oversized)?;
    let pixel_bytes = stride.checked_mul(height).ok_or_else(oversized)?;

    // Don't trust the header: grow with the data actually present.
    let mut data = Vec::new();
    (&mut *r).take(pixel_bytes as u64).read_to_end(&mut data)?;
    if data.len() < pixel_bytes {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }

    if !top_down {
        for row in 0..height / 2 {
            let (upper, lower) = data.split_at_mut((height - 1 - row) * stride);
            upper[row * stride..(row + 1) * stride].swap_with_slice(&mut lower[..stride]);
        }
    }
    for line in data.chunks_exact_mut(stride) {
        for pixel in line[..width * BYTES_PER_PIXEL].chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel.swap(0, 2);
        }
    }

    Ok(RgbImage::from_rows(width, height, stride, data)?)
}

/// Encode an image as a bottom-up 24-bit BMP.
pub fn write_bmp<W: Write>(w: &mut W, image: &RgbImage) -> io::Result<()> {
    let stride = padded_row_len(image.width());
    let pixel_bytes = stride * image.height();
    let data_offset = FILE_HEADER_SIZE + INFO_HEADER_SIZE;

    w.write_all(b"BM")?;
    w.write_all(&((data_offset + pixel_bytes) as u32).to_le_bytes())?;
    w.write_all(&0u32.to_le_bytes())?;
    w.write_all(&(data_offset as u32).to_le_bytes())?;

    w.write_all(&(INFO_HEADER_SIZE as u32).to_le_bytes())?;
    w.write_all(&(image.width() as i32).to_le_bytes())?;
    w.write_all(&(image.height() as i32).to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&BITS_PER_PIXEL.to_le_bytes())?;
    w.write_all(&BI_RGB.to_le_bytes())?;
    w.write_all(&(pixel_bytes as u32).to_le_bytes())?;
    w.write_all(&PIXELS_PER_METER.to_le_bytes())?;
    w.write_all(&PIXELS_PER_METER.to_le_bytes())?;
    // Palette size and important colors
    w.write_all(&0u32.to_le_bytes())?;
    w.write_all(&0u32.to_le_bytes())?;

    let mut line = vec![0u8; stride];
    for row in (0..image.height()).rev() {
        for (out, pixel) in line
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .zip(image.row(row).chunks_exact(BYTES_PER_PIXEL))
        {
            out[0] = pixel[2];
            out[1] = pixel[1];
            out[2] = pixel[0];
        }
        w.write_all(&line)?;
    }
    Ok(())
}

pub fn read_bmp_file(path: impl AsRef<Path>) -> Result<RgbImage, BitmapError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_bmp(&mut reader)
}

pub fn write_bmp_file(path: impl AsRef<Path>, image: &RgbImage) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_bmp(&mut writer, image)?;
    writer.flush()
}
