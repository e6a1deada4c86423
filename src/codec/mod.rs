//! Codec module - File collaborators around the compression core.
//!
//! - `bitmap`: 24-bit BMP input and output
//! - `format`: the compressed point-file format and its reconstruction

pub mod bitmap;
pub mod format;

pub use bitmap::{BitmapError, read_bmp, read_bmp_file, write_bmp, write_bmp_file};
pub use format::{
    COLOR_DEPTH, CompressedImage, FormatError, HEADER_SIZE, POINT_RECORD_SIZE,
    point_count_for_budget,
};
