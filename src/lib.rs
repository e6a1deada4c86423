//! Voronoi image compression.
//!
//! Approximates a 24-bit image with a fixed number of colored points: every
//! pixel takes the color of its nearest point, and the point positions are
//! chosen by metaheuristic search to minimize the deviation from the source
//! under a byte budget for the compressed file.
//!
//! # Architecture
//!
//! - `schema`: diagrams, images and run configuration
//! - `compute`: fitness evaluation (CPU and GPU) and the search strategies
//! - `codec`: BMP input/output and the compressed point-file format
//!
//! # Example
//!
//! ```rust,no_run
//! use voronoi_compress::{
//!     codec::{point_count_for_budget, read_bmp_file, write_bmp_file},
//!     compute::Compressor,
//!     schema::CompressionConfig,
//! };
//!
//! let image = read_bmp_file("photo.bmp")?;
//! let config = CompressionConfig {
//!     point_count: point_count_for_budget(2048)?,
//!     ..Default::default()
//! };
//!
//! let mut compressor = Compressor::new(image, config)?;
//! let result = compressor.run();
//! write_bmp_file("photo.vd.bmp", &result.render())?;
//! println!("Fitness: {:.3}", result.fitness);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use codec::CompressedImage;
pub use compute::{CompressError, CompressionResult, Compressor};
pub use schema::{CompressionConfig, Diagram, RgbImage};
