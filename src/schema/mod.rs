//! Schema module - Data and configuration types for compression runs.

mod config;
mod diagram;
mod image;
mod stats;

pub use config::*;
pub use diagram::*;
pub use image::*;
pub use stats::*;
