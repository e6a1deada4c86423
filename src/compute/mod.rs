//! Compute module - Fitness evaluation and search.

pub mod fitness;
pub mod gpu;
pub mod search;

pub use fitness::{CpuFitnessEvaluator, FitnessEvaluator, nearest_point, nearest_point_linear};
pub use gpu::{GpuError, GpuFitnessEvaluator};
pub use search::{CompressError, CompressionResult, Compressor, SearchEvent};
