//! Metaheuristic search over Voronoi diagrams.
//!
//! # Overview
//!
//! - **Skeleton** (`skeleton`): budget tracking, improvement notification and
//!   the fitness trace, shared by every strategy
//! - **Operators** (`operators`): random diagrams, tweak and crossover
//! - **Pool** (`pool`): slot-indexed diagram storage reused across generations
//! - **Strategies**: `LocalSearch`, `EvolutionaryAlgorithm`, `MemeticAlgorithm`
//! - **Engine** (`engine`): `Compressor`, which wires an image, an evaluator and
//!   a strategy together
//!
//! # Example
//!
//! ```rust,no_run
//! use voronoi_compress::compute::search::{Compressor, SearchEvent};
//! use voronoi_compress::schema::{Budget, Color, CompressionConfig, RgbImage};
//!
//! let image = RgbImage::filled(64, 48, Color::new(200, 40, 40));
//! let config = CompressionConfig {
//!     point_count: 20,
//!     budget: Budget::Evaluations { count: 500 },
//!     ..Default::default()
//! };
//!
//! let mut compressor = Compressor::new(image, config).unwrap();
//! let result = compressor.run_with_callback(|event| {
//!     if let SearchEvent::Improved { fitness, evaluations, .. } = event {
//!         println!("{evaluations}: {fitness:.3}");
//!     }
//! });
//! println!("Best fitness: {:.3}", result.fitness);
//! ```

mod engine;
mod evolutionary;
mod local_search;
mod memetic;
mod operators;
mod pool;
mod skeleton;

pub use engine::{CompressError, CompressionResult, Compressor};
pub use evolutionary::EvolutionaryAlgorithm;
pub use local_search::LocalSearch;
pub use memetic::MemeticAlgorithm;
pub use operators::DiagramRng;
pub use pool::{DiagramPool, Member};
pub use skeleton::{Candidate, SearchContext, SearchEvent, SearchOutcome, SearchStrategy};
