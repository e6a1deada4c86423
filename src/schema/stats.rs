//! Run statistics reported alongside a compression result.

use serde::{Deserialize, Serialize};

/// Statistics from a compression run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStats {
    /// Strategy that produced the result.
    pub strategy: String,
    /// Fitness backend used.
    pub evaluator: String,
    pub point_count: usize,
    /// Evaluations spent by the search.
    pub evaluations: u64,
    /// Strict improvements of the best fitness.
    pub improvements: u64,
    /// Generations run by population strategies.
    pub generations: Option<usize>,
    pub best_fitness: f64,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    pub evaluations_per_second: f64,
    pub stop_reason: StopReason,
}

/// Reason a search stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// The time or evaluation budget ran out.
    BudgetExhausted,
    /// Stopped through the cancel handle.
    Cancelled,
}
