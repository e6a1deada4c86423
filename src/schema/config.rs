//! Configuration types for a compression run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level compression configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Search strategy and its parameters.
    pub strategy: SearchStrategyConfig,
    /// Computation budget.
    pub budget: Budget,
    /// Number of diagram points (derived from the byte budget by the caller).
    pub point_count: usize,
    /// Use the GPU fitness evaluator instead of the CPU one.
    #[serde(default)]
    pub use_gpu: bool,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// File receiving the best-fitness trajectory (CLI only).
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategyConfig::default(),
            budget: Budget::default(),
            point_count: 100,
            use_gpu: false,
            random_seed: None,
            log_file: None,
        }
    }
}

/// Search strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SearchStrategyConfig {
    /// Hill climbing from the best of several random diagrams.
    LocalSearch(LocalSearchConfig),
    /// Tournament selection, segment crossover and tweak mutation.
    Evolutionary(EvolutionConfig),
    /// Evolutionary search with local refinement of survivors.
    Memetic(MemeticConfig),
}

impl Default for SearchStrategyConfig {
    fn default() -> Self {
        Self::LocalSearch(LocalSearchConfig::default())
    }
}

impl SearchStrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LocalSearch(_) => "local search",
            Self::Evolutionary(_) => "evolutionary algorithm",
            Self::Memetic(_) => "memetic algorithm",
        }
    }
}

/// Computation budget of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum Budget {
    /// Wall-clock limit in seconds.
    Time { seconds: f64 },
    /// Limit on the number of fitness evaluations.
    Evaluations { count: u64 },
}

impl Default for Budget {
    fn default() -> Self {
        Self::Time { seconds: 60.0 }
    }
}

/// Point displacement settings shared by every strategy that tweaks diagrams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweakConfig {
    /// Maximum displacement as a fraction of image width/height (0.0-1.0].
    #[serde(default = "default_movement_fraction")]
    pub movement_fraction: f32,
}

impl Default for TweakConfig {
    fn default() -> Self {
        Self {
            movement_fraction: default_movement_fraction(),
        }
    }
}

fn default_movement_fraction() -> f32 {
    0.3
}

/// How local search chooses the point to tweak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TweakTarget {
    /// Uniformly random point.
    #[default]
    Random,
    /// Point with the largest error contribution, when the evaluator reports it.
    WorstPoint,
}

/// Local search (hill climbing) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalSearchConfig {
    /// Extra random diagrams tried before climbing.
    #[serde(default = "default_restarts")]
    pub restarts: usize,
    #[serde(default)]
    pub tweak: TweakConfig,
    /// Failed tweaks on the same point before switching to a random one.
    /// `None` always picks a fresh target.
    #[serde(default = "default_point_retry_limit")]
    pub point_retry_limit: Option<usize>,
    #[serde(default)]
    pub target: TweakTarget,
}

impl Default for LocalSearchConfig {
    fn default() -> Self {
        Self {
            restarts: default_restarts(),
            tweak: TweakConfig::default(),
            point_retry_limit: default_point_retry_limit(),
            target: TweakTarget::default(),
        }
    }
}

fn default_restarts() -> usize {
    15
}
fn default_point_retry_limit() -> Option<usize> {
    Some(10)
}

/// Evolutionary algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Fraction of the population eliminated by tournaments each generation.
    #[serde(default = "default_selection_rate")]
    pub selection_rate: f32,
    /// Fraction of eliminated slots refilled by crossover instead of mutation.
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f32,
    #[serde(default)]
    pub tweak: TweakConfig,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            selection_rate: default_selection_rate(),
            crossover_rate: default_crossover_rate(),
            tweak: TweakConfig::default(),
        }
    }
}

fn default_population_size() -> usize {
    10
}
fn default_selection_rate() -> f32 {
    0.5
}
fn default_crossover_rate() -> f32 {
    0.5
}

impl EvolutionConfig {
    /// Members eliminated per generation.
    pub fn selection_size(&self) -> usize {
        (self.population_size as f32 * self.selection_rate) as usize
    }

    /// Eliminated slots refilled by crossover.
    pub fn breeding_size(&self) -> usize {
        (self.selection_size() as f32 * self.crossover_rate) as usize
    }

    /// Eliminated slots refilled by mutation.
    pub fn mutation_size(&self) -> usize {
        self.selection_size() - self.breeding_size()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(ConfigError::InvalidRate {
                name: "crossover_rate",
                value: self.crossover_rate,
            });
        }
        let selection = self.selection_size();
        if selection == 0 || selection >= self.population_size {
            return Err(ConfigError::InvalidRate {
                name: "selection_rate",
                value: self.selection_rate,
            });
        }
        if self.mutation_size() > self.population_size - selection {
            return Err(ConfigError::TooManyMutations {
                mutations: self.mutation_size(),
                survivors: self.population_size - selection,
            });
        }
        self.tweak.validate()
    }
}

/// Memetic algorithm configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemeticConfig {
    #[serde(flatten)]
    pub evolution: EvolutionConfig,
    /// Local search rounds applied to each survivor per generation.
    #[serde(default = "default_local_search_iterations")]
    pub local_search_iterations: usize,
}

impl Default for MemeticConfig {
    fn default() -> Self {
        Self {
            evolution: EvolutionConfig::default(),
            local_search_iterations: default_local_search_iterations(),
        }
    }
}

fn default_local_search_iterations() -> usize {
    30
}

impl TweakConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.movement_fraction > 0.0 && self.movement_fraction <= 1.0) {
            return Err(ConfigError::InvalidMovementFraction(self.movement_fraction));
        }
        Ok(())
    }
}

impl CompressionConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.point_count == 0 {
            return Err(ConfigError::NoPoints);
        }

        match self.budget {
            Budget::Time { seconds } if !(seconds.is_finite() && seconds > 0.0) => {
                return Err(ConfigError::InvalidTimeLimit(seconds));
            }
            Budget::Evaluations { count: 0 } => return Err(ConfigError::InvalidEvaluationLimit),
            _ => {}
        }

        match &self.strategy {
            SearchStrategyConfig::LocalSearch(ls) => ls.tweak.validate(),
            SearchStrategyConfig::Evolutionary(ea) => ea.validate(),
            SearchStrategyConfig::Memetic(ma) => ma.evolution.validate(),
        }
    }

    /// Validate against the dimensions of the image being compressed.
    pub fn validate_for_image(&self, width: usize, height: usize) -> Result<(), ConfigError> {
        self.validate()?;
        if self.point_count > width * height {
            return Err(ConfigError::TooManyPoints {
                points: self.point_count,
                pixels: width * height,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Point count must be non-zero")]
    NoPoints,
    #[error("Point count {points} exceeds the pixel count {pixels}")]
    TooManyPoints { points: usize, pixels: usize },
    #[error("Byte budget of {0} bytes cannot hold a single point")]
    BudgetTooSmall(u64),
    #[error("Time limit must be positive and finite, got {0}")]
    InvalidTimeLimit(f64),
    #[error("Evaluation limit must be non-zero")]
    InvalidEvaluationLimit,
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("Invalid {name}: {value}")]
    InvalidRate { name: &'static str, value: f32 },
    #[error("Mutation count {mutations} exceeds surviving members {survivors}")]
    TooManyMutations { mutations: usize, survivors: usize },
    #[error("Movement fraction must be in (0, 1], got {0}")]
    InvalidMovementFraction(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(CompressionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_population_sizes() {
        let ea = EvolutionConfig::default();
        assert_eq!(ea.selection_size(), 5);
        assert_eq!(ea.breeding_size(), 2);
        assert_eq!(ea.mutation_size(), 3);
    }

    #[test]
    fn test_rejects_degenerate_point_count() {
        let config = CompressionConfig {
            point_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoPoints)));
    }

    #[test]
    fn test_rejects_more_points_than_pixels() {
        let config = CompressionConfig {
            point_count: 17,
            ..Default::default()
        };
        assert!(matches!(
            config.validate_for_image(4, 4),
            Err(ConfigError::TooManyPoints { .. })
        ));
        assert!(config.validate_for_image(5, 4).is_ok());
    }

    #[test]
    fn test_rejects_bad_budgets() {
        let config = CompressionConfig {
            budget: Budget::Evaluations { count: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CompressionConfig {
            budget: Budget::Time { seconds: f64::NAN },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unusable_selection_rate() {
        for rate in [0.0, 0.05, 1.0] {
            let config = CompressionConfig {
                strategy: SearchStrategyConfig::Evolutionary(EvolutionConfig {
                    selection_rate: rate,
                    ..Default::default()
                }),
                ..Default::default()
            };
            assert!(config.validate().is_err(), "rate {rate} accepted");
        }
    }

    #[test]
    fn test_rejects_more_mutations_than_survivors() {
        let config = CompressionConfig {
            strategy: SearchStrategyConfig::Evolutionary(EvolutionConfig {
                selection_rate: 0.8,
                crossover_rate: 0.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyMutations { .. })
        ));
    }

    #[test]
    fn test_serialization() {
        let config = CompressionConfig {
            strategy: SearchStrategyConfig::Memetic(MemeticConfig::default()),
            budget: Budget::Evaluations { count: 500 },
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CompressionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.budget, Budget::Evaluations { count: 500 });
        match parsed.strategy {
            SearchStrategyConfig::Memetic(ma) => {
                assert_eq!(ma.local_search_iterations, 30);
                assert_eq!(ma.evolution.population_size, 10);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let json = r#"{
            "strategy": { "type": "Evolutionary" },
            "budget": { "mode": "Time", "seconds": 2.5 },
            "point_count": 42
        }"#;
        let config: CompressionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.point_count, 42);
        assert!(!config.use_gpu);
        match config.strategy {
            SearchStrategyConfig::Evolutionary(ea) => {
                assert_eq!(ea.population_size, 10);
                assert_eq!(ea.tweak.movement_fraction, 0.3);
            }
            other => panic!("unexpected strategy {other:?}"),
        }
    }
}
