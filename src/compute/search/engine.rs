//! Compression driver: evaluator selection, strategy dispatch and result
//! assembly.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};

use crate::codec::{BitmapError, CompressedImage, FormatError};
use crate::compute::fitness::{CpuFitnessEvaluator, FitnessEvaluator};
use crate::compute::gpu::{GpuError, GpuFitnessEvaluator};
use crate::schema::{
    Color, CompressionConfig, ConfigError, Diagram, ImageError, RgbImage, SearchStats,
    SearchStrategyConfig, StopReason,
};

use super::evolutionary::EvolutionaryAlgorithm;
use super::local_search::LocalSearch;
use super::memetic::MemeticAlgorithm;
use super::operators::DiagramRng;
use super::skeleton::{SearchContext, SearchEvent, SearchStrategy};

/// Top-level error for a compression run.
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid image: {0}")]
    Image(#[from] ImageError),
    #[error("GPU evaluator unavailable: {0}")]
    Gpu(#[from] GpuError),
    #[error("Bitmap error: {0}")]
    Bitmap(#[from] BitmapError),
    #[error("Compressed file error: {0}")]
    Format(#[from] FormatError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Best diagram found, with everything needed to render or store it.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub width: usize,
    pub height: usize,
    pub diagram: Diagram,
    /// Average color of each point.
    pub colors: Vec<Color>,
    /// Pixels owned by each point; zero marks a point colored black.
    pub pixel_counts: Vec<u32>,
    /// Nearest point index of every pixel, row-major.
    pub assignment: Vec<u32>,
    pub fitness: f64,
    pub stats: SearchStats,
}

impl CompressionResult {
    /// Paint the assignment map with the point colors.
    pub fn render(&self) -> RgbImage {
        let mut image = RgbImage::filled(self.width, self.height, Color::BLACK);
        for (i, &point) in self.assignment.iter().enumerate() {
            image.set_pixel(i % self.width, i / self.width, self.colors[point as usize]);
        }
        image
    }

    pub fn to_compressed(&self) -> CompressedImage {
        CompressedImage {
            width: self.width as u32,
            height: self.height as u32,
            points: self.diagram.points().to_vec(),
            colors: self.colors.clone(),
        }
    }
}

fn build_strategy(config: &SearchStrategyConfig) -> Box<dyn SearchStrategy> {
    match config {
        SearchStrategyConfig::LocalSearch(ls) => Box::new(LocalSearch::new(ls.clone())),
        SearchStrategyConfig::Evolutionary(ea) => Box::new(EvolutionaryAlgorithm::new(ea.clone())),
        SearchStrategyConfig::Memetic(ma) => Box::new(MemeticAlgorithm::new(ma.clone())),
    }
}

/// Compresses one image with the configured strategy.
pub struct Compressor {
    config: CompressionConfig,
    image: Arc<RgbImage>,
    evaluator: Box<dyn FitnessEvaluator>,
    rng: DiagramRng,
    trace: Option<Box<dyn Write + Send>>,
    cancelled: Arc<AtomicBool>,
}

impl Compressor {
    /// Validate the configuration against the image and set up the evaluator.
    ///
    /// When `use_gpu` is set and no adapter is usable this fails with
    /// [`CompressError::Gpu`] rather than falling back to the CPU.
    pub fn new(image: RgbImage, config: CompressionConfig) -> Result<Self, CompressError> {
        config.validate_for_image(image.width(), image.height())?;

        let image = Arc::new(image);
        let evaluator: Box<dyn FitnessEvaluator> = if config.use_gpu {
            Box::new(pollster::block_on(GpuFitnessEvaluator::new(
                Arc::clone(&image),
                config.point_count,
            ))?)
        } else {
            Box::new(CpuFitnessEvaluator::new(Arc::clone(&image)))
        };

        let seed = config.random_seed.unwrap_or_else(rand::random);
        let rng = DiagramRng::new(seed, image.width(), image.height());

        Ok(Self {
            config,
            image,
            evaluator,
            rng,
            trace: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Append the best fitness after every improvement to `trace`.
    pub fn with_trace(mut self, trace: Box<dyn Write + Send>) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn evaluator_name(&self) -> &'static str {
        self.evaluator.name()
    }

    /// Run the search with a progress callback.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> CompressionResult
    where
        F: FnMut(&SearchEvent),
    {
        let mut strategy = build_strategy(&self.config.strategy);
        let (width, height) = (self.image.width(), self.image.height());
        info!(
            "Compressing {}x{} image into {} points with {} search on the {} evaluator",
            width,
            height,
            self.config.point_count,
            strategy.name(),
            self.evaluator.name()
        );

        let mut ctx = SearchContext::new(self.evaluator.as_mut(), self.config.budget)
            .with_observer(&mut callback)
            .with_cancel_flag(Arc::clone(&self.cancelled));
        if let Some(trace) = self.trace.as_mut() {
            ctx = ctx.with_trace(trace.as_mut());
        }

        let outcome = strategy.search(&mut ctx, &mut self.rng, self.config.point_count);
        ctx.finish();

        let evaluations = ctx.evaluations();
        let improvements = ctx.improvements();
        let elapsed_seconds = ctx.elapsed_seconds();
        drop(ctx);

        let stop_reason = if self.cancelled.load(Ordering::Relaxed) {
            StopReason::Cancelled
        } else {
            StopReason::BudgetExhausted
        };

        // Re-evaluate the winner to recover its colors and assignment. Not
        // counted in the stats.
        let best = outcome.best;
        self.evaluator.evaluate(&best.diagram);
        let colors = self.evaluator.colors().to_vec();
        let pixel_counts = self.evaluator.pixel_counts().to_vec();
        let assignment = self.evaluator.assignment().to_vec();

        let empty = pixel_counts.iter().filter(|&&count| count == 0).count();
        if empty > 0 {
            warn!("{empty} of {} points own no pixels and were colored black", best.diagram.len());
        }

        info!(
            "Finished with fitness {:.6} after {} evaluations in {:.2}s",
            best.fitness, evaluations, elapsed_seconds
        );

        CompressionResult {
            width,
            height,
            stats: SearchStats {
                strategy: strategy.name().to_string(),
                evaluator: self.evaluator.name().to_string(),
                point_count: self.config.point_count,
                evaluations,
                improvements,
                generations: outcome.generations,
                best_fitness: best.fitness,
                elapsed_seconds,
                evaluations_per_second: if elapsed_seconds > 0.0 {
                    evaluations as f64 / elapsed_seconds
                } else {
                    0.0
                },
                stop_reason,
            },
            diagram: best.diagram,
            colors,
            pixel_counts,
            assignment,
            fitness: best.fitness,
        }
    }

    /// Run the search (blocking).
    pub fn run(&mut self) -> CompressionResult {
        self.run_with_callback(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Budget, EvolutionConfig, LocalSearchConfig, MemeticConfig, Point};

    fn config(strategy: SearchStrategyConfig, points: usize, evaluations: u64) -> CompressionConfig {
        CompressionConfig {
            strategy,
            budget: Budget::Evaluations { count: evaluations },
            point_count: points,
            random_seed: Some(42),
            ..Default::default()
        }
    }

    fn stripes() -> RgbImage {
        let mut image = RgbImage::filled(12, 8, Color::new(250, 240, 10));
        for row in 0..8 {
            for col in 6..12 {
                image.set_pixel(col, row, Color::new(5, 20, 200));
            }
        }
        image
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = Compressor::new(
            stripes(),
            config(SearchStrategyConfig::default(), 0, 10),
        );
        assert!(matches!(result, Err(CompressError::Config(ConfigError::NoPoints))));

        let result = Compressor::new(
            RgbImage::filled(2, 2, Color::BLACK),
            config(SearchStrategyConfig::default(), 5, 10),
        );
        assert!(matches!(
            result,
            Err(CompressError::Config(ConfigError::TooManyPoints { points: 5, pixels: 4 }))
        ));
    }

    #[test]
    fn test_result_is_consistent() {
        for strategy in [
            SearchStrategyConfig::LocalSearch(LocalSearchConfig::default()),
            SearchStrategyConfig::Evolutionary(EvolutionConfig::default()),
            SearchStrategyConfig::Memetic(MemeticConfig::default()),
        ] {
            let mut compressor = Compressor::new(stripes(), config(strategy, 4, 120)).unwrap();
            let result = compressor.run();

            assert_eq!(result.stats.evaluations, 120);
            assert_eq!(result.stats.evaluator, "cpu");
            assert_eq!(result.stats.stop_reason, StopReason::BudgetExhausted);
            assert_eq!(result.colors.len(), 4);
            assert_eq!(result.assignment.len(), 96);
            assert_eq!(result.pixel_counts.iter().sum::<u32>(), 96);
            assert!(result.diagram.is_sorted());

            // The rendered image reproduces the reported fitness.
            let rendered = result.render();
            let source = stripes();
            let deviation: u64 = (0..8)
                .flat_map(|row| (0..12).map(move |col| (col, row)))
                .map(|(col, row)| {
                    let p = source.pixel(col, row);
                    rendered.pixel(col, row).abs_diff_sum(p.r, p.g, p.b) as u64
                })
                .sum();
            assert!((deviation as f64 / 765.0 - result.fitness).abs() < 1e-9);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let strategy = SearchStrategyConfig::Evolutionary(EvolutionConfig::default());
        let first = Compressor::new(stripes(), config(strategy.clone(), 3, 80))
            .unwrap()
            .run();
        let second = Compressor::new(stripes(), config(strategy, 3, 80))
            .unwrap()
            .run();
        assert_eq!(first.diagram, second.diagram);
        assert_eq!(first.fitness, second.fitness);
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut compressor = Compressor::new(
            stripes(),
            config(SearchStrategyConfig::default(), 2, 1_000),
        )
        .unwrap();
        compressor.cancel_handle().store(true, Ordering::Relaxed);
        let result = compressor.run();
        // The first diagram is always evaluated.
        assert_eq!(result.stats.evaluations, 1);
        assert_eq!(result.stats.stop_reason, StopReason::Cancelled);
    }

    #[test]
    fn test_to_compressed_matches_render() {
        let mut compressor = Compressor::new(
            stripes(),
            config(SearchStrategyConfig::default(), 3, 60),
        )
        .unwrap();
        let result = compressor.run();
        let compressed = result.to_compressed();
        assert_eq!(compressed.points.len(), 3);
        assert_eq!(compressed.reconstruct(), result.render());
    }

    #[test]
    fn test_render_uses_point_colors() {
        let result = CompressionResult {
            width: 2,
            height: 1,
            diagram: Diagram::from_points(vec![Point::new(0, 0), Point::new(1, 0)]),
            colors: vec![Color::new(1, 2, 3), Color::new(4, 5, 6)],
            pixel_counts: vec![1, 1],
            assignment: vec![1, 0],
            fitness: 0.0,
            stats: SearchStats {
                strategy: "local-search".into(),
                evaluator: "cpu".into(),
                point_count: 2,
                evaluations: 0,
                improvements: 0,
                generations: None,
                best_fitness: 0.0,
                elapsed_seconds: 0.0,
                evaluations_per_second: 0.0,
                stop_reason: StopReason::BudgetExhausted,
            },
        };
        let image = result.render();
        assert_eq!(image.pixel(0, 0), Color::new(4, 5, 6));
        assert_eq!(image.pixel(1, 0), Color::new(1, 2, 3));
    }
}
