//! Quick compression performance test

use std::time::Instant;

use voronoi_compress::{
    Compressor,
    schema::{
        Budget, Color, CompressionConfig, EvolutionConfig, LocalSearchConfig, MemeticConfig,
        RgbImage, SearchStrategyConfig,
    },
};

/// Smooth gradient with a few solid discs, so there is structure to find.
fn test_image(size: usize) -> RgbImage {
    let mut image = RgbImage::filled(size, size, Color::BLACK);
    let discs = [(0.3, 0.3, 0.15), (0.7, 0.6, 0.2), (0.4, 0.8, 0.1)];
    for row in 0..size {
        for col in 0..size {
            let (x, y) = (col as f32 / size as f32, row as f32 / size as f32);
            let mut color = Color::new((x * 255.0) as u8, (y * 255.0) as u8, 128);
            for (i, &(cx, cy, r)) in discs.iter().enumerate() {
                if (x - cx).powi(2) + (y - cy).powi(2) < r * r {
                    color = Color::new(40 * i as u8, 200, 255 - 60 * i as u8);
                }
            }
            image.set_pixel(col, row, color);
        }
    }
    image
}

fn main() {
    println!("=== Compression Performance Test ===\n");

    let strategies = [
        SearchStrategyConfig::LocalSearch(LocalSearchConfig::default()),
        SearchStrategyConfig::Evolutionary(EvolutionConfig::default()),
        SearchStrategyConfig::Memetic(MemeticConfig::default()),
    ];

    for size in [64, 128, 256] {
        println!("Image size: {}x{}", size, size);

        for strategy in &strategies {
            let config = CompressionConfig {
                strategy: strategy.clone(),
                budget: Budget::Evaluations { count: 300 },
                point_count: size / 2,
                random_seed: Some(42),
                ..Default::default()
            };

            let start = Instant::now();
            let mut compressor = match Compressor::new(test_image(size), config) {
                Ok(compressor) => compressor,
                Err(e) => {
                    eprintln!("  {}: {}", strategy.name(), e);
                    continue;
                }
            };
            let result = compressor.run();
            let elapsed = start.elapsed();

            println!("  {}:", strategy.name());
            println!("    Evaluations:    {}", result.stats.evaluations);
            println!("    Elapsed:        {:.2}s", elapsed.as_secs_f64());
            println!("    Evals/sec:      {:.1}", result.stats.evaluations_per_second);
            println!("    Best fitness:   {:.4}", result.fitness);
            println!(
                "    Per pixel:      {:.6}",
                result.fitness / (size * size) as f64
            );
        }
        println!();
    }
}
