//! Voronoi compression CLI - Compress a BMP image from a JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use voronoi_compress::{
    codec::{CompressedImage, point_count_for_budget, read_bmp_file, write_bmp_file},
    compute::{Compressor, SearchEvent},
    schema::{Budget, CompressionConfig},
};

fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("{context}: {err}");
    std::process::exit(1);
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 5 {
        eprintln!(
            "Usage: {} <config.json> <source.bmp> <compressed.vdc> <reconstructed.bmp> [max_bytes]",
            args[0]
        );
        eprintln!();
        eprintln!("Compress a 24-bit BMP image into a set of colored Voronoi points.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json        Path to compression configuration file");
        eprintln!("  source.bmp         Image to compress");
        eprintln!("  compressed.vdc     Output compressed point file");
        eprintln!("  reconstructed.bmp  Output image decoded from the compressed file");
        eprintln!("  max_bytes          Size budget of the compressed file; overrides point_count");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let source_path = PathBuf::from(&args[2]);
    let compressed_path = PathBuf::from(&args[3]);
    let reconstructed_path = PathBuf::from(&args[4]);

    // Load configuration
    let config_str = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| fail("Error reading config file", e));
    let mut config: CompressionConfig =
        serde_json::from_str(&config_str).unwrap_or_else(|e| fail("Error parsing config", e));

    if let Some(arg) = args.get(5) {
        let max_bytes: u64 = arg
            .parse()
            .unwrap_or_else(|e| fail("Error parsing max_bytes", e));
        config.point_count =
            point_count_for_budget(max_bytes).unwrap_or_else(|e| fail("Invalid byte budget", e));
    }

    let image = read_bmp_file(&source_path).unwrap_or_else(|e| fail("Error reading image", e));

    println!("Voronoi Compression");
    println!("===================");
    println!("Image: {}x{}", image.width(), image.height());
    println!("Strategy: {}", config.strategy.name());
    println!("Points: {}", config.point_count);
    match config.budget {
        Budget::Time { seconds } => println!("Budget: {seconds}s"),
        Budget::Evaluations { count } => println!("Budget: {count} evaluations"),
    }
    println!();

    let log_file = config.log_file.clone();
    let mut compressor =
        Compressor::new(image, config).unwrap_or_else(|e| fail("Error setting up compressor", e));
    println!("Evaluator: {}", compressor.evaluator_name());

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap_or_else(|e| fail("Error opening log file", e));
        compressor = compressor.with_trace(Box::new(BufWriter::new(file)));
    }

    println!("Searching...");
    let result = compressor.run_with_callback(|event| match event {
        SearchEvent::Improved {
            fitness,
            evaluations,
            elapsed_seconds,
        } => println!("  {elapsed_seconds:>8.2}s  eval {evaluations:>8}  fitness {fitness:.6}"),
        SearchEvent::Finished { .. } => {}
    });

    // Write the compressed file, then decode it back for the reconstruction.
    let compressed = result.to_compressed();
    let mut writer = BufWriter::new(
        File::create(&compressed_path).unwrap_or_else(|e| fail("Error creating compressed file", e)),
    );
    compressed
        .write_to(&mut writer)
        .and_then(|_| writer.flush())
        .unwrap_or_else(|e| fail("Error writing compressed file", e));
    drop(writer);

    let mut reader = BufReader::new(
        File::open(&compressed_path).unwrap_or_else(|e| fail("Error opening compressed file", e)),
    );
    let decoded = CompressedImage::read_from(&mut reader)
        .unwrap_or_else(|e| fail("Error decoding compressed file", e));
    write_bmp_file(&reconstructed_path, &decoded.reconstruct())
        .unwrap_or_else(|e| fail("Error writing reconstructed image", e));

    let stats = &result.stats;
    println!();
    println!("Final fitness: {:.6}", result.fitness);
    println!(
        "Per pixel: {:.6}",
        result.fitness / (result.width * result.height) as f64
    );
    println!("Compressed size: {} bytes", compressed.encoded_len());
    if let Some(generations) = stats.generations {
        println!("Generations: {generations}");
    }
    println!(
        "Evaluations: {} ({} improvements, {:.1} evals/s)",
        stats.evaluations, stats.improvements, stats.evaluations_per_second
    );
    println!("Time: {:.2}s", stats.elapsed_seconds);
}

fn print_example_config() {
    let config = CompressionConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => fail("Error serializing config", e),
    }
}
