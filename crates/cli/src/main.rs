//! burnline CLI - wildfire exposure of pipeline networks

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use burnline_cli::pipeline::{self, Loaded};
use burnline_cli::{raster_summary, Config};
use burnline_core::io::open_raster_source;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG: &str = "burnline.yaml";

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "burnline")]
#[command(author, version, about = "Wildfire exposure analysis for pipeline networks", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run load, buffer, zonal statistics, export and map
    Run,
    /// Load and validate the configuration
    Validate,
    /// Write a configuration file with every default filled in
    GenerateConfig {
        /// Output path (.yaml, .yml or .json)
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} buffers ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            info!("Using {}", DEFAULT_CONFIG);
            Config::from_file(Path::new(DEFAULT_CONFIG))
        }
        None => {
            info!("No configuration file given, using defaults");
            Ok(Config::default())
        }
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run_command(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let start = Instant::now();

    let pb = spinner("Loading pipelines and burn raster...");
    let Loaded {
        mut pipelines,
        mut source,
        total_read,
    } = pipeline::load(&config)?;
    pb.finish_and_clear();

    let pb = spinner("Buffering pipelines...");
    let buffers = pipeline::buffer(&pipelines, &config);
    pb.finish_and_clear();

    let pb = progress_bar(buffers.len());
    let records = pipeline::aggregate(&buffers, source.as_mut(), &config, |p| {
        pb.set_position(p.end as u64)
    })?;
    pb.finish_and_clear();
    drop(buffers);
    drop(source);

    let pb = spinner("Writing GeoJSON...");
    let (summary, geojson) = pipeline::export(&mut pipelines, &records, &config)?;
    pb.finish_and_clear();

    let map = if config.map.enabled {
        let pb = spinner("Rendering map...");
        let path = pipeline::render_map(&pipelines, &config)?;
        pb.finish_and_clear();
        Some(path)
    } else {
        None
    };
    let elapsed = start.elapsed();

    println!(
        "Pipeline segments: {} ({} read, {} outside the raster)",
        summary.total,
        total_read,
        total_read - summary.total
    );
    println!(
        "  Exposed: {} ({:.1}%)",
        summary.exposed,
        percent(summary.exposed, summary.total)
    );
    println!("  With burn mean: {}", summary.with_mean);
    if let (Some(lo), Some(hi)) = (summary.min_mean, summary.max_mean) {
        println!("  Burn mean range: {:.4} - {:.4}", lo, hi);
    }
    println!("GeoJSON saved to: {}", geojson.display());
    if let Some(map) = map {
        println!("Map saved to: {}", map.display());
    }
    println!("  Processing time: {:.2?}", elapsed);
    Ok(())
}

fn validate_command(config: Config) -> Result<()> {
    config.validate()?;
    println!("Configuration is valid");
    println!("  Pipelines: {}", config.input.pipelines.display());
    println!("  Provinces: {}", config.input.provinces.display());
    println!("  Burn raster: {}", config.input.burn_raster.display());
    println!("  Outputs: {}", config.output.dir.display());
    Ok(())
}

fn generate_config_command(output: &Path) -> Result<()> {
    Config::default().to_file(output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}

fn info_command(input: &Path) -> Result<()> {
    let pb = spinner("Reading raster...");
    let mut source = open_raster_source(input).context("Failed to open raster")?;
    let summary = raster_summary(source.as_mut())?;
    pb.finish_and_clear();

    let bounds = summary.bounds;
    println!("File: {}", input.display());
    println!(
        "Dimensions: {} x {} ({} cells)",
        summary.cols,
        summary.rows,
        summary.len()
    );
    println!("Cell size: {}", summary.transform.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = &summary.crs {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = summary.nodata {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = summary.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = summary.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = summary.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        summary.valid_count,
        percent(summary.valid_count, summary.len())
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Run => run_command(load_config(cli.config.as_deref())?),
        Commands::Validate => validate_command(load_config(cli.config.as_deref())?),
        Commands::GenerateConfig { output } => generate_config_command(&output),
        Commands::Info { input } => info_command(&input),
    }
}
