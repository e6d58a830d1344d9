//! kharif CLI - seasonal MODIS composites for the kharif growing season

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use kharif_algorithms::pipeline::{Pipeline, PipelineConfig};
use kharif_algorithms::products::{Product, SourceKind};
use kharif_algorithms::source::DirectorySource;
use kharif_algorithms::statistics::{load_zones, write_zonal_csv, zonal_table};
use kharif_core::io::{read_geotiff_pages, read_stack, StackManifest};
use kharif_parallel::ProcessingMode;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kharif")]
#[command(author, version, about = "Seasonal MODIS composites: NDVI, EVI, LAI, FPAR, DTR, NMDI, VHI", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and export all seven yearly product stacks
    Run {
        /// Input root holding <SOURCE>/<YYYY-MM-DD>/<band>.tif
        input: PathBuf,
        /// Output directory for the stacks
        output: PathBuf,
        /// JSON configuration file (flags below override it)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// First year of the range
        #[arg(long)]
        start_year: Option<i32>,
        /// Last year of the range (inclusive)
        #[arg(long)]
        end_year: Option<i32>,
        /// First month of the season window
        #[arg(long)]
        season_start: Option<u32>,
        /// Last month of the season window (inclusive)
        #[arg(long)]
        season_end: Option<u32>,
        /// Maximum gap in days when pairing NDVI with LST for VHI
        #[arg(long)]
        join_tolerance_days: Option<i64>,
        /// Worker threads (0 = all cores, 1 = sequential)
        #[arg(short, long, default_value = "0")]
        threads: usize,
        /// Tile edge in pixels for per-pixel reductions
        #[arg(long, default_value = "256")]
        tile_size: usize,
    },
    /// Show information about an exported stack or any GeoTIFF
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Per-region yearly means of exported stacks, as a long-format CSV
    Zonal {
        /// Exported stacks, each with its `.json` band manifest alongside
        #[arg(required = true)]
        stacks: Vec<PathBuf>,
        /// JSON zone file: `[{"name": ..., "ring": [[x, y], ...]}, ...]`
        #[arg(short, long)]
        regions: PathBuf,
        /// Output CSV (`id,region_name,index_name,year,value`)
        #[arg(short, long, default_value = "zonal_stats.csv")]
        output: PathBuf,
    },
    /// List the products and the source collections they need
    Products,
    /// Print the default configuration as JSON
    Config,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(
    path: Option<&Path>,
    start_year: Option<i32>,
    end_year: Option<i32>,
    season_start: Option<u32>,
    season_end: Option<u32>,
    join_tolerance_days: Option<i64>,
) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(y) = start_year {
        config.start_year = y;
    }
    if let Some(y) = end_year {
        config.end_year = y;
    }
    if let Some(m) = season_start {
        config.season[0] = m;
    }
    if let Some(m) = season_end {
        config.season[1] = m;
    }
    if let Some(d) = join_tolerance_days {
        config.join_tolerance_days = d;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn manifest_for(tif: &Path) -> Option<StackManifest> {
    let json = std::fs::read_to_string(tif.with_extension("json")).ok()?;
    serde_json::from_str(&json).ok()
}

fn done(output: &Path, files: usize, elapsed: std::time::Duration) {
    println!("{} stacks saved to: {}", files, output.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            input,
            output,
            config,
            start_year,
            end_year,
            season_start,
            season_end,
            join_tolerance_days,
            threads,
            tile_size,
        } => {
            let config = load_config(
                config.as_deref(),
                start_year,
                end_year,
                season_start,
                season_end,
                join_tolerance_days,
            )?;
            info!(
                "Years {}-{}, season months {}-{}",
                config.start_year, config.end_year, config.season[0], config.season[1]
            );

            let years = config.years()?;
            let source = DirectorySource::new(input.clone(), years);
            let pipeline = Pipeline::new(config)
                .with_mode(ProcessingMode::from_threads(threads))
                .with_tile_size(tile_size);

            let start = Instant::now();
            let pb = spinner("Computing products...");
            let products = pipeline
                .run(&source)
                .with_context(|| format!("Pipeline failed for {}", input.display()))?;
            pb.finish_and_clear();

            let pb = spinner("Exporting stacks...");
            let paths = pipeline
                .export(&products, &output)
                .context("Failed to export stacks")?;
            pb.finish_and_clear();

            for path in &paths {
                println!("  {}", path.display());
            }
            done(&output, paths.len(), start.elapsed());
        }

        Commands::Info { input } => {
            let pb = spinner("Reading raster...");
            let pages = read_geotiff_pages(&input).context("Failed to read raster")?;
            pb.finish_and_clear();

            let first = pages
                .first()
                .with_context(|| format!("{} has no pages", input.display()))?;
            let (rows, cols) = first.shape();
            let bounds = first.bounds();
            let transform = first.transform();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, first.len());
            println!(
                "Cell size: {} x {}",
                transform.pixel_width,
                transform.pixel_height.abs()
            );
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            println!("CRS: {}", first.crs());

            let names = manifest_for(&input).map(|m| m.bands);
            println!("Bands: {}", pages.len());
            for (i, page) in pages.iter().enumerate() {
                let stats = page.statistics();
                let name = names
                    .as_ref()
                    .and_then(|n| n.get(i))
                    .cloned()
                    .unwrap_or_else(|| format!("band {}", i + 1));
                match (stats.min, stats.max, stats.mean) {
                    (Some(min), Some(max), Some(mean)) => println!(
                        "  {:<12} min {:.4}  max {:.4}  mean {:.4}  valid {}/{}",
                        name,
                        min,
                        max,
                        mean,
                        stats.valid_count,
                        page.len()
                    ),
                    _ => println!("  {:<12} no valid cells", name),
                }
            }
        }

        Commands::Zonal {
            stacks,
            regions,
            output,
        } => {
            let zones = load_zones(&regions)
                .with_context(|| format!("Failed to read zones {}", regions.display()))?;
            info!("{} zones from {}", zones.len(), regions.display());

            let start = Instant::now();
            let pb = spinner("Reading stacks...");
            let images = stacks
                .iter()
                .map(|path| {
                    read_stack(path)
                        .with_context(|| format!("Failed to read stack {}", path.display()))
                })
                .collect::<Result<Vec<_>>>()?;
            pb.finish_and_clear();

            let pb = spinner("Computing zonal means...");
            let rows = zonal_table(&images, &zones).context("Zonal statistics failed")?;
            pb.finish_and_clear();

            write_zonal_csv(&rows, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            let empty = rows.iter().filter(|r| r.value.is_none()).count();
            println!(
                "{} rows saved to: {} ({} without valid cells)",
                rows.len(),
                output.display(),
                empty
            );
            println!("  Processing time: {:.2?}", start.elapsed());
        }

        Commands::Products => {
            for product in Product::ALL {
                let sources: Vec<&str> = product.sources().iter().map(|s| s.name()).collect();
                println!(
                    "{:<5} band {:<5} from {}",
                    product.prefix(),
                    product.composite_band(),
                    sources.join(" + ")
                );
            }
            println!();
            for kind in SourceKind::ALL {
                let qa = kind.qa_rule();
                let scale = kind.scale_rule();
                println!(
                    "{:<9} every {:>2} days  QA {} & {:#04b} == {}  scale {:?} x {:?} + {}",
                    kind.name(),
                    kind.cadence_days(),
                    qa.band,
                    qa.bitmask,
                    qa.required,
                    scale.bands,
                    scale.multipliers,
                    scale.offset
                );
            }
        }

        Commands::Config => {
            let json = serde_json::to_string_pretty(&PipelineConfig::default())
                .context("Failed to serialize configuration")?;
            println!("{}", json);
        }
    }

    Ok(())
}
