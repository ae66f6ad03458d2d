//! Segtiler: layered annotation documents to segmentation tile datasets.
//!
//! Each source document carries an `original` raster layer plus one or more
//! color-coded annotation layers. Segtiler merges the annotation layers into
//! a single class-index mask, optionally rotates landscape pages to portrait,
//! cuts image and mask into fixed-size overlapping tiles, pools the tiles of
//! every document, and deterministically splits the pool into train, val
//! and test sets with sequential names.
//!
//! # Modules
//!
//! - [`config`]: Build configuration and class tables
//! - [`raster`]: In-memory image, mask and layer types
//! - [`document`]: Source documents and the layer-directory reader
//! - [`color_map`]: Pixel color to class id lookup
//! - [`consolidate`]: Priority merge of annotation layers
//! - [`orient`]: Portrait normalization
//! - [`tiling`]: Overlapping tile generation
//! - [`batch`]: Per-document pipeline and tile pooling
//! - [`split`]: Seeded train/val/test partitioning
//! - [`output`]: Tile, manifest and provenance writers
//! - [`error`]: Error types for segtiler operations

pub mod batch;
pub mod color_map;
pub mod config;
pub mod consolidate;
pub mod document;
pub mod error;
pub mod orient;
pub mod output;
pub mod raster;
pub mod split;
pub mod tiling;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use batch::{aggregate, BatchOptions, DocumentPipeline};
use config::{load_build_config, load_class_table, BuildConfig};
pub use error::SegtilerError;
use output::{validate_dataset, write_manifest, write_provenance_csv, write_tiles, Manifest};
use tiling::{grid_canvas, Tiler};

/// The segtiler CLI application.
#[derive(Parser)]
#[command(name = "segtiler")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level used when RUST_LOG is not set.
    #[arg(
        long,
        global = true,
        default_value = "info",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Build a tiled, split dataset from a directory of documents.
    Build(BuildArgs),
    /// Validate configuration files without touching any document.
    CheckConfig(CheckConfigArgs),
}

/// Manifest output choice.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ManifestFormat {
    /// Write manifest.json next to the tiles.
    Json,
    /// Do not write a manifest.
    #[value(name = "none")]
    Skip,
}

/// Arguments for the build subcommand.
#[derive(clap::Args)]
struct BuildArgs {
    /// Directory of documents (one subdirectory of layer PNGs each), or a
    /// single document directory.
    input: PathBuf,

    /// Build configuration YAML (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Class table YAML.
    #[arg(long)]
    classes: PathBuf,

    /// Output directory.
    #[arg(short, long, default_value = "dataset")]
    output: PathBuf,

    /// Override the split seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of worker threads (0 = one per core).
    #[arg(long)]
    workers: Option<usize>,

    /// Abort on the first failing document instead of skipping it.
    #[arg(long)]
    fail_fast: bool,

    /// Also read layers marked hidden.
    #[arg(long)]
    include_hidden: bool,

    /// Manifest format.
    #[arg(long, value_enum, default_value_t = ManifestFormat::Json)]
    manifest_format: ManifestFormat,

    /// Skip re-reading the written dataset to check it.
    #[arg(long)]
    no_validate: bool,
}

/// Arguments for the check-config subcommand.
#[derive(clap::Args)]
struct CheckConfigArgs {
    /// Build configuration YAML (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Class table YAML.
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Report the tile grid for a canvas of this width.
    #[arg(long, requires = "height")]
    width: Option<usize>,

    /// Report the tile grid for a canvas of this height.
    #[arg(long, requires = "width")]
    height: Option<usize>,
}

/// Run the segtiler CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), SegtilerError> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Some(Commands::Build(args)) => run_build(args),
        Some(Commands::CheckConfig(args)) => run_check_config(args),
        None => {
            println!("segtiler {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Layered annotation documents to segmentation tile datasets.");
            println!();
            println!("Run 'segtiler --help' for usage information.");
            Ok(())
        }
    }
}

/// Installs a stderr `tracing` subscriber; `RUST_LOG` wins over `level`.
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn read_build_config(path: Option<&Path>) -> Result<BuildConfig, SegtilerError> {
    match path {
        Some(path) => load_build_config(path),
        None => {
            let config = BuildConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Execute the build subcommand.
fn run_build(args: BuildArgs) -> Result<(), SegtilerError> {
    let mut config = read_build_config(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.data_split.seed = seed;
    }
    if let Some(workers) = args.workers {
        config.batch.workers = workers;
    }
    config.batch.fail_fast |= args.fail_fast;
    config.input.include_hidden |= args.include_hidden;
    config.validate()?;

    let classes = load_class_table(&args.classes)?;
    let pipeline = DocumentPipeline::new(&config, classes)?;

    let sources = document::discover_documents(
        &args.input,
        &config.input.original_layer,
        config.input.include_hidden,
    )?;
    info!(documents = sources.len(), input = %args.input.display(), "discovered documents");

    let aggregated = aggregate(
        &sources,
        &pipeline,
        BatchOptions {
            workers: config.batch.workers,
            fail_fast: config.batch.fail_fast,
        },
    )?;
    print!("{}", aggregated.report);

    let dataset = split::split_pool(aggregated.pool, &config.data_split)?;
    print!("{}", dataset.stats);

    write_tiles(&args.output, &dataset)?;
    write_provenance_csv(&args.output.join(output::PROVENANCE_FILE), &dataset)?;

    let check = if args.no_validate {
        None
    } else {
        let check = validate_dataset(&args.output, &dataset)?;
        print!("{}", check);
        Some(check)
    };

    if args.manifest_format == ManifestFormat::Json {
        let manifest = Manifest::new(
            &config,
            pipeline.classes(),
            pipeline.tiler().stride(),
            &aggregated.report,
            &dataset.stats,
            check.as_ref(),
        );
        write_manifest(&args.output.join(output::MANIFEST_FILE), &manifest)?;
    }

    if let Some(check) = check.filter(|check| !check.is_ok()) {
        return Err(SegtilerError::InvalidDataset {
            path: args.output,
            problems: check.problem_count(),
        });
    }

    println!(
        "Wrote {} tiles to {}",
        dataset.tiles.len(),
        args.output.display()
    );
    Ok(())
}

/// Execute the check-config subcommand.
fn run_check_config(args: CheckConfigArgs) -> Result<(), SegtilerError> {
    let config = read_build_config(args.config.as_deref())?;
    let tiler = Tiler::new(&config.tiling)?;

    println!("Configuration OK");
    println!(
        "  tile_size {}, overlap {}, stride {}",
        config.tiling.tile_size,
        config.tiling.overlap,
        tiler.stride()
    );
    if let Some(grid) = config.tiling.grid_size {
        let (width, height) = grid_canvas(grid, tiler.tile_size(), tiler.stride());
        println!(
            "  grid {}x{} (rows x cols) resizes canvas to {}x{}",
            grid[0], grid[1], width, height
        );
    }
    println!(
        "  split {:.2}/{:.2}/{:.2}, seed {}",
        config.data_split.train_ratio,
        config.data_split.val_ratio,
        config.data_split.test_ratio,
        config.data_split.seed
    );

    if let (Some(width), Some(height)) = (args.width, args.height) {
        println!(
            "  canvas {}x{}: {} rows x {} cols, padding {} bottom / {} right",
            width,
            height,
            tiler.tiles_along(height),
            tiler.tiles_along(width),
            tiler.padding_for(height),
            tiler.padding_for(width)
        );
    }

    if let Some(path) = args.classes {
        let classes = load_class_table(&path)?;
        println!(
            "  {} classes + background '{}' (id {})",
            classes.classes().len(),
            classes.background().name,
            classes.background_id()
        );
    }

    Ok(())
}
