// rise-track CLI.
//
//   rise-track track --images DIR --point 412,233 --point 455,230 [--roi X,Y,W,H]
//                    [--config FILE] [--env-log CSV] [--out CSV] [--annotate DIR] [--prefix P]
//   rise-track count --image FILE [--config FILE]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use rise_track::convert::split_dynamic;
use rise_track::environment::EnvironmentLog;
use rise_track::overlay::save_overlay;
use rise_track::record::RecordFile;
use rise_track::segment::BubbleSegmenter;
use rise_track::{DirectoryFrameStore, Error, PipelineConfig, Point2, PointSet, Roi, TrackingPipeline};

#[derive(Parser)]
#[command(name = "rise-track")]
#[command(about = "Track starter height and count bubbles across a time-lapse")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track the surface through a directory of photos.
    Track(TrackArgs),
    /// Count bubbles in a single image.
    Count {
        #[arg(long)]
        image: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct TrackArgs {
    /// Directory of jpg/png frames, processed in file-name order.
    #[arg(long)]
    images: PathBuf,

    /// Initial surface point as X,Y. Repeat for each point.
    #[arg(long = "point", required = true, value_parser = parse_point)]
    points: Vec<Point2>,

    /// Jar region as X,Y,W,H; bubbles are counted only inside it.
    #[arg(long, value_parser = parse_roi)]
    roi: Option<Roi>,

    /// JSON pipeline configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Temperature/humidity log, one row per frame.
    #[arg(long)]
    env_log: Option<PathBuf>,

    /// Output CSV.
    #[arg(long, default_value = "starter_measurements.csv")]
    out: PathBuf,

    /// Write processed_<name> overlays into this directory.
    #[arg(long)]
    annotate: Option<PathBuf>,

    /// Only use frames whose name starts with this.
    #[arg(long)]
    prefix: Option<String>,
}

fn parse_point(s: &str) -> std::result::Result<Point2, String> {
    s.parse()
}

fn parse_roi(s: &str) -> std::result::Result<Roi, String> {
    s.parse()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track(args) => run_track(args),
        Commands::Count { image, config } => run_count(&image, config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::from_json_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn run_track(args: TrackArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if args.roi.is_some() {
        config.roi = args.roi;
    }

    let store = DirectoryFrameStore::open(&args.images, args.prefix.as_deref())
        .with_context(|| format!("Failed to list {}", args.images.display()))?
        .with_color(args.annotate.is_some());

    let mut pipeline = TrackingPipeline::new(config).context("Invalid configuration")?;
    if let Some(path) = &args.env_log {
        let log = EnvironmentLog::from_path(path)
            .with_context(|| format!("Failed to read environment log {}", path.display()))?;
        info!("Loaded {} environment readings", log.len());
        pipeline = pipeline.with_environment(log);
    }

    // Created on the first record: a run that fails up front writes nothing.
    let mut writer = RecordFile::new(&args.out);
    let mut annotate_ready = false;
    let records = pipeline.run_with(&store, PointSet::new(args.points), |frame, output| {
        writer.write(&output.record)?;
        if let (Some(dir), true) = (&args.annotate, output.record.is_measured()) {
            if !annotate_ready {
                fs::create_dir_all(dir).map_err(|source| Error::Io {
                    path: dir.clone(),
                    source,
                })?;
                annotate_ready = true;
            }
            save_overlay(dir, frame, output)?;
        }
        Ok(())
    })?;
    writer
        .finish()
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    info!(
        "Wrote {} records to {}",
        records.len(),
        args.out.display()
    );
    Ok(())
}

fn run_count(image_path: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    config.validate().context("Invalid configuration")?;
    let segmenter = BubbleSegmenter::new(config.segmenter).context("Invalid configuration")?;

    let decoded = image::open(image_path)
        .with_context(|| format!("Failed to open image {}", image_path.display()))?;
    let (gray, _) = split_dynamic(decoded, false);
    let region = match config.roi {
        Some(roi) => gray.crop(roi.x, roi.y, roi.width, roi.height),
        None => gray,
    };

    let seg = segmenter.segment(&region);
    info!(
        "{}: {} bubbles ({} contours before filtering)",
        image_path.display(),
        seg.count(),
        seg.candidates_seen
    );
    println!("{}", seg.count());
    Ok(())
}
