// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cardkeeper command-line driver.
//
// Runs the scan engine headlessly: `detect` reports the rectangle the engine
// would seed the crop handles with, `crop` runs a whole crop session and
// writes the corrected image.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info};

use cardkeeper_core::error::{CardkeeperError, Result};
use cardkeeper_core::{EngineConfig, Orientation, OutputExtent, Rect, Size};
use cardkeeper_scan::{
    CropSession, FeatureDetector, RectangleDetector, RectangleFeature, SourceImage,
    StagedDetector, VisionDetector,
};

#[derive(Parser)]
#[command(name = "cardkeeper")]
#[command(about = "Detect cards in photos and crop them with perspective correction")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the detected card rectangle as JSON.
    Detect(DetectArgs),

    /// Crop the card out of a photo.
    Crop(CropArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    /// Line detector first, contour detector if it finds nothing.
    Staged,
    /// Hough-line detector only.
    Lines,
    /// Contour detector only.
    Contours,
}

#[derive(Debug, Clone, Args)]
struct SourceArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Orientation tag of the stored pixels (up, right, left-mirrored, ...).
    #[arg(long, default_value = "up")]
    orientation: Orientation,

    /// JSON engine configuration; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Which detector to run.
    #[arg(long, value_enum, default_value_t = Stage::Staged)]
    stage: Stage,

    /// Width of the display the handles are placed in. Defaults to the
    /// upright image width.
    #[arg(long)]
    display_width: Option<f64>,

    /// Height of the display the handles are placed in. Defaults to the
    /// upright image height.
    #[arg(long)]
    display_height: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Write the report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CropArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Path of the cropped image. PNG unless the extension says JPEG.
    #[arg(long)]
    out: PathBuf,

    /// Skip detection and crop the full image bounds.
    #[arg(long)]
    expanded: bool,

    /// Size the output from the quadrilateral's edges instead of the source
    /// extent.
    #[arg(long)]
    quad_edges: bool,

    /// Quarter turns clockwise applied before cropping.
    #[arg(long, default_value_t = 0)]
    rotate: u8,

    /// JPEG quality for `.jpg` / `.jpeg` output.
    #[arg(long, default_value_t = 90)]
    jpeg_quality: u8,
}

/// What `detect` prints.
#[derive(Debug, Serialize)]
struct DetectReport {
    width: u32,
    height: u32,
    orientation: Orientation,
    detected: bool,
    feature: RectangleFeature,
    display_rect: Rect,
    display: RectangleFeature,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Crop(args) => run_crop(&args).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "cardkeeper failed");
            ExitCode::FAILURE
        }
    }
}

// -- Shared setup -------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json_file(path),
        None => Ok(EngineConfig::default()),
    }
}

fn build_detector(stage: Stage, config: &EngineConfig) -> Arc<dyn RectangleDetector> {
    let detector = config.detector.clone();
    match stage {
        Stage::Staged => Arc::new(StagedDetector::with_config(detector)),
        Stage::Lines => Arc::new(FeatureDetector::new(detector)),
        Stage::Contours => Arc::new(VisionDetector::with_config(detector)),
    }
}

fn display_bounds(args: &SourceArgs, image: &SourceImage) -> Result<Rect> {
    let size = image.size();
    let width = args.display_width.unwrap_or(size.width);
    let height = args.display_height.unwrap_or(size.height);
    if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
        return Err(CardkeeperError::InvalidConfig(format!(
            "display size must be positive, got {}x{}",
            width, height
        )));
    }
    Ok(Rect::from_size(Size::new(width, height)))
}

// -- Commands -----------------------------------------------------------------

fn run_detect(args: &DetectArgs) -> Result<()> {
    let source = &args.source;
    let config = load_config(source.config.as_deref())?;
    let image = SourceImage::open(&source.image, source.orientation)?;
    let detector = build_detector(source.stage, &config);

    let feature = RectangleFeature::detect(&image, false, detector.as_ref(), config.crop.fallback_inset);
    let display_rect = Rect::aspect_fit(image.size(), display_bounds(source, &image)?);
    let display = feature.convert_to(display_rect.size, image.orientation());
    info!(detected = feature.is_correct(), "Detection finished");

    let report = DetectReport {
        width: image.pixels().width(),
        height: image.pixels().height(),
        orientation: image.orientation(),
        detected: feature.is_correct(),
        feature,
        display_rect,
        display,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match &args.out {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

async fn run_crop(args: &CropArgs) -> Result<()> {
    let source = &args.source;
    let mut config = load_config(source.config.as_deref())?;
    if args.quad_edges {
        config.crop.output_extent = OutputExtent::QuadEdges;
    }
    let image = SourceImage::open(&source.image, source.orientation)?;
    let bounds = display_bounds(source, &image)?;
    let detector = build_detector(source.stage, &config);

    let mut session = CropSession::new(image, bounds, config.crop.clone());
    session.begin(args.expanded, detector)?;
    session.wait_for_detection().await?;
    for _ in 0..args.rotate % 4 {
        session.rotate_clockwise()?;
    }

    let cropped = session.crop()?;
    write_output(&cropped, &args.out, args.jpeg_quality)?;
    let size = cropped.size();
    info!(
        path = %args.out.display(),
        width = size.width,
        height = size.height,
        "Cropped image written"
    );
    Ok(())
}

fn write_output(image: &SourceImage, path: &Path, jpeg_quality: u8) -> Result<()> {
    let upright = image.to_upright();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let bytes = match extension.as_deref() {
        Some("jpg") | Some("jpeg") => upright.to_jpeg_bytes(jpeg_quality)?,
        _ => upright.to_png_bytes()?,
    };
    std::fs::write(path, bytes)?;
    Ok(())
}
