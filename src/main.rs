use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use deskup::video::Camera;
use deskup::{
    config, storage, AnalysisRequest, Calibration, DeskStrategy, OnnxLandmarkProvider, Pipeline,
};
use image::DynamicImage;
use log::info;

#[derive(Parser)]
#[command(name = "deskup")]
#[command(version, about = "Ergonomic desk height recommendations from a single photo")]
struct Cli {
    /// Log intermediate values
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze posture and recommend a desk height
    Analyze {
        /// Image file to analyze (captures from the camera when omitted)
        image: Option<PathBuf>,
        /// Current desk height in cm, 0 if unknown
        #[arg(short, long, default_value_t = 0.0)]
        current_height: f32,
        /// Your height in cm, skips estimation
        #[arg(short, long)]
        user_height: Option<f32>,
        /// Override the configured recommendation strategy
        #[arg(short, long)]
        strategy: Option<Strategy>,
        /// Ignore any stored calibration
        #[arg(long)]
        no_calibration: bool,
    },
    /// Store a pixels-per-cm calibration
    Calibrate {
        /// Your actual height in cm
        #[arg(long)]
        height: f32,
        /// Measured pixel span of your full height (otherwise uses the eye distance)
        #[arg(long)]
        pixels: Option<f32>,
        /// Image to calibrate from (captures from the camera when omitted)
        #[arg(long, conflicts_with = "pixels")]
        image: Option<PathBuf>,
    },
    /// Remove the stored calibration
    Reset,
    /// Open config file in editor
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Ergonomic,
    ElbowRatio,
}

impl From<Strategy> for DeskStrategy {
    fn from(value: Strategy) -> Self {
        match value {
            Strategy::Ergonomic => DeskStrategy::Ergonomic,
            Strategy::ElbowRatio => DeskStrategy::ElbowRatio,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::builder()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cfg = config::load_config(None)?;

    match cli.command {
        Commands::Analyze {
            image,
            current_height,
            user_height,
            strategy,
            no_calibration,
        } => analyze(
            &cfg,
            image,
            current_height,
            user_height,
            strategy,
            no_calibration,
        ),
        Commands::Calibrate {
            height,
            pixels,
            image,
        } => calibrate(&cfg, height, pixels, image.as_deref()),
        Commands::Reset => reset(),
        Commands::Config => open_config(),
    }
}

fn build_pipeline(cfg: &config::Config) -> Result<Pipeline<OnnxLandmarkProvider>> {
    let provider =
        OnnxLandmarkProvider::new(&cfg.models).context("Failed to load landmark models")?;
    Ok(Pipeline::new(provider, cfg.analysis))
}

fn capture(cfg: &config::Config) -> Result<DynamicImage> {
    info!("Opening camera: {}", cfg.camera);
    let mut camera = Camera::open(&cfg.camera).context("Failed to open camera")?;
    camera
        .snapshot(cfg.warmup_frames)
        .context("Failed to capture frame")
}

fn analyze(
    cfg: &config::Config,
    image: Option<PathBuf>,
    current_height: f32,
    user_height: Option<f32>,
    strategy: Option<Strategy>,
    no_calibration: bool,
) -> Result<()> {
    let mut cfg = cfg.clone();
    if let Some(strategy) = strategy {
        cfg.analysis.strategy = strategy.into();
    }

    let calibration = if no_calibration {
        None
    } else {
        storage::load_calibration(None)
            .context("Failed to load calibration")?
            .map(|record| record.calibration())
            .transpose()?
    };
    match &calibration {
        Some(cal) => info!("Using stored calibration: {:.3} px/cm", cal.pixels_per_cm()),
        None => info!("No calibration, using proportional height estimate"),
    }

    let request = AnalysisRequest {
        current_desk_height_cm: current_height,
        user_height_cm: user_height,
        calibration,
    };
    let mut pipeline = build_pipeline(&cfg)?;

    let result = match image {
        Some(path) => {
            info!("Analyzing {}", path.display());
            let bytes =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            pipeline.analyze_bytes(&bytes, &request)?
        }
        None => {
            let frame = capture(&cfg)?;
            pipeline.analyze(&frame, &request)?
        }
    };

    info!("{}", result.message);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn calibrate(
    cfg: &config::Config,
    height: f32,
    pixels: Option<f32>,
    source: Option<&Path>,
) -> Result<()> {
    let calibration = match pixels {
        Some(pixels) => Calibration::from_measurement(height, pixels)?,
        None => {
            let frame = match source {
                Some(path) => {
                    image::open(path).with_context(|| format!("opening {}", path.display()))?
                }
                None => capture(cfg)?,
            };
            let mut pipeline = build_pipeline(cfg)?;
            pipeline
                .calibrate(&frame, height)
                .context("Calibration failed. Make sure your face is visible and well-lit.")?
        }
    };

    let record = storage::CalibrationRecord::new(calibration, height);
    storage::save_calibration(&record, None).context("Failed to save calibration")?;

    info!(
        "✓ Calibration stored: {:.3} px/cm",
        calibration.pixels_per_cm()
    );
    Ok(())
}

fn reset() -> Result<()> {
    if storage::clear_calibration(None).context("Failed to remove calibration")? {
        info!("✓ Calibration removed");
    } else {
        info!("No calibration stored");
    }
    Ok(())
}

fn open_config() -> Result<()> {
    let config_path = config::CONFIG_PATH.as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
