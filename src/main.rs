//! `zoompaint` CLI - zoom out of an image and inpaint the new surroundings.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zoompaint::model::DEFAULT_MODEL_URL;
use zoompaint::{Config, InpaintConfig, ModelCache, Pipeline, StableDiffusionInpainter};

/// Generate an inpainted image around a zoomed-out subject using Stable Diffusion.
#[derive(Parser, Debug)]
#[command(name = "zoompaint")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the input image.
    #[arg(long, value_name = "PATH")]
    image: PathBuf,

    /// Text prompt for generating the image.
    #[arg(long, value_name = "TEXT")]
    text_prompt: String,

    /// Path to save the generated image.
    #[arg(long, value_name = "PATH")]
    output: PathBuf,

    /// Zoom level. 1 keeps the image as is, 2 shrinks the subject to half size.
    #[arg(long, default_value = "1", value_name = "FLOAT", allow_negative_numbers = true)]
    zoom: f64,

    /// Per-channel distance from white still treated as background (0-255).
    #[arg(long, default_value = "10", value_name = "INT", allow_negative_numbers = true)]
    tolerance: i32,

    /// Number of denoising steps. More steps = better quality but slower.
    #[arg(long, default_value = "50", value_name = "INT")]
    steps: u32,

    /// Classifier-free guidance scale.
    #[arg(long, default_value = "7.5", value_name = "FLOAT")]
    guidance_scale: f32,

    /// Random seed for reproducibility.
    #[arg(long, value_name = "INT")]
    seed: Option<u64>,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Also save the mask handed to the model.
    #[arg(long, value_name = "PATH")]
    mask_output: Option<PathBuf>,

    /// Directory holding the ONNX models. Defaults to the user cache directory.
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Base URL to download missing models from.
    #[arg(long, default_value = DEFAULT_MODEL_URL, value_name = "URL")]
    model_url: String,

    /// Never download models; fail if any are missing.
    #[arg(long)]
    offline: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("zoompaint={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    if !args.image.exists() {
        anyhow::bail!("Input file does not exist: {}", args.image.display());
    }

    // Validate before loading several GB of models
    let config = Config {
        zoom: args.zoom,
        tolerance: args.tolerance,
        output_quality: args.quality,
        mask_output: args.mask_output.clone(),
    };
    config.validate().context("Invalid arguments")?;

    let inpaint_config = InpaintConfig {
        num_steps: args.steps,
        guidance_scale: args.guidance_scale,
        seed: args.seed,
    };
    inpaint_config.validate().context("Invalid arguments")?;

    let cache = match &args.model_dir {
        Some(dir) => ModelCache::with_dir(dir),
        None => ModelCache::new(),
    }
    .context("Failed to prepare model cache")?
    .base_url(args.model_url.as_str())
    .offline(args.offline);

    let inpainter = StableDiffusionInpainter::new(inpaint_config, &cache)
        .context("Failed to load inpainting model")?;

    let mut pipeline = Pipeline::new(config, inpainter).context("Failed to initialize pipeline")?;

    pipeline
        .process(&args.image, &args.output, &args.text_prompt)
        .context("Failed to process image")?;

    println!("Image saved to {}", args.output.display());

    Ok(())
}
