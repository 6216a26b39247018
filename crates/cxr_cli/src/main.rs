//! cxr-rs CLI for chest X-ray classification and Grad-CAM explanations.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cxr::{
    analyze_with_probabilities, class_list, service_info, InferenceContext, OutputBundle,
    PipelineConfig,
};
use cxr_analysis::{ClassProbabilities, PredictionReport, PredictionSet, Threshold};
use cxr_core::backend::{resolve_device, ExplainBackend};
use cxr_core::Seed;
use cxr_models::{save_weights, ChestXrayClassifierConfig, TargetLayer};
use cxr_transforms::{decode_image, InputImage};

#[derive(Parser)]
#[command(name = "cxr")]
#[command(author, version)]
#[command(about = "Chest X-ray multi-label classification with Grad-CAM heatmaps")]
#[command(long_about = "cxr-rs: multi-label chest X-ray classification with Grad-CAM explanations.

EXAMPLES:
  # List the disease classes
  cxr classes

  # Create a randomly initialised checkpoint
  cxr init --output models/densenet121

  # Classify an image and write one overlay per positive label
  cxr predict --model models/densenet121 --image chest.png --output out/

  # Lower the threshold and explain an earlier dense block
  cxr predict --model models/densenet121 --image chest.png --threshold 0.3 --target-layer denseblock3")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an image and generate Grad-CAM overlays
    Predict {
        /// Checkpoint path (without extension)
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,

        /// Image file (PNG, JPEG, BMP, TIFF)
        #[arg(long, value_name = "FILE")]
        image: PathBuf,

        /// Decision threshold in [0, 1]
        #[arg(long, value_name = "T")]
        threshold: Option<f32>,

        /// Directory for overlays and bundle.json
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Layer to explain (norm5, denseblock4, transition3, ...)
        #[arg(long, value_name = "LAYER")]
        target_layer: Option<String>,

        /// Compute device
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        /// JSON pipeline configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print the output bundle as JSON instead of a table
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// List the disease classes in output order
    Classes {
        /// Print as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
    /// Load a model and report service status
    Info {
        /// Checkpoint path (without extension)
        #[arg(long, value_name = "PATH")]
        model: Option<PathBuf>,

        /// Compute device
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,

        /// JSON pipeline configuration
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Write a randomly initialised DenseNet-121 checkpoint
    Init {
        /// Checkpoint path (without extension)
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42", value_name = "SEED")]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Predict {
            model,
            image,
            threshold,
            output,
            target_layer,
            device,
            config,
            json,
        } => {
            let config = resolve_config(config.as_deref(), model, threshold, target_layer, device)?;
            handle_predict(&config, &image, output.as_deref(), json)
        }
        Commands::Classes { json } => handle_classes(json),
        Commands::Info {
            model,
            device,
            config,
        } => {
            let config = resolve_config(config.as_deref(), model, None, None, device)?;
            handle_info(&config)
        }
        Commands::Init { output, seed } => handle_init(&output, seed),
    }
}

/// Load the config file (if any) and apply command-line overrides.
fn resolve_config(
    path: Option<&Path>,
    model: Option<PathBuf>,
    threshold: Option<f32>,
    target_layer: Option<String>,
    device: Option<String>,
) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(model) = model {
        config.model_path = Some(model);
    }
    if let Some(threshold) = threshold {
        config.threshold = Threshold::new(threshold)?;
    }
    if let Some(layer) = target_layer {
        config.target_layer = layer
            .parse::<TargetLayer>()
            .map_err(|e| anyhow::anyhow!("Invalid target layer '{}': {}", layer, e))?;
    }
    if let Some(device) = device {
        config.device = device;
    }

    Ok(config)
}

fn load_context(config: &PipelineConfig) -> Result<InferenceContext<ExplainBackend>> {
    let Some(model_path) = config.model_path.as_ref() else {
        bail!("No model given; use --model or set model_path in the config");
    };
    let device = resolve_device(&config.device)?;

    InferenceContext::<ExplainBackend>::from_config(config, device)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))
}

fn handle_predict(config: &PipelineConfig, image: &Path, output: Option<&Path>, json: bool) -> Result<()> {
    let ctx = load_context(config)?;

    let bytes = std::fs::read(image).with_context(|| format!("Failed to read {}", image.display()))?;
    let mut input = InputImage::new(bytes);
    if let Some(mime) = image::ImageFormat::from_path(image).ok().map(|f| f.to_mime_type()) {
        input = input.with_content_type(mime);
    }

    let threshold = config.threshold.value();
    let (bundle, probabilities) = match analyze_with_probabilities(&ctx, &input, threshold) {
        Ok(analysis) => analysis,
        Err(e) => {
            tracing::error!("Analysis of {} failed: {}", image.display(), e);
            bail!(e.public_message());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&bundle)?);
    } else {
        print!("{}", render_report(&probabilities, &bundle.predictions));
    }

    if let Some(dir) = output {
        write_outputs(&bundle, dir)?;
        println!("\nSaved {} overlay(s) to {}", bundle.gradcam_images.len(), dir.display());
    }

    Ok(())
}

fn render_report(probabilities: &ClassProbabilities, predictions: &PredictionSet) -> String {
    format!(
        "=== cxr-rs Prediction ===\n\n{}\nPositive labels: {}\n",
        PredictionReport::new(probabilities, predictions).to_string_table(),
        predictions.labels().join(", ")
    )
}

fn write_outputs(bundle: &OutputBundle, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    for (label, encoded) in bundle.gradcam_images.iter() {
        let overlay = decode_image(encoded)?;
        let path = dir.join(format!("gradcam_{}.png", label));
        overlay
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let bundle_path = dir.join("bundle.json");
    std::fs::write(&bundle_path, serde_json::to_string_pretty(bundle)?)?;
    Ok(())
}

fn handle_classes(json: bool) -> Result<()> {
    let list = class_list();
    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    println!("Disease classes ({}):", list.num_classes);
    for (i, name) in list.classes.iter().enumerate() {
        println!("  {:>2}  {}", i, name);
    }
    Ok(())
}

fn handle_info(config: &PipelineConfig) -> Result<()> {
    let ctx = load_context(config)?;
    let info = service_info(&ctx);

    println!("{}", serde_json::to_string_pretty(&info)?);
    println!("Target layer: {}", ctx.target_layer());
    println!("Input size: {}", ctx.preprocessor().config().size);
    Ok(())
}

fn handle_init(output: &Path, seed: u64) -> Result<()> {
    Seed::new(seed).apply::<ExplainBackend>();

    let device = resolve_device("cpu")?;
    let config = ChestXrayClassifierConfig::default();
    let model = config.init::<ExplainBackend>(&device);

    save_weights(&model, &config, output)
        .with_context(|| format!("Failed to write checkpoint {}", output.display()))?;

    println!("Wrote randomly initialised checkpoint to {}", output.display());
    println!("  Architecture: DenseNet-121, {} classes", config.n_classes);
    println!("  Seed: {}", seed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cxr_analysis::predict;
    use cxr_core::NUM_CLASSES;

    #[test]
    fn test_report_lists_every_class_and_positives() {
        let mut values = vec![0.1f32; NUM_CLASSES];
        values[1] = 0.8;
        let probs = ClassProbabilities::from_vec(values).unwrap();
        let predictions = predict(&probs, Threshold::DEFAULT);

        let report = render_report(&probs, &predictions);
        assert!(report.starts_with("=== cxr-rs Prediction ==="));
        assert!(report.contains("0.8000"));
        assert!(report.contains("Hernia"));
        assert!(report.ends_with("Positive labels: Cardiomegaly\n"));
    }
}
