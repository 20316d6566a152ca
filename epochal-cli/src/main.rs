//! epochal CLI: train a model to early stopping, then render its held-out predictions.
//!
//! Drives one experiment on the synthetic moving-square dataset using the
//! layered configuration from `epochal-core`.

use anyhow::Context;
use clap::Parser;
use epochal_core::{ExperimentConfig, Experimenter, FrameRegressor, PngStripRenderer};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// epochal: iterative training with early stopping and checkpointed evaluation
#[derive(Parser, Debug)]
#[command(name = "epochal", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML, or JSON with a .json extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Experiment root; train/ and evaluation/ are created beneath it
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Epoch budget
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.quiet);

    let mut config = epochal_core::load_config(cli.config.as_deref())
        .context("failed to load configuration")?;
    apply_overrides(&mut config, &cli);

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut experimenter = build_experimenter(&config)?;
    experimenter
        .run()
        .with_context(|| format!("experiment in {} failed", config.work_dir.display()))?;

    if let Some(report) = experimenter.last_report()
        && !cli.quiet
    {
        println!(
            "{:?} after {} epoch(s); best epoch {} (score {})",
            report.state,
            report.epochs_run,
            report
                .best_epoch
                .map_or_else(|| "-".to_string(), |e| e.to_string()),
            report
                .best_score
                .map_or_else(|| "-".to_string(), |s| format!("{s:.6}")),
        );
        println!("  checkpoint: {}", experimenter.layout().checkpoint_path().display());
        println!("  metrics:    {}", report.metrics_path.display());
        println!("  artifacts:  {}", experimenter.layout().eval_dir().display());
    }
    Ok(())
}

fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Human-readable stderr plus JSON file logging. The returned guard flushes
/// the file writer on drop and must outlive the experiment.
fn init_tracing(verbose: u8, quiet: bool) -> WorkerGuard {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(log_filter(verbose, quiet)));

    let log_dir = directories::ProjectDirs::from("dev", "epochal", "epochal")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "epochal.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();
    guard
}

fn apply_overrides(config: &mut ExperimentConfig, cli: &Cli) {
    if let Some(dir) = &cli.work_dir {
        config.work_dir = dir.clone();
    }
    if let Some(epochs) = cli.epochs {
        config.epochs = epochs;
    }
}

fn build_experimenter(config: &ExperimentConfig) -> anyhow::Result<Experimenter> {
    let params = config
        .training_params()
        .context("invalid training configuration")?;
    let loaders = config
        .data
        .loaders()
        .context("failed to build the synthetic dataset")?;
    let model = FrameRegressor::new(
        config.data.input_frames,
        config.data.output_frames,
        config.data.seed,
    )
    .context("failed to build the model")?;

    Ok(Experimenter::new(
        &config.work_dir,
        Box::new(loaders),
        Box::new(model),
        params,
    )
    .with_renderer(Box::new(PngStripRenderer::new(config.render_scale))))
}
