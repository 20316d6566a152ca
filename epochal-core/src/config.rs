//! Configuration for epochal experiments.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! explicit config file -> environment. Command-line flags are applied by the
//! caller on top of the extracted value.

use crate::data::{InMemoryLoaders, MovingFrames};
use crate::error::{ConfigError, Result};
use crate::experiment::ExperimentLayout;
use crate::nn::{CriterionKind, OptimizerKind};
use crate::training::{EarlyStopping, EarlyStoppingConfig, TrainingParams};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level experiment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Root directory; `train/` and `evaluation/` are created beneath it.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Epoch budget.
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_optimizer")]
    pub optimizer: OptimizerKind,
    /// Criterion minimized during training.
    #[serde(default = "default_loss")]
    pub loss: CriterionKind,
    /// Criterion monitored on the validation split.
    #[serde(default = "default_accuracy")]
    pub accuracy: CriterionKind,
    #[serde(default = "default_metrics_filename")]
    pub metrics_filename: String,
    #[serde(default)]
    pub early_stopping: EarlyStoppingConfig,
    #[serde(default)]
    pub data: DataConfig,
    /// Pixel upscale factor for evaluation artifacts.
    #[serde(default = "default_render_scale")]
    pub render_scale: u32,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            learning_rate: default_learning_rate(),
            optimizer: default_optimizer(),
            loss: default_loss(),
            accuracy: default_accuracy(),
            metrics_filename: default_metrics_filename(),
            early_stopping: EarlyStoppingConfig::default(),
            data: DataConfig::default(),
            render_scale: default_render_scale(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("runs/latest")
}

fn default_epochs() -> usize {
    50
}

fn default_batch_size() -> usize {
    8
}

fn default_learning_rate() -> f64 {
    5e-4
}

fn default_optimizer() -> OptimizerKind {
    OptimizerKind::Adam
}

fn default_loss() -> CriterionKind {
    CriterionKind::Mse
}

fn default_accuracy() -> CriterionKind {
    CriterionKind::L1
}

fn default_metrics_filename() -> String {
    "metrics.csv".to_string()
}

fn default_render_scale() -> u32 {
    4
}

/// Synthetic moving-square dataset settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Sequences shared between train and validation.
    #[serde(default = "default_samples")]
    pub samples: usize,
    /// Held-out sequences; one evaluation artifact each.
    #[serde(default = "default_test_samples")]
    pub test_samples: usize,
    /// Share of `samples` used for validation, in percent.
    #[serde(default = "default_validation_percent")]
    pub validation_percent: u32,
    #[serde(default = "default_frame_size")]
    pub frame_size: usize,
    #[serde(default = "default_input_frames")]
    pub input_frames: usize,
    #[serde(default = "default_output_frames")]
    pub output_frames: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            test_samples: default_test_samples(),
            validation_percent: default_validation_percent(),
            frame_size: default_frame_size(),
            input_frames: default_input_frames(),
            output_frames: default_output_frames(),
            seed: default_seed(),
        }
    }
}

fn default_samples() -> usize {
    64
}

fn default_test_samples() -> usize {
    8
}

fn default_validation_percent() -> u32 {
    10
}

fn default_frame_size() -> usize {
    16
}

fn default_input_frames() -> usize {
    4
}

fn default_output_frames() -> usize {
    2
}

fn default_seed() -> u64 {
    42
}

impl DataConfig {
    pub fn source(&self) -> std::result::Result<MovingFrames, ConfigError> {
        MovingFrames::new(self.frame_size, self.input_frames, self.output_frames)
    }

    pub fn loaders(&self) -> Result<InMemoryLoaders> {
        self.source()?.loaders(
            self.samples,
            self.test_samples,
            self.validation_percent,
            self.seed,
        )
    }
}

impl ExperimentConfig {
    /// Build validated training parameters, checkpointing into this config's layout.
    pub fn training_params(&self) -> std::result::Result<TrainingParams, ConfigError> {
        let layout = ExperimentLayout::new(&self.work_dir);
        let early_stopping =
            EarlyStopping::from_config(&self.early_stopping, layout.checkpoint_path())?;
        TrainingParams::new(
            self.epochs,
            self.batch_size,
            self.loss.build(),
            self.accuracy.build_metric(),
            self.optimizer.build(self.learning_rate)?,
            early_stopping,
            &self.metrics_filename,
        )
    }
}

/// Load configuration with layered merging.
///
/// An explicit `config_file` must exist; `.json` files are read as JSON,
/// anything else as TOML. Environment variables use the `EPOCHAL_` prefix
/// with `__` for nesting (e.g. `EPOCHAL_EARLY_STOPPING__PATIENCE=5`).
pub fn load_config(
    config_file: Option<&Path>,
) -> std::result::Result<ExperimentConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ExperimentConfig::default()));

    // User-level config
    if let Some(dirs) = directories::ProjectDirs::from("dev", "epochal", "epochal") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Toml::file(path)),
        };
    }

    figment = figment.merge(Env::prefixed("EPOCHAL_").split("__"));

    figment
        .extract()
        .map_err(|e| ConfigError::Load(Box::new(e)))
}
