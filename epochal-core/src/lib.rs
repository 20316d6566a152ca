//! # epochal-core
//!
//! Experiment orchestration for iterative model optimization. An
//! [`Experimenter`] lays out a working directory, runs a [`Trainer`] until
//! [`EarlyStopping`] halts it or the epoch budget runs out, then hands the
//! best checkpoint to an [`Evaluator`] that writes one artifact per held-out
//! sample:
//!
//! ```text
//! <root>/
//!   train/model.pt            best checkpoint
//!   train/<metrics_filename>  one CSV row per executed epoch
//!   evaluation/test-case{i}.png
//! ```
//!
//! The model, criteria, optimizer, and data loaders are capability traits
//! ([`Model`], [`Loss`], [`Metric`], [`Optimizer`], [`DataLoaders`]); the
//! `nn` and `data` modules carry small reference implementations.

pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod experiment;
pub mod model;
pub mod nn;
pub mod persistence;
pub mod tensor;
pub mod training;

// Re-export commonly used types at the crate root.
pub use config::{DataConfig, ExperimentConfig, load_config};
pub use data::{Batch, DataLoaders, InMemoryLoaders, MovingFrames, Sample};
pub use error::{ConfigError, ExperimentError, Result};
pub use evaluation::{ArtifactRenderer, Evaluator, PngStripRenderer};
pub use experiment::{ExperimentLayout, Experimenter};
pub use model::{Model, ModelState, Parameter};
pub use nn::{CriterionKind, FrameRegressor, Loss, Metric, Optimizer, OptimizerKind};
pub use tensor::Tensor;
pub use training::{
    EarlyStopping, EarlyStoppingConfig, MetricsRecorder, Mode, Trainer, TrainerState,
    TrainingParams, TrainingReport,
};
