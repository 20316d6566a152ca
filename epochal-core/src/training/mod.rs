//! Training phase: epoch loop, early stopping, metrics table.

pub mod early_stopping;
pub mod metrics;
pub mod trainer;

pub use early_stopping::{EarlyStopping, EarlyStoppingConfig, Mode};
pub use metrics::{MetricsRecorder, MetricsRow};
pub use trainer::{TRAIN_LOSS, Trainer, TrainerState, TrainingParams, TrainingReport};
