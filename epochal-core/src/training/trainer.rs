//! Epoch loop: optimize on the train split, score on the validation split,
//! and let [`EarlyStopping`] decide when to halt.

use crate::data::{Batch, DataLoaders};
use crate::error::{ConfigError, ExperimentError, Result};
use crate::model::Model;
use crate::nn::{Loss, Metric, Optimizer};
use crate::training::early_stopping::EarlyStopping;
use crate::training::metrics::MetricsRecorder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Column name for the mean training loss of an epoch.
pub const TRAIN_LOSS: &str = "train_loss";

/// Training configuration bundle, validated at construction.
pub struct TrainingParams {
    epochs: usize,
    batch_size: usize,
    loss_criterion: Box<dyn Loss>,
    accuracy_criterion: Box<dyn Metric>,
    optimizer: Box<dyn Optimizer>,
    early_stopping: EarlyStopping,
    metrics_filename: String,
}

impl TrainingParams {
    pub fn new(
        epochs: usize,
        batch_size: usize,
        loss_criterion: Box<dyn Loss>,
        accuracy_criterion: Box<dyn Metric>,
        optimizer: Box<dyn Optimizer>,
        early_stopping: EarlyStopping,
        metrics_filename: &str,
    ) -> std::result::Result<Self, ConfigError> {
        if epochs == 0 {
            return Err(ConfigError::invalid("epochs", "must be greater than 0"));
        }
        if batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be greater than 0"));
        }
        validate_metrics_filename(metrics_filename)?;
        Ok(Self {
            epochs,
            batch_size,
            loss_criterion,
            accuracy_criterion,
            optimizer,
            early_stopping,
            metrics_filename: metrics_filename.to_string(),
        })
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn metrics_filename(&self) -> &str {
        &self.metrics_filename
    }

    pub fn early_stopping(&self) -> &EarlyStopping {
        &self.early_stopping
    }

    /// Redirect checkpoint writes; used when the experiment layout fixes the path.
    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.early_stopping = self.early_stopping.with_save_path(path);
        self
    }
}

impl std::fmt::Debug for TrainingParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingParams")
            .field("epochs", &self.epochs)
            .field("batch_size", &self.batch_size)
            .field("loss_criterion", &self.loss_criterion.name())
            .field("accuracy_criterion", &self.accuracy_criterion.name())
            .field("optimizer", &self.optimizer.name())
            .field("early_stopping", &self.early_stopping)
            .field("metrics_filename", &self.metrics_filename)
            .finish()
    }
}

fn validate_metrics_filename(name: &str) -> std::result::Result<(), ConfigError> {
    let path = Path::new(name);
    let is_plain = path.file_name().is_some_and(|f| f == path.as_os_str());
    if name.is_empty() || !is_plain {
        return Err(ConfigError::invalid(
            "metrics_filename",
            format!("must be a plain file name, got '{name}'"),
        ));
    }
    Ok(())
}

/// Lifecycle of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainerState {
    Running,
    StoppedEarly,
    Exhausted,
}

/// Summary of a finished training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub state: TrainerState,
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_score: Option<f64>,
    pub checkpoint_writes: usize,
    pub metrics_path: PathBuf,
}

pub struct Trainer {
    params: TrainingParams,
    recorder: MetricsRecorder,
    metrics_path: PathBuf,
    state: TrainerState,
    epoch: usize,
    finished: bool,
}

impl Trainer {
    /// Create a trainer whose metrics table lands in `train_dir`.
    pub fn new(params: TrainingParams, train_dir: &Path) -> Self {
        let metrics_path = train_dir.join(&params.metrics_filename);
        Self {
            params,
            recorder: MetricsRecorder::new(),
            metrics_path,
            state: TrainerState::Running,
            epoch: 0,
            finished: false,
        }
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn epoch(&self) -> usize {
        self.epoch
    }

    pub fn recorder(&self) -> &MetricsRecorder {
        &self.recorder
    }

    pub fn early_stopping(&self) -> &EarlyStopping {
        &self.params.early_stopping
    }

    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }

    /// Run epochs until early stopping fires or the epoch budget is spent,
    /// then flush the metrics table.
    ///
    /// Any error aborts the run before the metrics flush. A trainer runs at
    /// most once, whether that run succeeds or fails.
    pub fn run(
        &mut self,
        model: &mut dyn Model,
        loaders: &dyn DataLoaders,
    ) -> Result<TrainingReport> {
        if self.finished {
            return Err(ExperimentError::consistency(
                "trainer has already run; build a new one for another run",
            ));
        }
        self.finished = true;
        let val_column = format!("val_{}", self.params.accuracy_criterion.name());
        tracing::info!(
            epochs = self.params.epochs,
            batch_size = self.params.batch_size,
            optimizer = self.params.optimizer.name(),
            loss = self.params.loss_criterion.name(),
            metric = self.params.accuracy_criterion.name(),
            "training started"
        );

        while self.state == TrainerState::Running {
            let started = Instant::now();
            let train_loss = self.train_epoch(model, loaders)?;
            let val_score = self.validate_epoch(model, loaders)?;

            let stop = self.params.early_stopping.evaluate(val_score, model)?;
            self.recorder.record(
                self.epoch,
                &[(TRAIN_LOSS, train_loss), (val_column.as_str(), val_score)],
            );
            tracing::info!(
                epoch = self.epoch,
                train_loss,
                val_score,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "epoch finished"
            );

            self.epoch += 1;
            if stop {
                self.state = TrainerState::StoppedEarly;
            } else if self.epoch >= self.params.epochs {
                self.state = TrainerState::Exhausted;
            }
        }

        self.recorder.flush(&self.metrics_path)?;

        let report = TrainingReport {
            state: self.state,
            epochs_run: self.epoch,
            best_epoch: self.params.early_stopping.best_epoch(),
            best_score: self.params.early_stopping.best_score(),
            checkpoint_writes: self.params.early_stopping.checkpoint_writes(),
            metrics_path: self.metrics_path.clone(),
        };
        tracing::info!(
            state = ?report.state,
            epochs_run = report.epochs_run,
            best_epoch = ?report.best_epoch,
            best_score = ?report.best_score,
            "training finished"
        );
        Ok(report)
    }

    fn train_epoch(&mut self, model: &mut dyn Model, loaders: &dyn DataLoaders) -> Result<f64> {
        let mut total = 0.0;
        let mut batches = 0usize;
        for batch in loaders.train(self.params.batch_size) {
            let batch = non_empty(batch?, "training", self.epoch)?;
            model.zero_grad();
            let prediction = model.forward(&batch.inputs)?;
            let loss = self
                .params
                .loss_criterion
                .compute(&prediction, &batch.targets)?;
            let loss = ExperimentError::ensure_finite(
                &format!("training loss (epoch {}, batch {batches})", self.epoch),
                loss,
            )?;
            let grad = self
                .params
                .loss_criterion
                .gradient(&prediction, &batch.targets)?;
            model.backward(&grad)?;
            self.params.optimizer.step(model)?;

            tracing::debug!(
                epoch = self.epoch,
                batch = batches,
                size = batch.len(),
                loss,
                "train batch"
            );
            total += loss;
            batches += 1;
        }
        if batches == 0 {
            return Err(ExperimentError::consistency(
                "training split yielded no batches",
            ));
        }
        Ok(total / batches as f64)
    }

    fn validate_epoch(&mut self, model: &mut dyn Model, loaders: &dyn DataLoaders) -> Result<f64> {
        let mut total = 0.0;
        let mut batches = 0usize;
        for batch in loaders.validation(self.params.batch_size) {
            let batch = non_empty(batch?, "validation", self.epoch)?;
            let prediction = model.forward(&batch.inputs)?;
            let score = self
                .params
                .accuracy_criterion
                .compute(&prediction, &batch.targets)?;
            let score = ExperimentError::ensure_finite(
                &format!("validation metric (epoch {}, batch {batches})", self.epoch),
                score,
            )?;
            total += score;
            batches += 1;
        }
        if batches == 0 {
            return Err(ExperimentError::consistency(
                "validation split yielded no batches",
            ));
        }
        Ok(total / batches as f64)
    }
}

fn non_empty(batch: Batch, split: &str, epoch: usize) -> Result<Batch> {
    if batch.is_empty() {
        return Err(ExperimentError::data(format!(
            "{split} split yielded an empty batch in epoch {epoch}"
        )));
    }
    Ok(batch)
}
