//! Early stopping with best-checkpoint persistence.
//!
//! [`EarlyStopping`] is the only writer of the checkpoint file: a checkpoint is
//! written exactly when the monitored score improves, so the file on disk is
//! always the best model seen so far, never merely the latest.

use crate::error::{ConfigError, ExperimentError, Result};
use crate::model::Model;
use crate::persistence;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which direction counts as improvement for the monitored score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Lower is better (loss-style metrics).
    #[default]
    Min,
    /// Higher is better (accuracy-style metrics).
    Max,
}

/// Serializable early-stopping settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyStoppingConfig {
    /// Consecutive non-improving epochs tolerated before stopping.
    #[serde(default = "default_patience")]
    pub patience: usize,
    /// Minimum change that counts as an improvement.
    #[serde(default = "default_delta")]
    pub delta: f64,
    /// Emit progress lines at info level instead of debug.
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub mode: Mode,
}

impl Default for EarlyStoppingConfig {
    fn default() -> Self {
        Self {
            patience: default_patience(),
            delta: default_delta(),
            verbose: false,
            mode: Mode::Min,
        }
    }
}

fn default_patience() -> usize {
    30
}

fn default_delta() -> f64 {
    1e-4
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    delta: f64,
    verbose: bool,
    mode: Mode,
    save_path: PathBuf,
    best_score: Option<f64>,
    best_epoch: Option<usize>,
    counter: usize,
    stopped: bool,
    evaluations: usize,
    checkpoint_writes: usize,
}

impl EarlyStopping {
    pub fn new(
        patience: usize,
        verbose: bool,
        delta: f64,
        save_path: impl Into<PathBuf>,
    ) -> std::result::Result<Self, ConfigError> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(ConfigError::invalid(
                "early_stopping.delta",
                format!("must be a finite number >= 0, got {delta}"),
            ));
        }
        Ok(Self {
            patience,
            delta,
            verbose,
            mode: Mode::Min,
            save_path: save_path.into(),
            best_score: None,
            best_epoch: None,
            counter: 0,
            stopped: false,
            evaluations: 0,
            checkpoint_writes: 0,
        })
    }

    pub fn from_config(
        config: &EarlyStoppingConfig,
        save_path: impl Into<PathBuf>,
    ) -> std::result::Result<Self, ConfigError> {
        let stopping = Self::new(config.patience, config.verbose, config.delta, save_path)?;
        Ok(stopping.with_mode(config.mode))
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Point checkpoint writes at a different file.
    pub fn with_save_path(mut self, save_path: impl Into<PathBuf>) -> Self {
        self.save_path = save_path.into();
        self
    }

    /// Feed one epoch's monitored score; returns `true` once training should stop.
    ///
    /// On improvement the model is persisted before returning. A failed write
    /// is returned as an error, never swallowed.
    pub fn evaluate(&mut self, score: f64, model: &dyn Model) -> Result<bool> {
        let score = ExperimentError::ensure_finite("monitored score", score)?;
        let epoch = self.evaluations;

        match self.best_score {
            None => {
                self.save_checkpoint(None, score, model)?;
                self.record_best(score, epoch);
            }
            Some(best) if self.improves(score, best) => {
                self.save_checkpoint(Some(best), score, model)?;
                self.record_best(score, epoch);
                self.counter = 0;
            }
            Some(_) => {
                self.counter += 1;
                self.report(format_args!(
                    "EarlyStopping counter: {} out of {}",
                    self.counter, self.patience
                ));
                if self.counter >= self.patience {
                    self.stopped = true;
                }
            }
        }
        // Only completed evaluations advance the epoch index.
        self.evaluations += 1;
        Ok(self.stopped)
    }

    fn improves(&self, score: f64, best: f64) -> bool {
        match self.mode {
            Mode::Min => score < best - self.delta,
            Mode::Max => score > best + self.delta,
        }
    }

    fn record_best(&mut self, score: f64, epoch: usize) {
        self.best_score = Some(score);
        self.best_epoch = Some(epoch);
    }

    fn save_checkpoint(
        &mut self,
        previous: Option<f64>,
        score: f64,
        model: &dyn Model,
    ) -> Result<()> {
        match previous {
            Some(prev) => self.report(format_args!(
                "Validation score improved ({prev:.6} --> {score:.6}). Saving model to {}",
                self.save_path.display()
            )),
            None => self.report(format_args!(
                "Initial validation score {score:.6}. Saving model to {}",
                self.save_path.display()
            )),
        }
        let bytes = persistence::save_checkpoint(&self.save_path, &model.state())?;
        self.checkpoint_writes += 1;
        tracing::debug!(path = %self.save_path.display(), bytes, "checkpoint written");
        Ok(())
    }

    fn report(&self, line: std::fmt::Arguments<'_>) {
        if self.verbose {
            tracing::info!("{line}");
        } else {
            tracing::debug!("{line}");
        }
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    /// Zero-based index of the evaluation that produced the best score.
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn checkpoint_writes(&self) -> usize {
        self.checkpoint_writes
    }
}
