//! Experiment orchestration: directory layout, then training, then evaluation.
//!
//! The phases are strictly sequential. Evaluation only starts once training
//! reached a terminal state, and any training error skips evaluation entirely.

use crate::data::DataLoaders;
use crate::error::{ExperimentError, Result};
use crate::evaluation::{ArtifactRenderer, Evaluator, PngStripRenderer, artifact_name};
use crate::model::Model;
use crate::persistence;
use crate::training::{Trainer, TrainingParams, TrainingReport};
use std::path::{Path, PathBuf};

pub const TRAIN_DIR: &str = "train";
pub const EVALUATION_DIR: &str = "evaluation";
pub const CHECKPOINT_FILE: &str = "model.pt";

/// Paths of everything an experiment writes under its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentLayout {
    root: PathBuf,
}

impl ExperimentLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn train_dir(&self) -> PathBuf {
        self.root.join(TRAIN_DIR)
    }

    pub fn eval_dir(&self) -> PathBuf {
        self.root.join(EVALUATION_DIR)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.train_dir().join(CHECKPOINT_FILE)
    }

    pub fn metrics_path(&self, metrics_filename: &str) -> PathBuf {
        self.train_dir().join(metrics_filename)
    }

    pub fn artifact_path(&self, index: usize, extension: &str) -> PathBuf {
        self.eval_dir().join(artifact_name(index, extension))
    }
}

/// Runs one experiment end to end. Construct, then call [`Experimenter::run`].
pub struct Experimenter {
    layout: ExperimentLayout,
    loaders: Box<dyn DataLoaders>,
    model: Box<dyn Model>,
    params: Option<TrainingParams>,
    evaluator: Evaluator,
    last_report: Option<TrainingReport>,
}

impl Experimenter {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        loaders: Box<dyn DataLoaders>,
        model: Box<dyn Model>,
        params: TrainingParams,
    ) -> Self {
        let layout = ExperimentLayout::new(work_dir);
        let evaluator = Evaluator::new(Box::new(PngStripRenderer::default()))
            .with_checkpoint(layout.checkpoint_path());
        Self {
            layout,
            loaders,
            model,
            params: Some(params),
            evaluator,
            last_report: None,
        }
    }

    /// Replace the default PNG renderer used for evaluation artifacts.
    pub fn with_renderer(mut self, renderer: Box<dyn ArtifactRenderer>) -> Self {
        self.evaluator = Evaluator::new(renderer).with_checkpoint(self.layout.checkpoint_path());
        self
    }

    pub fn layout(&self) -> &ExperimentLayout {
        &self.layout
    }

    /// Report of the completed training phase, if it has run.
    pub fn last_report(&self) -> Option<&TrainingReport> {
        self.last_report.as_ref()
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    /// Train to a terminal state, then evaluate the best checkpoint.
    pub fn run(&mut self) -> Result<()> {
        let params = self.params.take().ok_or_else(|| {
            ExperimentError::consistency("experiment has already run; build a new Experimenter")
        })?;
        let params = self.bind_checkpoint(params);

        let train_dir = self.layout.train_dir();
        persistence::ensure_dir(&train_dir)?;
        tracing::info!(dir = %self.layout.root().display(), "experiment started");

        let mut trainer = Trainer::new(params, &train_dir);
        let report = trainer.run(self.model.as_mut(), self.loaders.as_ref())?;
        self.last_report = Some(report);

        let eval_dir = self.layout.eval_dir();
        persistence::ensure_dir(&eval_dir)?;
        let artifacts = self
            .evaluator
            .run(self.model.as_mut(), self.loaders.as_ref(), &eval_dir)?;

        tracing::info!(
            dir = %self.layout.root().display(),
            artifacts,
            "experiment finished"
        );
        Ok(())
    }

    fn bind_checkpoint(&self, params: TrainingParams) -> TrainingParams {
        let expected = self.layout.checkpoint_path();
        if params.early_stopping().save_path() != expected {
            tracing::warn!(
                configured = %params.early_stopping().save_path().display(),
                using = %expected.display(),
                "checkpoint path rebound to experiment layout"
            );
            return params.with_checkpoint_path(expected);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MovingFrames;
    use crate::nn::{FrameRegressor, L1Loss, MseLoss, Sgd};
    use crate::training::{EarlyStopping, TrainerState};
    use tempfile::TempDir;

    fn experimenter(root: &Path, checkpoint: &Path) -> Experimenter {
        let loaders = MovingFrames::new(4, 2, 1)
            .unwrap()
            .loaders(5, 2, 20, 0)
            .unwrap();
        let params = TrainingParams::new(
            2,
            2,
            Box::new(MseLoss),
            Box::new(L1Loss),
            Box::new(Sgd::new(0.05).unwrap()),
            EarlyStopping::new(5, false, 0.0, checkpoint).unwrap(),
            "metrics.csv",
        )
        .unwrap();
        Experimenter::new(
            root,
            Box::new(loaders),
            Box::new(FrameRegressor::new(2, 1, 0).unwrap()),
            params,
        )
    }

    #[test]
    fn test_layout_paths() {
        let layout = ExperimentLayout::new("/runs/a");
        assert_eq!(layout.train_dir(), PathBuf::from("/runs/a/train"));
        assert_eq!(layout.eval_dir(), PathBuf::from("/runs/a/evaluation"));
        assert_eq!(layout.checkpoint_path(), PathBuf::from("/runs/a/train/model.pt"));
        assert_eq!(
            layout.metrics_path("metrics.csv"),
            PathBuf::from("/runs/a/train/metrics.csv")
        );
        assert_eq!(
            layout.artifact_path(3, "png"),
            PathBuf::from("/runs/a/evaluation/test-case3.png")
        );
    }

    #[test]
    fn test_checkpoint_path_is_rebound() {
        let dir = TempDir::new().unwrap();
        let stray = dir.path().join("elsewhere").join("model.pt");
        let mut exp = experimenter(dir.path(), &stray);

        exp.run().unwrap();
        assert!(exp.layout().checkpoint_path().exists());
        assert!(!stray.exists());
    }

    #[test]
    fn test_run_twice_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut exp = experimenter(dir.path(), &dir.path().join("train/model.pt"));
        exp.run().unwrap();
        assert_eq!(exp.last_report().unwrap().state, TrainerState::Exhausted);
        assert!(matches!(exp.run(), Err(ExperimentError::Consistency { .. })));
    }
}
