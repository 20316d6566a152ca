//! Property-based tests for the training and evaluation phases using proptest.

use proptest::prelude::*;

use epochal_core::data::InMemoryLoaders;
use epochal_core::nn::{MseLoss, Sgd};
use epochal_core::{
    EarlyStopping, Evaluator, FrameRegressor, Metric, MetricsRecorder, MovingFrames,
    PngStripRenderer, Tensor, Trainer, TrainerState, TrainingParams,
};
use std::cell::Cell;
use std::path::Path;
use tempfile::TempDir;

struct Scripted {
    scores: Vec<f64>,
    calls: Cell<usize>,
}

impl Metric for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn compute(&self, _prediction: &Tensor, _target: &Tensor) -> epochal_core::Result<f64> {
        let i = self.calls.get();
        self.calls.set(i + 1);
        Ok(self.scores[i.min(self.scores.len() - 1)])
    }
}

/// Outcome a minimizing early stopper with zero delta must reach.
struct Expected {
    epochs_run: usize,
    stopped: bool,
    best_epoch: usize,
    writes: usize,
}

fn expected(scores: &[f64], patience: usize) -> Expected {
    let mut best: Option<f64> = None;
    let mut out = Expected {
        epochs_run: 0,
        stopped: false,
        best_epoch: 0,
        writes: 0,
    };
    let mut counter = 0;
    for (epoch, &score) in scores.iter().enumerate() {
        out.epochs_run = epoch + 1;
        if best.is_none_or(|b| score < b) {
            best = Some(score);
            out.best_epoch = epoch;
            out.writes += 1;
            counter = 0;
        } else {
            counter += 1;
            if counter >= patience {
                out.stopped = true;
                break;
            }
        }
    }
    out
}

fn loaders(test_samples: usize) -> InMemoryLoaders {
    // 10 samples at 10% validation: exactly one validation batch per epoch.
    MovingFrames::new(4, 2, 1)
        .unwrap()
        .loaders(10, test_samples, 10, 11)
        .unwrap()
}

fn params(dir: &Path, epochs: usize, patience: usize, metric: Box<dyn Metric>) -> TrainingParams {
    TrainingParams::new(
        epochs,
        4,
        Box::new(MseLoss),
        metric,
        Box::new(Sgd::new(0.01).unwrap()),
        EarlyStopping::new(patience, false, 0.0, dir.join("model.pt")).unwrap(),
        "metrics.csv",
    )
    .unwrap()
}

// --- Trainer / early stopping properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn trainer_matches_early_stopping_reference(
        raw in prop::collection::vec(0u8..10, 1..12),
        patience in 1usize..5,
    ) {
        let scores: Vec<f64> = raw.iter().map(|&s| f64::from(s) / 10.0).collect();
        let want = expected(&scores, patience);

        let dir = TempDir::new().unwrap();
        let metric = Scripted { scores: scores.clone(), calls: Cell::new(0) };
        let mut model = FrameRegressor::new(2, 1, 0).unwrap();
        let mut trainer =
            Trainer::new(params(dir.path(), scores.len(), patience, Box::new(metric)), dir.path());
        let report = trainer.run(&mut model, &loaders(1)).unwrap();

        prop_assert_eq!(report.epochs_run, want.epochs_run);
        prop_assert_eq!(report.state == TrainerState::StoppedEarly, want.stopped);
        prop_assert_eq!(report.best_epoch, Some(want.best_epoch));
        prop_assert_eq!(report.checkpoint_writes, want.writes);
        prop_assert_eq!(trainer.recorder().len(), want.epochs_run);
        if want.stopped {
            prop_assert_eq!(trainer.early_stopping().counter(), patience);
        }

        let csv = std::fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        prop_assert_eq!(csv.lines().count(), want.epochs_run + 1);
    }

    #[test]
    fn trainer_without_stop_runs_every_epoch(epochs in 1usize..6) {
        let dir = TempDir::new().unwrap();
        let metric = Scripted { scores: vec![0.5], calls: Cell::new(0) };
        let mut model = FrameRegressor::new(2, 1, 0).unwrap();
        // Patience above the budget: a flat score never triggers a stop.
        let mut trainer =
            Trainer::new(params(dir.path(), epochs, epochs + 1, Box::new(metric)), dir.path());
        let report = trainer.run(&mut model, &loaders(1)).unwrap();

        prop_assert_eq!(report.state, TrainerState::Exhausted);
        prop_assert_eq!(report.epochs_run, epochs);
        prop_assert_eq!(report.checkpoint_writes, 1);
        let epochs_logged: Vec<usize> = trainer.recorder().rows().iter().map(|r| r.epoch).collect();
        prop_assert_eq!(epochs_logged, (0..epochs).collect::<Vec<_>>());
    }
}

// --- Evaluation properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn evaluator_writes_one_artifact_per_test_sample(n in 0usize..6) {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("evaluation");
        let mut model = FrameRegressor::new(2, 1, 0).unwrap();
        let evaluator = Evaluator::new(Box::new(PngStripRenderer::new(1)));

        let written = evaluator.run(&mut model, &loaders(n), &out).unwrap();
        prop_assert_eq!(written, n);

        let mut names: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        let mut want: Vec<String> = (0..n).map(|i| format!("test-case{i}.png")).collect();
        want.sort();
        prop_assert_eq!(names, want);
    }
}

// --- Metrics table properties ---

proptest! {
    #[test]
    fn metrics_flush_is_idempotent(
        rows in prop::collection::vec((0.0f64..10.0, 0.0f64..10.0), 0..8),
    ) {
        let mut recorder = MetricsRecorder::new();
        for (epoch, (loss, score)) in rows.iter().enumerate() {
            recorder.record(epoch, &[("train_loss", *loss), ("val_l1", *score)]);
        }

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metrics.csv");
        recorder.flush(&path).unwrap();
        let first = std::fs::read(&path).unwrap();
        recorder.flush(&path).unwrap();
        let second = std::fs::read(&path).unwrap();

        prop_assert_eq!(&first, &second);
        let text = String::from_utf8(first).unwrap();
        prop_assert_eq!(text.lines().count(), rows.len() + 1);
    }
}
