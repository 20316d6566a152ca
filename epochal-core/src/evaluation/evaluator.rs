//! Evaluation phase: one artifact per held-out sample.

use crate::data::DataLoaders;
use crate::error::{ExperimentError, Result};
use crate::evaluation::render::ArtifactRenderer;
use crate::model::Model;
use crate::persistence;
use crate::tensor::Tensor;
use std::path::{Path, PathBuf};

/// File name of the artifact for the test sample at `index`.
pub fn artifact_name(index: usize, extension: &str) -> String {
    format!("test-case{index}.{extension}")
}

pub struct Evaluator {
    renderer: Box<dyn ArtifactRenderer>,
    checkpoint: Option<PathBuf>,
}

impl Evaluator {
    /// Evaluate whatever weights the model currently holds.
    pub fn new(renderer: Box<dyn ArtifactRenderer>) -> Self {
        Self {
            renderer,
            checkpoint: None,
        }
    }

    /// Restore the model from `path` before evaluating.
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = Some(path.into());
        self
    }

    pub fn extension(&self) -> &str {
        self.renderer.extension()
    }

    /// Render every test sample into `output_dir`, returning the artifact count.
    ///
    /// The loader must yield exactly `test_len()` samples. A rendering failure
    /// aborts the whole pass; there is no partial artifact set.
    pub fn run(
        &self,
        model: &mut dyn Model,
        loaders: &dyn DataLoaders,
        output_dir: &Path,
    ) -> Result<usize> {
        if let Some(path) = &self.checkpoint {
            let state = persistence::load_checkpoint(path)?;
            model.load_state(&state)?;
            tracing::info!(path = %path.display(), "restored best checkpoint");
        }
        persistence::ensure_dir(output_dir)?;

        let declared = loaders.test_len();
        let mut written = 0usize;
        for (index, sample) in loaders.test().enumerate() {
            if index >= declared {
                return Err(ExperimentError::consistency(format!(
                    "test split yielded more than the declared {declared} samples"
                )));
            }
            let sample = sample?;
            let batch = Tensor::stack(&[&sample.input])?;
            let prediction = model.forward(&batch)?.index_first(0)?;
            if !prediction.is_finite() {
                let bad = prediction
                    .data()
                    .iter()
                    .copied()
                    .find(|v| !v.is_finite())
                    .unwrap_or(f32::NAN);
                return Err(ExperimentError::numeric(
                    format!("prediction for test sample {index}"),
                    f64::from(bad),
                ));
            }
            let bytes = self.renderer.render(&sample, &prediction)?;

            let path = output_dir.join(artifact_name(index, self.renderer.extension()));
            persistence::atomic_write(&path, &bytes)?;
            tracing::debug!(index, path = %path.display(), "artifact written");
            written += 1;
        }

        if written != declared {
            return Err(ExperimentError::consistency(format!(
                "test split yielded {written} samples, declared {declared}"
            )));
        }
        tracing::info!(artifacts = written, dir = %output_dir.display(), "evaluation finished");
        Ok(written)
    }
}
