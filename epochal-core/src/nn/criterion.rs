//! Scalar criteria used as training loss and validation metric.

use crate::error::{ExperimentError, Result};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};

/// A scalar-producing comparison of prediction and target.
pub trait Metric {
    /// Short name used for metric columns (e.g. `mse`).
    fn name(&self) -> &str;

    fn compute(&self, prediction: &Tensor, target: &Tensor) -> Result<f64>;
}

/// A metric that can also be differentiated with respect to the prediction.
pub trait Loss: Metric {
    fn gradient(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor>;
}

/// Criterion selector used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    Mse,
    L1,
}

impl CriterionKind {
    pub fn build(self) -> Box<dyn Loss> {
        match self {
            CriterionKind::Mse => Box::new(MseLoss),
            CriterionKind::L1 => Box::new(L1Loss),
        }
    }

    pub fn build_metric(self) -> Box<dyn Metric> {
        match self {
            CriterionKind::Mse => Box::new(MseLoss),
            CriterionKind::L1 => Box::new(L1Loss),
        }
    }
}

/// Mean squared error.
#[derive(Debug, Clone, Copy, Default)]
pub struct MseLoss;

/// Mean absolute error.
#[derive(Debug, Clone, Copy, Default)]
pub struct L1Loss;

fn check_shapes(name: &str, prediction: &Tensor, target: &Tensor) -> Result<()> {
    if prediction.shape() != target.shape() {
        return Err(ExperimentError::model(format!(
            "{name}: prediction shape {:?} does not match target shape {:?}",
            prediction.shape(),
            target.shape()
        )));
    }
    if prediction.is_empty() {
        return Err(ExperimentError::model(format!("{name}: empty tensors")));
    }
    Ok(())
}

fn diffs<'a>(prediction: &'a Tensor, target: &'a Tensor) -> impl Iterator<Item = f64> + 'a {
    prediction
        .data()
        .iter()
        .zip(target.data())
        .map(|(p, t)| f64::from(*p) - f64::from(*t))
}

impl Metric for MseLoss {
    fn name(&self) -> &str {
        "mse"
    }

    fn compute(&self, prediction: &Tensor, target: &Tensor) -> Result<f64> {
        check_shapes(self.name(), prediction, target)?;
        let sum: f64 = diffs(prediction, target).map(|d| d * d).sum();
        Ok(sum / prediction.len() as f64)
    }
}

impl Loss for MseLoss {
    fn gradient(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor> {
        check_shapes(self.name(), prediction, target)?;
        let scale = 2.0 / prediction.len() as f64;
        let data = diffs(prediction, target)
            .map(|d| (d * scale) as f32)
            .collect();
        Tensor::from_vec(prediction.shape().to_vec(), data)
    }
}

impl Metric for L1Loss {
    fn name(&self) -> &str {
        "l1"
    }

    fn compute(&self, prediction: &Tensor, target: &Tensor) -> Result<f64> {
        check_shapes(self.name(), prediction, target)?;
        let sum: f64 = diffs(prediction, target).map(f64::abs).sum();
        Ok(sum / prediction.len() as f64)
    }
}

impl Loss for L1Loss {
    fn gradient(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor> {
        check_shapes(self.name(), prediction, target)?;
        let scale = 1.0 / prediction.len() as f64;
        let data = diffs(prediction, target)
            .map(|d| {
                if d > 0.0 {
                    scale as f32
                } else if d < 0.0 {
                    -scale as f32
                } else {
                    0.0
                }
            })
            .collect();
        Tensor::from_vec(prediction.shape().to_vec(), data)
    }
}
