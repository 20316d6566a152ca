//! Dense `f32` tensor carrier.
//!
//! This is only the exchange type between the orchestration layer and its
//! collaborators. It owns a row-major buffer and a shape, nothing more.

use crate::error::{ExperimentError, Result};
use serde::{Deserialize, Serialize};

/// Row-major dense tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![0.0; len],
        }
    }

    /// Build a tensor, checking that `data` matches the element count of `shape`.
    pub fn from_vec(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ExperimentError::model(format!(
                "shape {shape:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Size of the leading dimension (0 for a scalar-shaped tensor).
    pub fn leading_dim(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Stack equally-shaped tensors along a new leading dimension.
    pub fn stack(items: &[&Tensor]) -> Result<Self> {
        let first = items
            .first()
            .ok_or_else(|| ExperimentError::model("cannot stack an empty list of tensors"))?;
        let inner = first.shape.clone();
        let mut data = Vec::with_capacity(first.len() * items.len());
        for item in items {
            if item.shape != inner {
                return Err(ExperimentError::model(format!(
                    "cannot stack shape {:?} with {:?}",
                    item.shape, inner
                )));
            }
            data.extend_from_slice(&item.data);
        }
        let mut shape = Vec::with_capacity(inner.len() + 1);
        shape.push(items.len());
        shape.extend(inner);
        Ok(Self { shape, data })
    }

    /// Slice `index` out of the leading dimension.
    pub fn index_first(&self, index: usize) -> Result<Self> {
        let outer = self.leading_dim();
        if index >= outer {
            return Err(ExperimentError::model(format!(
                "index {index} out of range for leading dimension {outer}"
            )));
        }
        let inner: Vec<usize> = self.shape[1..].to_vec();
        let stride: usize = inner.iter().product();
        let start = index * stride;
        Ok(Self {
            shape: inner,
            data: self.data[start..start + stride].to_vec(),
        })
    }
}
