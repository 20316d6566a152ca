//! Trainable model capability.
//!
//! The orchestration layer never looks inside a model; it drives it through
//! [`Model`] and persists it through [`ModelState`].

use crate::error::{ExperimentError, Result};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named trainable tensor with its accumulated gradient.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub value: Tensor,
    pub grad: Tensor,
}

impl Parameter {
    pub fn new(name: &str, value: Tensor) -> Self {
        let grad = Tensor::zeros(value.shape().to_vec());
        Self {
            name: name.to_string(),
            value,
            grad,
        }
    }

    pub fn zero_grad(&mut self) {
        self.grad.data_mut().fill(0.0);
    }
}

/// Serializable snapshot of every parameter of a model, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    tensors: BTreeMap<String, Tensor>,
}

impl ModelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, tensor: Tensor) {
        self.tensors.insert(name.to_string(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Fetch a tensor that must exist and have the given shape.
    pub fn require(&self, name: &str, shape: &[usize]) -> Result<&Tensor> {
        let tensor = self
            .get(name)
            .ok_or_else(|| ExperimentError::model(format!("state has no tensor named '{name}'")))?;
        if tensor.shape() != shape {
            return Err(ExperimentError::model(format!(
                "tensor '{name}' has shape {:?}, expected {shape:?}",
                tensor.shape()
            )));
        }
        Ok(tensor)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }
}

/// A trainable unit.
///
/// `forward` caches whatever `backward` needs; `backward` accumulates into each
/// parameter's `grad` and is only ever called right after a `forward` on the
/// same batch.
pub trait Model {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor>;

    fn backward(&mut self, grad_output: &Tensor) -> Result<()>;

    fn parameters_mut(&mut self) -> Vec<&mut Parameter>;

    fn zero_grad(&mut self) {
        for param in self.parameters_mut() {
            param.zero_grad();
        }
    }

    fn state(&self) -> ModelState;

    fn load_state(&mut self, state: &ModelState) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_zero_grad() {
        let mut p = Parameter::new("w", Tensor::from_vec(vec![2], vec![1.0, 2.0]).unwrap());
        p.grad.data_mut().copy_from_slice(&[0.5, 0.5]);
        p.zero_grad();
        assert_eq!(p.grad.data(), &[0.0, 0.0]);
        assert_eq!(p.value.data(), &[1.0, 2.0]);
    }

    #[test]
    fn test_state_require() {
        let mut state = ModelState::new();
        state.insert("w", Tensor::zeros(vec![2, 3]));
        assert!(state.require("w", &[2, 3]).is_ok());
        assert!(state.require("w", &[3, 2]).is_err());
        assert!(state.require("b", &[1]).is_err());
        assert_eq!(state.names().collect::<Vec<_>>(), vec!["w"]);
    }
}
