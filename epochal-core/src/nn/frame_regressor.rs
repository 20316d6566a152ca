//! Reference sequence-to-sequence model over frame stacks.
//!
//! Each predicted frame is a learned affine mix of the input frames, shared
//! across pixels: `out[o] = sum_i weight[o, i] * in[i] + bias[o]`.

use crate::error::{ExperimentError, Result};
use crate::model::{Model, ModelState, Parameter};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WEIGHT: &str = "weight";
const BIAS: &str = "bias";

#[derive(Debug, Clone)]
pub struct FrameRegressor {
    input_frames: usize,
    output_frames: usize,
    weight: Parameter,
    bias: Parameter,
    cached_input: Option<Tensor>,
}

impl FrameRegressor {
    /// Create a regressor with deterministic initial weights.
    pub fn new(input_frames: usize, output_frames: usize, seed: u64) -> Result<Self> {
        if input_frames == 0 || output_frames == 0 {
            return Err(ExperimentError::model(
                "frame regressor needs at least one input and one output frame",
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let base = 1.0 / input_frames as f32;
        let weights = (0..output_frames * input_frames)
            .map(|_| base + rng.gen_range(-0.05..0.05))
            .collect();
        Ok(Self {
            input_frames,
            output_frames,
            weight: Parameter::new(
                WEIGHT,
                Tensor::from_vec(vec![output_frames, input_frames], weights)?,
            ),
            bias: Parameter::new(BIAS, Tensor::zeros(vec![output_frames])),
            cached_input: None,
        })
    }

    /// Batch size and pixels per frame for an input of shape `[B, T_in, ...]`.
    fn layout(&self, input: &Tensor) -> Result<(usize, usize)> {
        let shape = input.shape();
        if shape.len() < 2 || shape[1] != self.input_frames {
            return Err(ExperimentError::model(format!(
                "expected input of shape [batch, {}, ...], got {shape:?}",
                self.input_frames
            )));
        }
        let pixels = shape[2..].iter().product();
        Ok((shape[0], pixels))
    }
}

impl Model for FrameRegressor {
    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let (batch, pixels) = self.layout(input)?;
        let x = input.data();
        let w = self.weight.value.data();
        let b = self.bias.value.data();

        let mut shape = input.shape().to_vec();
        shape[1] = self.output_frames;
        let mut out = Tensor::zeros(shape);
        let y = out.data_mut();

        for n in 0..batch {
            for o in 0..self.output_frames {
                let dst = &mut y[(n * self.output_frames + o) * pixels..][..pixels];
                dst.fill(b[o]);
                for i in 0..self.input_frames {
                    let src = &x[(n * self.input_frames + i) * pixels..][..pixels];
                    let wi = w[o * self.input_frames + i];
                    for (d, s) in dst.iter_mut().zip(src) {
                        *d += wi * s;
                    }
                }
            }
        }

        self.cached_input = Some(input.clone());
        Ok(out)
    }

    fn backward(&mut self, grad_output: &Tensor) -> Result<()> {
        let input = self
            .cached_input
            .take()
            .ok_or_else(|| ExperimentError::model("backward called without a preceding forward"))?;
        let (batch, pixels) = self.layout(&input)?;
        let expected = batch * self.output_frames * pixels;
        if grad_output.len() != expected {
            return Err(ExperimentError::model(format!(
                "gradient has {} elements, expected {expected}",
                grad_output.len()
            )));
        }

        let x = input.data();
        let g = grad_output.data();
        let gw = self.weight.grad.data_mut();
        let gb = self.bias.grad.data_mut();

        for n in 0..batch {
            for o in 0..self.output_frames {
                let go = &g[(n * self.output_frames + o) * pixels..][..pixels];
                gb[o] += go.iter().sum::<f32>();
                for i in 0..self.input_frames {
                    let xi = &x[(n * self.input_frames + i) * pixels..][..pixels];
                    gw[o * self.input_frames + i] +=
                        go.iter().zip(xi).map(|(a, b)| a * b).sum::<f32>();
                }
            }
        }
        Ok(())
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        vec![&mut self.weight, &mut self.bias]
    }

    fn state(&self) -> ModelState {
        let mut state = ModelState::new();
        state.insert(WEIGHT, self.weight.value.clone());
        state.insert(BIAS, self.bias.value.clone());
        state
    }

    fn load_state(&mut self, state: &ModelState) -> Result<()> {
        if let Some(unknown) = state.names().find(|n| *n != WEIGHT && *n != BIAS) {
            return Err(ExperimentError::model(format!(
                "state has unexpected tensor '{unknown}' for a frame regressor"
            )));
        }
        let weight = state.require(WEIGHT, &[self.output_frames, self.input_frames])?;
        let bias = state.require(BIAS, &[self.output_frames])?;
        self.weight.value = weight.clone();
        self.bias.value = bias.clone();
        self.cached_input = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::criterion::{Loss, Metric, MseLoss};
    use crate::nn::optim::{Optimizer, Sgd};

    #[test]
    fn test_forward_shape() {
        let mut model = FrameRegressor::new(3, 2, 7).unwrap();
        let input = Tensor::zeros(vec![4, 3, 5, 5]);
        let out = model.forward(&input).unwrap();
        assert_eq!(out.shape(), &[4, 2, 5, 5]);
    }

    #[test]
    fn test_forward_rejects_wrong_frame_count() {
        let mut model = FrameRegressor::new(3, 1, 7).unwrap();
        assert!(model.forward(&Tensor::zeros(vec![1, 2, 4, 4])).is_err());
    }

    #[test]
    fn test_backward_requires_forward() {
        let mut model = FrameRegressor::new(2, 1, 7).unwrap();
        assert!(model.backward(&Tensor::zeros(vec![1, 1, 2, 2])).is_err());
    }

    #[test]
    fn test_deterministic_init() {
        let a = FrameRegressor::new(3, 2, 11).unwrap();
        let b = FrameRegressor::new(3, 2, 11).unwrap();
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn test_state_roundtrip_restores_weights() {
        let mut a = FrameRegressor::new(2, 1, 1).unwrap();
        let b = FrameRegressor::new(2, 1, 2).unwrap();
        a.load_state(&b.state()).unwrap();
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn test_load_state_rejects_foreign_tensors() {
        let mut model = FrameRegressor::new(2, 1, 0).unwrap();
        let mut state = model.state();
        state.insert("gamma", Tensor::zeros(vec![1]));
        assert!(model.load_state(&state).is_err());

        let mut missing = ModelState::new();
        missing.insert(WEIGHT, Tensor::zeros(vec![1, 2]));
        assert!(model.load_state(&missing).is_err());
    }

    #[test]
    fn test_sgd_reduces_loss() {
        // Target is the last input frame; one mixing weight should learn it.
        let mut model = FrameRegressor::new(2, 1, 3).unwrap();
        let input = Tensor::from_vec(vec![1, 2, 2, 2], vec![0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0])
            .unwrap();
        let target = Tensor::from_vec(vec![1, 1, 2, 2], vec![1.0, 0.0, 1.0, 0.0]).unwrap();
        let loss = MseLoss;
        let mut sgd = Sgd::new(0.5).unwrap();

        let initial = loss.compute(&model.forward(&input).unwrap(), &target).unwrap();
        for _ in 0..50 {
            model.zero_grad();
            let pred = model.forward(&input).unwrap();
            let grad = loss.gradient(&pred, &target).unwrap();
            model.backward(&grad).unwrap();
            sgd.step(&mut model).unwrap();
        }
        let trained = loss.compute(&model.forward(&input).unwrap(), &target).unwrap();
        assert!(trained < initial, "{trained} !< {initial}");
    }
}
