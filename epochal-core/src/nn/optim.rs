//! Parameter update rules.

use crate::error::{ConfigError, Result};
use crate::model::Model;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stateful update rule applied once per training batch.
///
/// State is keyed by parameter name, which is how an optimizer stays bound
/// to the model it was created for.
pub trait Optimizer {
    fn name(&self) -> &str;

    fn step(&mut self, model: &mut dyn Model) -> Result<()>;
}

/// Optimizer selector used by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
    Adam,
}

impl OptimizerKind {
    pub fn build(self, lr: f64) -> std::result::Result<Box<dyn Optimizer>, ConfigError> {
        Ok(match self {
            OptimizerKind::Sgd => Box::new(Sgd::new(lr)?),
            OptimizerKind::Adam => Box::new(Adam::new(lr)?),
        })
    }
}

fn check_lr(lr: f64) -> std::result::Result<(), ConfigError> {
    if !lr.is_finite() || lr <= 0.0 {
        return Err(ConfigError::invalid(
            "learning_rate",
            format!("must be a positive finite number, got {lr}"),
        ));
    }
    Ok(())
}

/// Plain stochastic gradient descent.
#[derive(Debug, Clone)]
pub struct Sgd {
    pub lr: f64,
}

impl Sgd {
    pub fn new(lr: f64) -> std::result::Result<Self, ConfigError> {
        check_lr(lr)?;
        Ok(Self { lr })
    }
}

impl Optimizer for Sgd {
    fn name(&self) -> &str {
        "sgd"
    }

    fn step(&mut self, model: &mut dyn Model) -> Result<()> {
        let lr = self.lr as f32;
        for param in model.parameters_mut() {
            let grad = param.grad.data().to_vec();
            for (v, g) in param.value.data_mut().iter_mut().zip(grad) {
                *v -= lr * g;
            }
        }
        Ok(())
    }
}

/// Adam with bias-corrected moment estimates.
#[derive(Debug, Clone)]
pub struct Adam {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    step: u64,
    moments: HashMap<String, (Vec<f64>, Vec<f64>)>,
}

impl Adam {
    pub fn new(lr: f64) -> std::result::Result<Self, ConfigError> {
        check_lr(lr)?;
        Ok(Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            step: 0,
            moments: HashMap::new(),
        })
    }

    pub fn steps_taken(&self) -> u64 {
        self.step
    }
}

impl Optimizer for Adam {
    fn name(&self) -> &str {
        "adam"
    }

    fn step(&mut self, model: &mut dyn Model) -> Result<()> {
        self.step += 1;
        let t = self.step as i32;
        let bias1 = 1.0 - self.beta1.powi(t);
        let bias2 = 1.0 - self.beta2.powi(t);

        for param in model.parameters_mut() {
            let n = param.value.len();
            let (m, v) = self
                .moments
                .entry(param.name.clone())
                .or_insert_with(|| (vec![0.0; n], vec![0.0; n]));
            let grad = param.grad.data();
            let mut updates = Vec::with_capacity(n);
            for i in 0..n {
                let g = f64::from(grad[i]);
                m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
                v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                updates.push(self.lr * m_hat / (v_hat.sqrt() + self.eps));
            }
            for (value, delta) in param.value.data_mut().iter_mut().zip(updates) {
                *value -= delta as f32;
            }
        }
        Ok(())
    }
}
