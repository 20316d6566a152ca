//! Numeric collaborators: criteria, optimizers, and a reference model.

pub mod criterion;
pub mod frame_regressor;
pub mod optim;

pub use criterion::{CriterionKind, L1Loss, Loss, Metric, MseLoss};
pub use frame_regressor::FrameRegressor;
pub use optim::{Adam, Optimizer, OptimizerKind, Sgd};
