//! Evaluation phase: restore the best model and render held-out samples.

pub mod evaluator;
pub mod render;

pub use evaluator::{Evaluator, artifact_name};
pub use render::{ArtifactRenderer, PngStripRenderer};
