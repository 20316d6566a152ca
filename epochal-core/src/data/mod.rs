//! Data-loading capability: ordered batch sources for train, validation, and test.

pub mod in_memory;
pub mod moving_frames;

pub use in_memory::InMemoryLoaders;
pub use moving_frames::MovingFrames;

use crate::error::{ExperimentError, Result};
use crate::tensor::Tensor;

/// One labeled example: an input frame stack and the frames to predict.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub input: Tensor,
    pub target: Tensor,
}

/// A collated group of samples with a leading batch dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Tensor,
    pub targets: Tensor,
}

impl Batch {
    pub fn collate(samples: &[Sample]) -> Result<Self> {
        if samples.is_empty() {
            return Err(ExperimentError::data("cannot collate an empty batch"));
        }
        let inputs: Vec<&Tensor> = samples.iter().map(|s| &s.input).collect();
        let targets: Vec<&Tensor> = samples.iter().map(|s| &s.target).collect();
        Ok(Self {
            inputs: Tensor::stack(&inputs)?,
            targets: Tensor::stack(&targets)?,
        })
    }

    pub fn len(&self) -> usize {
        self.inputs.leading_dim()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type BatchIter<'a> = Box<dyn Iterator<Item = Result<Batch>> + 'a>;
pub type SampleIter<'a> = Box<dyn Iterator<Item = Result<Sample>> + 'a>;

/// Producer of the three dataset splits.
///
/// Each call starts a fresh pass in the loader's own order; shuffling, if
/// any, is the loader's business.
pub trait DataLoaders {
    fn train(&self, batch_size: usize) -> BatchIter<'_>;

    fn validation(&self, batch_size: usize) -> BatchIter<'_>;

    /// Held-out samples, one at a time.
    fn test(&self) -> SampleIter<'_>;

    /// Declared number of held-out samples.
    fn test_len(&self) -> usize;
}
