//! Loaders over samples held in memory.

use super::{Batch, BatchIter, DataLoaders, Sample, SampleIter};
use crate::error::{ConfigError, ExperimentError};

#[derive(Debug, Clone, Default)]
pub struct InMemoryLoaders {
    train: Vec<Sample>,
    validation: Vec<Sample>,
    test: Vec<Sample>,
}

impl InMemoryLoaders {
    pub fn new(train: Vec<Sample>, validation: Vec<Sample>, test: Vec<Sample>) -> Self {
        Self {
            train,
            validation,
            test,
        }
    }

    /// Split `samples` into validation and train, keeping `test` as the held-out set.
    ///
    /// The first `max(1, n * validation_percent / 100)` samples go to validation.
    pub fn split(
        samples: Vec<Sample>,
        test: Vec<Sample>,
        validation_percent: u32,
    ) -> Result<Self, ConfigError> {
        if validation_percent == 0 || validation_percent >= 100 {
            return Err(ConfigError::invalid(
                "validation_percent",
                format!("must be in 1..=99, got {validation_percent}"),
            ));
        }
        let n = samples.len();
        let n_val = (n * validation_percent as usize / 100).max(1);
        if n_val >= n {
            return Err(ConfigError::invalid(
                "samples",
                format!(
                    "{n} samples leave no training data after a {validation_percent}% \
                     validation split"
                ),
            ));
        }
        let mut validation = samples;
        let train = validation.split_off(n_val);
        Ok(Self::new(train, validation, test))
    }

    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    pub fn validation_len(&self) -> usize {
        self.validation.len()
    }

    fn batches(samples: &[Sample], batch_size: usize) -> BatchIter<'_> {
        if batch_size == 0 {
            return Box::new(std::iter::once(Err(ExperimentError::data(
                "batch size must be positive",
            ))));
        }
        Box::new(samples.chunks(batch_size).map(Batch::collate))
    }
}

impl DataLoaders for InMemoryLoaders {
    fn train(&self, batch_size: usize) -> BatchIter<'_> {
        Self::batches(&self.train, batch_size)
    }

    fn validation(&self, batch_size: usize) -> BatchIter<'_> {
        Self::batches(&self.validation, batch_size)
    }

    fn test(&self) -> SampleIter<'_> {
        Box::new(self.test.iter().cloned().map(Ok))
    }

    fn test_len(&self) -> usize {
        self.test.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    fn samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample {
                input: Tensor::from_vec(vec![1, 1, 1], vec![i as f32]).unwrap(),
                target: Tensor::from_vec(vec![1, 1, 1], vec![i as f32]).unwrap(),
            })
            .collect()
    }

    #[test]
    fn test_split_small_dataset() {
        let loaders = InMemoryLoaders::split(samples(3), samples(3), 10).unwrap();
        assert_eq!(loaders.validation_len(), 1);
        assert_eq!(loaders.train_len(), 2);
        assert_eq!(loaders.test_len(), 3);
    }

    #[test]
    fn test_split_rejects_degenerate() {
        assert!(InMemoryLoaders::split(samples(1), vec![], 10).is_err());
        assert!(InMemoryLoaders::split(samples(10), vec![], 0).is_err());
        assert!(InMemoryLoaders::split(samples(10), vec![], 100).is_err());
    }

    #[test]
    fn test_batches_in_order() {
        let loaders = InMemoryLoaders::new(samples(5), vec![], vec![]);
        let sizes: Vec<usize> = loaders.train(2).map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        let first = loaders.train(2).next().unwrap().unwrap();
        assert_eq!(first.inputs.data(), &[0.0, 1.0]);
    }

    #[test]
    fn test_zero_batch_size_is_an_error() {
        let loaders = InMemoryLoaders::new(samples(2), vec![], vec![]);
        let results: Vec<_> = loaders.train(0).collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
