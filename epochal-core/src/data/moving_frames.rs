//! Synthetic moving-square sequences.
//!
//! Each sequence shows a bright square travelling with constant velocity and
//! bouncing off the frame edges. The first `input_frames` frames are the
//! input; the next `output_frames` frames are the target.

use super::{InMemoryLoaders, Sample};
use crate::error::{ConfigError, Result};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingFrames {
    pub frame_size: usize,
    pub input_frames: usize,
    pub output_frames: usize,
}

impl MovingFrames {
    pub fn new(
        frame_size: usize,
        input_frames: usize,
        output_frames: usize,
    ) -> std::result::Result<Self, ConfigError> {
        if frame_size < 4 {
            return Err(ConfigError::invalid(
                "data.frame_size",
                format!("must be at least 4, got {frame_size}"),
            ));
        }
        if input_frames == 0 || output_frames == 0 {
            return Err(ConfigError::invalid(
                "data.input_frames",
                "input and output frame counts must be positive",
            ));
        }
        Ok(Self {
            frame_size,
            input_frames,
            output_frames,
        })
    }

    fn side(&self) -> usize {
        (self.frame_size / 4).max(2)
    }

    /// Generate `count` sequences deterministically from `seed`.
    pub fn generate(&self, count: usize, seed: u64) -> Result<Vec<Sample>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count).map(|_| self.sequence(&mut rng)).collect()
    }

    /// Build train/validation loaders over `samples` sequences plus a held-out
    /// set of `test_samples` sequences drawn from a separate seed.
    pub fn loaders(
        &self,
        samples: usize,
        test_samples: usize,
        validation_percent: u32,
        seed: u64,
    ) -> Result<InMemoryLoaders> {
        let pool = self.generate(samples, seed)?;
        let test = self.generate(test_samples, seed.wrapping_add(1))?;
        Ok(InMemoryLoaders::split(pool, test, validation_percent)?)
    }

    fn sequence(&self, rng: &mut StdRng) -> Result<Sample> {
        let side = self.side();
        let span = (self.frame_size - side) as i64;
        let mut x = rng.gen_range(0..=span);
        let mut y = rng.gen_range(0..=span);
        let mut dx: i64 = if rng.gen_bool(0.5) { 1 } else { -1 };
        let mut dy: i64 = if rng.gen_bool(0.5) { 1 } else { -1 };

        let total = self.input_frames + self.output_frames;
        let pixels = self.frame_size * self.frame_size;
        let mut frames = vec![0.0f32; total * pixels];
        for t in 0..total {
            let frame = &mut frames[t * pixels..(t + 1) * pixels];
            for row in y as usize..y as usize + side {
                let start = row * self.frame_size + x as usize;
                frame[start..start + side].fill(1.0);
            }
            if x + dx < 0 || x + dx > span {
                dx = -dx;
            }
            if y + dy < 0 || y + dy > span {
                dy = -dy;
            }
            x += dx;
            y += dy;
        }

        let split = self.input_frames * pixels;
        let target = frames.split_off(split);
        Ok(Sample {
            input: Tensor::from_vec(
                vec![self.input_frames, self.frame_size, self.frame_size],
                frames,
            )?,
            target: Tensor::from_vec(
                vec![self.output_frames, self.frame_size, self.frame_size],
                target,
            )?,
        })
    }
}
