use ndarray::{Array2, ArrayView2, Axis};
use rand::seq::index;
use rand::Rng;

use crate::error::{Result, VaeError};

/// Draws mini-batches of rows uniformly without replacement.
#[derive(Debug, Clone, Copy)]
pub struct BatchSampler {
    batch_size: usize,
}

impl BatchSampler {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of full batches in a dataset of `len` rows.
    pub fn steps_per_epoch(&self, len: usize) -> usize {
        len / self.batch_size
    }

    /// `batch_size` distinct row indices below `len`.
    pub fn sample_indices<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Result<Vec<usize>> {
        if self.batch_size > len {
            return Err(VaeError::Shape(format!(
                "cannot draw a batch of {} from {} rows",
                self.batch_size, len
            )));
        }
        Ok(index::sample(rng, len, self.batch_size).into_vec())
    }

    pub fn sample<R: Rng + ?Sized>(&self, images: ArrayView2<f32>, rng: &mut R) -> Result<Array2<f32>> {
        let indices = self.sample_indices(images.nrows(), rng)?;
        Ok(images.select(Axis(0), &indices))
    }
}
