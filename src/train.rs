use std::path::{Path, PathBuf};
use std::time::Instant;

use ndarray::{Array2, ArrayView2};
use rand::Rng;

use crate::backend::Backend;
use crate::config::VaeConfig;
use crate::data::{BatchSampler, DigitData};
use crate::engine::{
    build,
    executor::Executor,
    optimizer::{Adam, Optimizer},
    reset_graph,
};
use crate::error::{Result, VaeError};
use crate::metrics::{EpochMetrics, MetricsLog};
use crate::model::Vae;
use crate::vis::{save_grayscale, tile_images};

/// Batch sums of the three reported terms for one training step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepTotals {
    pub kl_divergence: f64,
    pub marginal_likelihood: f64,
    pub variational_lower_bound: f64,
}

/// Owns the VAE graph, its executor and the Adam update nodes.
pub struct Trainer<B: Backend + 'static> {
    config: VaeConfig,
    vae: Vae<B>,
    executor: Executor<B>,
    sampler: BatchSampler,
    image_size: usize,
}

impl<B: Backend + 'static> Trainer<B> {
    /// Builds the model for `image_size x image_size` inputs.
    ///
    /// Any graph previously recorded for `B` on this thread is discarded.
    pub fn new<R: Rng + ?Sized>(config: &VaeConfig, image_size: usize, rng: &mut R) -> Result<Self> {
        config.validate()?;
        reset_graph::<B>();

        let vae = Vae::<B>::new(config, image_size * image_size, rng);
        let mut optimizer = Adam::new(config.learning_rate as f32);
        optimizer.minimize(&vae.objective, &vae.parameters());
        let executor = build::<B>();

        log::info!(
            "built {:?} VAE: {} inputs, {} hidden, {} latent, {} trainable values ({} with optimizer state)",
            config.decoder,
            image_size * image_size,
            config.hidden_layer_neurons,
            config.z_dim,
            vae.parameters()
                .iter()
                .map(|p| p.shape().iter().product::<usize>())
                .sum::<usize>(),
            executor.parameter_count()
        );

        Ok(Self {
            config: config.clone(),
            vae,
            executor,
            sampler: BatchSampler::new(config.batch_size),
            image_size,
        })
    }

    /// One Adam step on `batch`. Returns the terms evaluated before the update.
    pub fn train_step<R: Rng + ?Sized>(
        &mut self,
        batch: ArrayView2<f32>,
        rng: &mut R,
    ) -> Result<StepTotals> {
        let feeds = self.vae.feeds(to_backend::<B>(batch), rng);
        let fetches = [self.vae.kl, self.vae.log_likelihood, self.vae.vlb];
        let outputs = self.executor.step_train(feeds, &fetches)?;
        Ok(StepTotals {
            kl_divergence: scalar::<B>(&outputs[0])?,
            marginal_likelihood: scalar::<B>(&outputs[1])?,
            variational_lower_bound: scalar::<B>(&outputs[2])?,
        })
    }

    /// Runs `len / batch_size` steps, each on a fresh batch drawn without
    /// replacement, and averages the sums over `len`.
    pub fn train_epoch<R: Rng + ?Sized>(
        &mut self,
        epoch: usize,
        train: ArrayView2<f32>,
        rng: &mut R,
    ) -> Result<EpochMetrics> {
        let start = Instant::now();
        let num_images = train.nrows();
        let steps = self.sampler.steps_per_epoch(num_images);

        let mut totals = StepTotals::default();
        for step in 0..steps {
            let batch = self.sampler.sample(train, rng)?;
            let step_totals = self.train_step(batch.view(), rng)?;
            log::debug!("epoch {} step {}: vlb={:.3}", epoch, step, step_totals.variational_lower_bound);
            totals.kl_divergence += step_totals.kl_divergence;
            totals.marginal_likelihood += step_totals.marginal_likelihood;
            totals.variational_lower_bound += step_totals.variational_lower_bound;
        }

        let n = num_images as f64;
        Ok(EpochMetrics {
            epoch,
            seconds: start.elapsed().as_secs_f64(),
            kl_divergence: totals.kl_divergence / n,
            marginal_likelihood: totals.marginal_likelihood / n,
            variational_lower_bound: totals.variational_lower_bound / n,
        })
    }

    /// Decoder display output for `batch` (`[batch_size, dim]`), without updating parameters.
    pub fn reconstruct<R: Rng + ?Sized>(
        &mut self,
        batch: ArrayView2<f32>,
        rng: &mut R,
    ) -> Result<Array2<f32>> {
        let shape = (batch.nrows(), batch.ncols());
        let feeds = self.vae.feeds(to_backend::<B>(batch), rng);
        let outputs = self.executor.step_inference(feeds, &[self.vae.display])?;
        Array2::from_shape_vec(shape, B::to_vec(&outputs[0]))
            .map_err(|e| VaeError::Shape(e.to_string()))
    }

    /// Renders the test batch if `epoch` is on the schedule.
    ///
    /// Epoch 0 writes the untouched batch as `original_X.png`; later epochs
    /// write its reconstruction as `generated_X_epoch_{epoch}.png`.
    pub fn render<R: Rng + ?Sized>(
        &mut self,
        epoch: usize,
        test_batch: ArrayView2<f32>,
        results_dir: &Path,
        rng: &mut R,
    ) -> Result<Option<PathBuf>> {
        if epoch % self.config.render_every != 0 {
            return Ok(None);
        }
        let (images, path) = if epoch == 0 {
            (test_batch.to_owned(), results_dir.join("original_X.png"))
        } else {
            (
                self.reconstruct(test_batch, rng)?,
                results_dir.join(format!("generated_X_epoch_{}.png", epoch)),
            )
        };
        let side = self.config.side_length;
        let grid = tile_images(images.view(), self.image_size, side, side)?;
        save_grayscale(grid.view(), &path)?;
        log::info!("rendered epoch {} to {}", epoch, path.display());
        Ok(Some(path))
    }

    /// Trains for `num_epoch` epochs, rendering on schedule and appending each
    /// epoch's metrics to `metrics.jsonl` under the results directory.
    pub fn fit<R: Rng + ?Sized>(&mut self, data: &DigitData, rng: &mut R) -> Result<Vec<EpochMetrics>> {
        if data.image_size != self.image_size {
            return Err(VaeError::Shape(format!(
                "model expects {0}x{0} images, data has {1}x{1}",
                self.image_size, data.image_size
            )));
        }
        let results_dir = self.config.results_dir.clone();
        std::fs::create_dir_all(&results_dir).map_err(|e| VaeError::io(&results_dir, e))?;
        let mut metrics_log = MetricsLog::create(&results_dir)?;

        // 表示用のテストバッチは最初に一度だけ選ぶ
        let test_batch = self.sampler.sample(data.test.view(), rng)?;

        let mut history = Vec::with_capacity(self.config.num_epoch);
        for epoch in 0..self.config.num_epoch {
            self.render(epoch, test_batch.view(), &results_dir, rng)?;
            let metrics = self.train_epoch(epoch, data.train.view(), rng)?;
            println!("{}", metrics);
            metrics_log.log(&metrics)?;
            history.push(metrics);
        }
        Ok(history)
    }
}

fn to_backend<B: Backend>(batch: ArrayView2<f32>) -> B::Tensor {
    let shape = [batch.nrows(), batch.ncols()];
    B::from_vec(batch.iter().copied().collect(), &shape)
}

fn scalar<B: Backend>(tensor: &B::Tensor) -> Result<f64> {
    B::to_vec(tensor)
        .first()
        .map(|&v| v as f64)
        .ok_or_else(|| VaeError::Graph("expected a scalar output".to_string()))
}
