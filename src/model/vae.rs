use rand::Rng;

use crate::backend::Backend;
use crate::config::VaeConfig;
use crate::engine::tensor::Tensor;

use super::{Decoder, Encoder};

/// The full VAE graph for a fixed batch size.
pub struct Vae<B: Backend + 'static> {
    pub encoder: Encoder<B>,
    pub decoder: Decoder<B>,
    /// Input placeholder `[batch, dim]`.
    pub x: Tensor<B>,
    /// Non-negative KL divergence, batch sum.
    pub kl: Tensor<B>,
    /// Reconstruction log-likelihood, batch sum.
    pub log_likelihood: Tensor<B>,
    /// `log_likelihood - kl`
    pub vlb: Tensor<B>,
    /// `-vlb`, minimized by training. With `l2_in_objective` set, the L2
    /// penalties of both networks are added.
    pub objective: Tensor<B>,
    pub display: Tensor<B>,
}

impl<B: Backend + 'static> Vae<B> {
    pub fn new<R: Rng + ?Sized>(config: &VaeConfig, input_dim: usize, rng: &mut R) -> Self {
        let reg_coef = config.reg_coef as f32;
        let encoder = Encoder::new(
            input_dim,
            config.hidden_layer_neurons,
            config.z_dim,
            config.batch_size,
            reg_coef,
            rng,
        );
        let decoder = Decoder::new(
            config.decoder,
            config.z_dim,
            config.hidden_layer_neurons,
            input_dim,
            config.batch_size,
            reg_coef,
            rng,
        );

        let x = Tensor::new_input(vec![config.batch_size, input_dim]);
        let posterior = encoder.encode(x);
        let reconstruction = decoder.reconstruct(posterior.sample, x);
        let vlb = reconstruction.log_likelihood - posterior.kl;

        let mut terms = vec![-vlb];
        if config.l2_in_objective {
            terms.extend(encoder.l2_penalty());
            terms.extend(decoder.l2_penalty());
        }
        let objective = if terms.len() == 1 {
            terms[0]
        } else {
            Tensor::add_n(&terms)
        };

        Self {
            encoder,
            decoder,
            x,
            kl: posterior.kl,
            log_likelihood: reconstruction.log_likelihood,
            vlb,
            objective,
            display: reconstruction.display,
        }
    }

    pub fn parameters(&self) -> Vec<Tensor<B>> {
        let mut params = self.encoder.parameters();
        params.extend(self.decoder.parameters());
        params
    }

    /// Feeds for one step on `batch`, with fresh noise for every sampling node.
    pub fn feeds<R: Rng + ?Sized>(
        &self,
        batch: B::Tensor,
        rng: &mut R,
    ) -> Vec<(Tensor<B>, B::Tensor)> {
        let mut feeds = vec![(self.x, batch), self.encoder.draw_noise(rng)];
        feeds.extend(self.decoder.draw_noise(rng));
        feeds
    }
}
