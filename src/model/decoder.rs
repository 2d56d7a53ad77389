use rand::Rng;

use crate::backend::{Backend, Elm};
use crate::config::DecoderKind;
use crate::engine::layer::{activations::Activation, linear::Linear, mlp::MLP, Layer};
use crate::engine::tensor::Tensor;

use super::{bernoulli_log_likelihood, gaussian_log_likelihood, reparameterize};

/// Output of a decoder for one batch.
#[derive(Debug)]
pub struct Reconstruction<B: Backend + 'static> {
    /// `log p(x|z)` summed over pixels and batch.
    pub log_likelihood: Tensor<B>,
    /// Pixel values suitable for rendering, `[batch, dim]`.
    pub display: Tensor<B>,
}

/// Maps latent samples back to pixel space.
pub enum Decoder<B: Backend + 'static> {
    /// Two ReLU layers and a projection to per-pixel logits.
    Bernoulli { net: MLP<B> },
    /// One tanh layer and a projection to per-pixel mean and variance.
    /// The display output is a sample drawn with `noise`.
    Gaussian {
        net: MLP<B>,
        dim: usize,
        noise: Tensor<B>,
    },
}

impl<B: Backend + 'static> Decoder<B> {
    pub fn new<R: Rng + ?Sized>(
        kind: DecoderKind,
        z_dim: usize,
        hidden: usize,
        output_dim: usize,
        batch_size: usize,
        reg_coef: Elm,
        rng: &mut R,
    ) -> Self {
        match kind {
            DecoderKind::Bernoulli => Decoder::Bernoulli {
                net: MLP::new(vec![
                    Box::new(Linear::new(z_dim, hidden, rng).with_l2(reg_coef)),
                    Box::new(Activation::ReLU),
                    Box::new(Linear::new(hidden, hidden, rng).with_l2(reg_coef)),
                    Box::new(Activation::ReLU),
                    Box::new(Linear::new(hidden, output_dim, rng)),
                ]),
            },
            DecoderKind::Gaussian => Decoder::Gaussian {
                net: MLP::new(vec![
                    Box::new(Linear::new(z_dim, hidden, rng).with_l2(reg_coef)),
                    Box::new(Activation::Tanh),
                    Box::new(Linear::new(hidden, 2 * output_dim, rng)),
                ]),
                dim: output_dim,
                noise: Tensor::new_input(vec![batch_size, output_dim]),
            },
        }
    }

    /// Decodes `z` and scores the reconstruction against `x`.
    pub fn reconstruct(&self, z: Tensor<B>, x: Tensor<B>) -> Reconstruction<B> {
        match self {
            Decoder::Bernoulli { net } => {
                let logits = net.forward(z);
                Reconstruction {
                    log_likelihood: bernoulli_log_likelihood(logits, x),
                    display: logits.sigmoid(),
                }
            }
            Decoder::Gaussian { net, dim, noise } => {
                let params = net.forward(z);
                let mean = params.slice_cols(0, *dim);
                let variance = params.slice_cols(*dim, 2 * dim).softplus();
                Reconstruction {
                    log_likelihood: gaussian_log_likelihood(mean, variance, x),
                    display: reparameterize(mean, variance, *noise),
                }
            }
        }
    }

    /// Noise feeds this decoder needs per step; empty for the Bernoulli variant.
    pub fn draw_noise<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<(Tensor<B>, B::Tensor)> {
        match self {
            Decoder::Bernoulli { .. } => Vec::new(),
            Decoder::Gaussian { noise, .. } => {
                let shape = noise.shape();
                vec![(*noise, B::random_normal(&shape, 0.0, 1.0, rng))]
            }
        }
    }

    pub fn parameters(&self) -> Vec<Tensor<B>> {
        match self {
            Decoder::Bernoulli { net } | Decoder::Gaussian { net, .. } => net.parameters(),
        }
    }

    pub fn l2_penalty(&self) -> Option<Tensor<B>> {
        match self {
            Decoder::Bernoulli { net } | Decoder::Gaussian { net, .. } => net.l2_penalty(),
        }
    }
}
