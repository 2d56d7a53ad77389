//! Variational autoencoder built on the graph engine.
//!
//! All terms are batch sums over a `[batch, dim]` input, matching the
//! variational lower bound
//! `VLB = E[log p(x|z)] - KL(q(z|x) || N(0, I))`.

use std::f32::consts::PI;

use crate::backend::Backend;
use crate::engine::tensor::Tensor;

pub mod decoder;
pub mod encoder;
pub mod vae;

pub use decoder::{Decoder, Reconstruction};
pub use encoder::{Encoder, Posterior};
pub use vae::Vae;

/// `KL(N(mean, variance) || N(0, I)) = -½ Σ (1 + ln variance - variance - mean²)`.
///
/// Returns a non-negative scalar; zero only where `mean = 0` and `variance = 1`.
pub fn kl_divergence<B: Backend + 'static>(mean: Tensor<B>, variance: Tensor<B>) -> Tensor<B> {
    (variance.log() - variance - mean.square())
        .add_scalar(1.0)
        .sum(None)
        .mul_scalar(-0.5)
}

/// `mean + sqrt(variance) ⊙ noise`
pub fn reparameterize<B: Backend + 'static>(
    mean: Tensor<B>,
    variance: Tensor<B>,
    noise: Tensor<B>,
) -> Tensor<B> {
    mean + variance.sqrt() * noise
}

/// `-Σ sigmoid_cross_entropy(logits, x)`
pub fn bernoulli_log_likelihood<B: Backend + 'static>(logits: Tensor<B>, x: Tensor<B>) -> Tensor<B> {
    -logits.sigmoid_cross_entropy(x).sum(None)
}

/// `-½ Σ (ln(2π·variance) + (x - mean)² / variance)`
pub fn gaussian_log_likelihood<B: Backend + 'static>(
    mean: Tensor<B>,
    variance: Tensor<B>,
    x: Tensor<B>,
) -> Tensor<B> {
    let log_norm = variance.log().add_scalar((2.0 * PI).ln());
    (log_norm + (x - mean).square() / variance)
        .sum(None)
        .mul_scalar(-0.5)
}
