use rand::Rng;

use crate::backend::{Backend, Elm};
use crate::engine::layer::{activations::Activation, linear::Linear, mlp::MLP, Layer};
use crate::engine::tensor::Tensor;

use super::{kl_divergence, reparameterize};

/// Diagonal Gaussian posterior `q(z|x)` for one batch.
#[derive(Debug)]
pub struct Posterior<B: Backend + 'static> {
    pub mean: Tensor<B>,
    /// Strictly positive through softplus.
    pub variance: Tensor<B>,
    /// One reparameterized latent sample per input row.
    pub sample: Tensor<B>,
    /// Non-negative KL divergence to `N(0, I)`, summed over the batch.
    pub kl: Tensor<B>,
}

/// Two ReLU layers followed by a projection to `2 * z_dim` Gaussian parameters.
///
/// The standard normal noise behind `Posterior::sample` enters through an
/// input node; feed it with [`Encoder::draw_noise`] on every step.
pub struct Encoder<B: Backend + 'static> {
    net: MLP<B>,
    z_dim: usize,
    noise: Tensor<B>,
}

impl<B: Backend + 'static> Encoder<B> {
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        hidden: usize,
        z_dim: usize,
        batch_size: usize,
        reg_coef: Elm,
        rng: &mut R,
    ) -> Self {
        let net = MLP::new(vec![
            Box::new(Linear::new(input_dim, hidden, rng).with_l2(reg_coef)),
            Box::new(Activation::ReLU),
            Box::new(Linear::new(hidden, hidden, rng).with_l2(reg_coef)),
            Box::new(Activation::ReLU),
            Box::new(Linear::new(hidden, 2 * z_dim, rng)),
        ]);
        Self {
            net,
            z_dim,
            noise: Tensor::new_input(vec![batch_size, z_dim]),
        }
    }

    pub fn encode(&self, x: Tensor<B>) -> Posterior<B> {
        let params = self.net.forward(x);
        let mean = params.slice_cols(0, self.z_dim);
        let variance = params.slice_cols(self.z_dim, 2 * self.z_dim).softplus();
        Posterior {
            mean,
            variance,
            sample: reparameterize(mean, variance, self.noise),
            kl: kl_divergence(mean, variance),
        }
    }

    /// Fresh `N(0, I)` noise for the latent sample, as an executor feed.
    pub fn draw_noise<R: Rng + ?Sized>(&self, rng: &mut R) -> (Tensor<B>, B::Tensor) {
        let shape = self.noise.shape();
        (self.noise, B::random_normal(&shape, 0.0, 1.0, rng))
    }

    pub fn parameters(&self) -> Vec<Tensor<B>> {
        self.net.parameters()
    }

    pub fn l2_penalty(&self) -> Option<Tensor<B>> {
        self.net.l2_penalty()
    }
}
