use rand::Rng;

use crate::backend::{Backend, Elm};
use crate::engine::layer::Layer;
use crate::engine::tensor::Tensor;

// 重みの初期化戦略
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitStrategy {
    /// Truncated normal with `std = sqrt(scale / fan_in)`, resampled beyond two
    /// standard deviations.
    VarianceScaling { scale: Elm },
    HeNormal,
}

impl Default for InitStrategy {
    fn default() -> Self {
        InitStrategy::VarianceScaling { scale: 1.3 * 2.0 }
    }
}

/// 全結合レイヤー `y = x @ w + b`
pub struct Linear<B: Backend + 'static> {
    w: Tensor<B>,
    b: Tensor<B>,
    l2: Option<Elm>,
}

impl<B: Backend + 'static> Linear<B> {
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        Self::with_init(in_features, out_features, InitStrategy::default(), rng)
    }

    pub fn with_init<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        strategy: InitStrategy,
        rng: &mut R,
    ) -> Self {
        let shape = [in_features, out_features];
        let w = match strategy {
            InitStrategy::VarianceScaling { scale } => {
                let std = (scale / in_features as Elm).sqrt();
                B::truncated_normal(&shape, 0.0, std, rng)
            }
            InitStrategy::HeNormal => {
                let std = (2.0 / in_features as Elm).sqrt();
                B::random_normal(&shape, 0.0, std, rng)
            }
        };
        Self {
            w: Tensor::new_parameter(w),
            b: Tensor::new_parameter(B::zeros(&[out_features])),
            l2: None,
        }
    }

    /// Adds `coef · ½ · Σ w²` over the kernel (not the bias) to the objective.
    pub fn with_l2(mut self, coef: Elm) -> Self {
        self.l2 = Some(coef);
        self
    }

    pub fn weight(&self) -> Tensor<B> {
        self.w
    }

    pub fn bias(&self) -> Tensor<B> {
        self.b
    }
}

impl<B: Backend + 'static> Layer<B> for Linear<B> {
    fn forward(&self, x: Tensor<B>) -> Tensor<B> {
        x.matmul(self.w) + self.b
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        vec![self.w, self.b]
    }

    fn l2_penalty(&self) -> Option<Tensor<B>> {
        self.l2
            .map(|coef| self.w.square().sum(None).mul_scalar(coef * 0.5))
    }
}
