use crate::backend::Backend;
use crate::engine::tensor::Tensor;

pub mod activations;
pub mod linear;
pub mod mlp;

// Tensor<B>に対する演算の集合をまとめておくレイヤーのトレイト
// 全結合レイヤーや活性化関数、それらを積み重ねたモデル全体もこのレイヤーとして扱う
pub trait Layer<B: Backend + 'static> {
    fn forward(&self, x: Tensor<B>) -> Tensor<B>;

    // パラメータを返す（学習対象のTensor）
    fn parameters(&self) -> Vec<Tensor<B>> {
        Vec::new()
    }

    /// Weight-decay term this layer adds to the objective, if any.
    fn l2_penalty(&self) -> Option<Tensor<B>> {
        None
    }
}
