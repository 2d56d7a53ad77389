use std::collections::HashMap;

use crate::backend::{Backend, Elm};
use crate::engine::{node::NodeId, tensor::Tensor};

/// オプティマイザのトレイト
///
/// パラメータの更新はグラフ上の代入ノードとして表現され、
/// `Executor::step_train`を呼ぶたびに1ステップ分だけ実行されます。
pub trait Optimizer<B: Backend + 'static> {
    /// `loss`を小さくする方向に`param`を更新する代入ノードを追加します。
    fn update_param(&mut self, param: &Tensor<B>, loss: &Tensor<B>);

    /// 全てのパラメータに対して`update_param`を呼びます。
    fn minimize(&mut self, loss: &Tensor<B>, params: &[Tensor<B>]) {
        for param in params {
            self.update_param(param, loss);
        }
    }
}

/// Adam with TensorFlow-style bias correction.
///
/// `β1^t` and `β2^t` live in the graph as parameters and are advanced by
/// their own assign nodes, so every parameter update in a step sees the
/// same, already advanced, powers:
///
/// ```text
/// m  <- β1·m + (1-β1)·g
/// v  <- β2·v + (1-β2)·g²
/// lr_t = lr · sqrt(1 - β2^t) / (1 - β1^t)
/// p  <- p - lr_t · m / (sqrt(v) + ε)
/// ```
pub struct Adam<B: Backend + 'static> {
    lr: Elm,
    beta1: Elm,
    beta2: Elm,
    epsilon: Elm,
    // パラメータごとの (m, v)
    state: HashMap<NodeId, (Tensor<B>, Tensor<B>)>,
    // 更新後の (β1^t, β2^t)。最初のパラメータを見たときに作る
    powers: Option<(Tensor<B>, Tensor<B>)>,
}

impl<B: Backend + 'static> Adam<B> {
    pub fn new(lr: Elm) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            state: HashMap::new(),
            powers: None,
        }
    }

    fn powers(&mut self) -> (Tensor<B>, Tensor<B>) {
        let (beta1, beta2) = (self.beta1, self.beta2);
        *self.powers.get_or_insert_with(|| {
            let b1t = Tensor::new_parameter(B::from_vec(vec![1.0], &[]));
            let b2t = Tensor::new_parameter(B::from_vec(vec![1.0], &[]));
            (
                Tensor::assign(&b1t, &b1t.mul_scalar(beta1)),
                Tensor::assign(&b2t, &b2t.mul_scalar(beta2)),
            )
        })
    }
}

impl<B: Backend + 'static> Optimizer<B> for Adam<B> {
    fn update_param(&mut self, param: &Tensor<B>, loss: &Tensor<B>) {
        let grad = loss.grad(param);
        let (b1t, b2t) = self.powers();

        let (m, v) = *self.state.entry(param.id()).or_insert_with(|| {
            let shape = param.shape();
            (
                Tensor::new_parameter(B::zeros(&shape)),
                Tensor::new_parameter(B::zeros(&shape)),
            )
        });

        let new_m = m.mul_scalar(self.beta1) + grad.mul_scalar(1.0 - self.beta1);
        let m_update = Tensor::assign(&m, &new_m);
        let new_v = v.mul_scalar(self.beta2) + grad.square().mul_scalar(1.0 - self.beta2);
        let v_update = Tensor::assign(&v, &new_v);

        let one = Tensor::scalar(1.0);
        let lr_t = ((one - b2t).sqrt() / (one - b1t)).mul_scalar(self.lr);
        let step = m_update / v_update.sqrt().add_scalar(self.epsilon);
        let new_p = *param - step * lr_t;
        let _ = Tensor::assign(param, &new_p);
    }
}
