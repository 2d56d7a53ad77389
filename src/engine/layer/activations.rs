// 活性化関数はすでにTensorのメソッドとして定義されているが、Layerとして定義することでMLPに積みやすくなる

use crate::backend::Backend;
use crate::engine::layer::Layer;
use crate::engine::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    ReLU,
    Tanh,
    Sigmoid,
    Softplus,
}

impl Activation {
    pub fn apply<B: Backend + 'static>(self, x: Tensor<B>) -> Tensor<B> {
        match self {
            Activation::ReLU => x.relu(),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => x.sigmoid(),
            Activation::Softplus => x.softplus(),
        }
    }
}

impl<B: Backend + 'static> Layer<B> for Activation {
    fn forward(&self, x: Tensor<B>) -> Tensor<B> {
        self.apply(x)
    }
}
