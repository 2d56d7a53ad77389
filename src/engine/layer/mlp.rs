use crate::backend::Backend;
use crate::engine::layer::Layer;
use crate::engine::tensor::Tensor;

pub struct MLP<B: Backend + 'static> {
    layers: Vec<Box<dyn Layer<B>>>,
}

impl<B: Backend + 'static> MLP<B> {
    pub fn new(layers: Vec<Box<dyn Layer<B>>>) -> Self {
        Self { layers }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl<B: Backend + 'static> Layer<B> for MLP<B> {
    fn forward(&self, x: Tensor<B>) -> Tensor<B> {
        self.layers.iter().fold(x, |acc, layer| layer.forward(acc))
    }

    fn parameters(&self) -> Vec<Tensor<B>> {
        self.layers
            .iter()
            .flat_map(|layer| layer.parameters())
            .collect()
    }

    fn l2_penalty(&self) -> Option<Tensor<B>> {
        let penalties: Vec<Tensor<B>> = self
            .layers
            .iter()
            .filter_map(|layer| layer.l2_penalty())
            .collect();
        match penalties.len() {
            0 => None,
            1 => Some(penalties[0]),
            _ => Some(Tensor::add_n(&penalties)),
        }
    }
}
