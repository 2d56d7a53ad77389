use crate::backend::Backend;
use crate::engine::node::OpType;

impl OpType {
    /// Evaluates the operation on the provided backend data.
    ///
    /// Input arity and shapes were checked by shape inference when the
    /// node was recorded.
    pub fn forward<B: Backend>(&self, inputs: &[&B::Tensor]) -> B::Tensor {
        match self {
            OpType::Add => B::add(inputs[0], inputs[1]),
            OpType::Sub => B::sub(inputs[0], inputs[1]),
            OpType::Mul => B::mul(inputs[0], inputs[1]),
            OpType::Div => B::div(inputs[0], inputs[1]),
            OpType::Matmul => B::matmul(inputs[0], inputs[1]),
            OpType::Transpose => B::transpose(inputs[0]),
            OpType::Sum { axis } => B::sum(inputs[0], *axis),
            OpType::SumTo { shape } => B::sum_to(inputs[0], shape),
            OpType::BroadcastTo { shape } => B::broadcast(inputs[0], shape),
            OpType::Reshape { shape } => B::reshape(inputs[0], shape),
            OpType::SliceCols { start, end } => B::slice_cols(inputs[0], *start, *end),
            OpType::PadCols { start, width } => B::pad_cols(inputs[0], *start, *width),
            OpType::AddN => {
                let mut acc = inputs[0].clone();
                for t in &inputs[1..] {
                    acc = B::add(&acc, t);
                }
                acc
            }
            OpType::Neg => B::neg(inputs[0]),
            OpType::OnesLike => B::ones_like(inputs[0]),
            OpType::Sigmoid => B::sigmoid(inputs[0]),
            OpType::Tanh => B::tanh(inputs[0]),
            OpType::ReLU => B::relu(inputs[0]),
            OpType::Step => B::step(inputs[0]),
            OpType::Softplus => B::softplus(inputs[0]),
            OpType::Exp => B::exp(inputs[0]),
            OpType::Log => B::log(inputs[0]),
            OpType::Sqrt => B::sqrt(inputs[0]),
            OpType::Powi { n } => B::powi(inputs[0], *n),
            OpType::SigmoidCrossEntropy => B::sigmoid_cross_entropy(inputs[0], inputs[1]),
            OpType::Identity => inputs[0].clone(),
        }
    }

    /// Whether gradients flow through this operation.
    pub fn is_differentiable(&self) -> bool {
        !matches!(self, OpType::OnesLike | OpType::Step)
    }
}
