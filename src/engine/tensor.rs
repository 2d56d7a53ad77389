use std::marker::PhantomData;

use crate::{
    backend::{Backend, Elm},
    engine::{
        node::{NodeId, NodeType, OpType},
        shape::compute_shape,
        with_graph,
    },
};

// Backend::Tensorとは異なり、グラフ構造を普通の演算のように構築できるようにするためのTensor構造体
/// 計算グラフ上のノードへの参照（ハンドル）を表す構造体。
///
/// `Tensor`はバックエンドの実データ(`B::Tensor`)を直接保持するのではなく、
/// 計算グラフ(`GraphBuilder`)内のノードID(`NodeId`)を保持します。
/// これにより、ユーザーは`Tensor`同士の演算を行うだけで、自動的に計算グラフが構築されます。
#[derive(Debug)]
pub struct Tensor<B: Backend + 'static> {
    pub(crate) id: NodeId,
    phantom: PhantomData<B>,
}

// ハンドルはIDだけなのでBackendに関係なくコピーできる
impl<B: Backend + 'static> Clone for Tensor<B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: Backend + 'static> Copy for Tensor<B> {}

impl<B: Backend + 'static> PartialEq for Tensor<B> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<B: Backend + 'static> Tensor<B> {
    pub(crate) fn from_id(id: NodeId) -> Self {
        Tensor {
            id,
            phantom: PhantomData,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Static shape recorded for this node at graph-construction time.
    pub fn shape(&self) -> Vec<usize> {
        with_graph::<B, _, _>(|graph| graph.nodes[self.id].shape.clone())
    }

    /// 入力プレースホルダーを作成します。
    ///
    /// 実行時(`Executor::step_train`など)に外部からデータを与えるためのノードです。
    pub fn new_input(shape: Vec<usize>) -> Tensor<B> {
        let id = with_graph::<B, _, _>(|graph| {
            // 入力ノードは構築時には値がない
            graph.push(NodeType::Input, Vec::new(), None, shape)
        });
        Tensor::from_id(id)
    }

    /// 学習可能なパラメータを作成します。
    ///
    /// 内部にデータを保持し、学習によって更新される可能性のあるノードです。
    pub fn new_parameter(data: B::Tensor) -> Tensor<B> {
        let shape = B::shape(&data);
        let id = with_graph::<B, _, _>(|graph| {
            graph.push(NodeType::Parameter, Vec::new(), Some(data), shape)
        });
        Tensor::from_id(id)
    }

    /// 定数ノードを作成します。
    ///
    /// パラメータとは異なり、学習によって更新されない固定値を持つノードです。
    pub fn new_const(data: B::Tensor) -> Tensor<B> {
        let shape = B::shape(&data);
        let id =
            with_graph::<B, _, _>(|graph| graph.push(NodeType::Const, Vec::new(), Some(data), shape));
        Tensor::from_id(id)
    }

    /// Rank-0 constant; broadcasts against any shape.
    pub fn scalar(value: Elm) -> Tensor<B> {
        Tensor::new_const(B::from_vec(vec![value], &[]))
    }

    /// 新しい演算ノードをグラフに追加するための内部ヘルパー関数
    ///
    /// 形状推論に失敗した場合はグラフ構築の誤りとしてpanicします。
    pub fn op(op_type: OpType, inputs: &[Tensor<B>]) -> Tensor<B> {
        let id = with_graph::<B, _, _>(|graph| {
            let input_shapes: Vec<&[usize]> = inputs
                .iter()
                .map(|t| graph.nodes[t.id].shape.as_slice())
                .collect();
            let output_shape = match compute_shape(&op_type, &input_shapes) {
                Ok(shape) => shape,
                Err(msg) => panic!("Shape mismatch in operation: {}", msg),
            };
            let input_ids = inputs.iter().map(|t| t.id).collect();
            graph.push(NodeType::Operation(op_type), input_ids, None, output_shape)
        });
        Tensor::from_id(id)
    }

    /// 代入ノードをグラフに追加します。
    ///
    /// `target`テンソルに`value`テンソルの値を代入する操作を表します。
    /// 代入ノード自身も`value`と同じ値を持つので、更新後の値として後続の演算に使えます。
    /// 書き込みは学習ステップ内の全ての計算が終わった後に行われます。
    pub fn assign(target: &Tensor<B>, value: &Tensor<B>) -> Tensor<B> {
        let id = with_graph::<B, _, _>(|graph| {
            let target_shape = graph.nodes[target.id].shape.clone();
            let value_shape = &graph.nodes[value.id].shape;
            if &target_shape != value_shape {
                panic!(
                    "Shape mismatch in assign: target={:?}, value={:?}",
                    target_shape, value_shape
                );
            }
            graph.push(
                NodeType::Assign { target: target.id },
                vec![value.id],
                None,
                target_shape,
            )
        });
        Tensor::from_id(id)
    }

    /// 勾配計算ノード(`Grad`)を作成します。
    ///
    /// `self` (y) を `x` で微分した勾配 (dy/dx) を計算するリクエストをグラフに追加します。
    /// 実際の勾配計算はグラフ構築後(`build`)の自動微分フェーズで行われます。
    /// yはスカラーであることを想定しています。
    pub fn grad(&self, x: &Tensor<B>) -> Tensor<B> {
        let id = with_graph::<B, _, _>(|graph| {
            let x_shape = graph.nodes[x.id].shape.clone();
            graph.push(
                NodeType::Grad {
                    x: x.id,
                    y: self.id,
                },
                Vec::new(),
                None,
                x_shape,
            )
        });
        Tensor::from_id(id)
    }
}

// 演算のオーバーロード
impl<B: Backend + 'static> std::ops::Add for Tensor<B> {
    type Output = Tensor<B>;

    fn add(self, rhs: Self) -> Self::Output {
        Tensor::op(OpType::Add, &[self, rhs])
    }
}

impl<B: Backend + 'static> std::ops::Sub for Tensor<B> {
    type Output = Tensor<B>;

    fn sub(self, rhs: Self) -> Self::Output {
        Tensor::op(OpType::Sub, &[self, rhs])
    }
}

impl<B: Backend + 'static> std::ops::Mul for Tensor<B> {
    type Output = Tensor<B>;

    fn mul(self, rhs: Self) -> Self::Output {
        Tensor::op(OpType::Mul, &[self, rhs])
    }
}

impl<B: Backend + 'static> std::ops::Div for Tensor<B> {
    type Output = Tensor<B>;

    fn div(self, rhs: Self) -> Self::Output {
        Tensor::op(OpType::Div, &[self, rhs])
    }
}

impl<B: Backend + 'static> std::ops::Neg for Tensor<B> {
    type Output = Tensor<B>;

    fn neg(self) -> Self::Output {
        Tensor::op(OpType::Neg, &[self])
    }
}

impl<B: Backend + 'static> Tensor<B> {
    /// 行列積 (Matrix Multiplication) を行います。2次元同士のみ。
    pub fn matmul(self, rhs: Self) -> Self {
        Tensor::op(OpType::Matmul, &[self, rhs])
    }

    /// 転置 (Transpose) を行います。
    pub fn transpose(self) -> Self {
        Tensor::op(OpType::Transpose, &[self])
    }

    /// 指定された軸で和をとります (Sum)。
    /// `None`の場合は全要素の和をとり、スカラーになります。
    pub fn sum(self, axis: Option<usize>) -> Self {
        Tensor::op(OpType::Sum { axis }, &[self])
    }

    pub fn sum_to(self, shape: Vec<usize>) -> Self {
        Tensor::op(OpType::SumTo { shape }, &[self])
    }

    pub fn broadcast_to(self, shape: Vec<usize>) -> Self {
        Tensor::op(OpType::BroadcastTo { shape }, &[self])
    }

    pub fn reshape(self, shape: Vec<usize>) -> Self {
        Tensor::op(OpType::Reshape { shape }, &[self])
    }

    /// 2次元Tensorの列 `start..end` を取り出します。
    pub fn slice_cols(self, start: usize, end: usize) -> Self {
        Tensor::op(OpType::SliceCols { start, end }, &[self])
    }

    pub fn pad_cols(self, start: usize, width: usize) -> Self {
        Tensor::op(OpType::PadCols { start, width }, &[self])
    }

    /// 複数のTensorの和を効率的に計算するノードを作成します。
    pub fn add_n(tensors: &[Self]) -> Self {
        Tensor::op(OpType::AddN, tensors)
    }

    /// 同じ形状で全ての要素が1のTensorを作成します。
    pub fn ones_like(tensor: &Self) -> Self {
        Tensor::op(OpType::OnesLike, &[*tensor])
    }

    pub fn identity(self) -> Self {
        Tensor::op(OpType::Identity, &[self])
    }

    pub fn sigmoid(self) -> Self {
        Tensor::op(OpType::Sigmoid, &[self])
    }

    pub fn tanh(self) -> Self {
        Tensor::op(OpType::Tanh, &[self])
    }

    pub fn relu(self) -> Self {
        Tensor::op(OpType::ReLU, &[self])
    }

    pub fn step(self) -> Self {
        Tensor::op(OpType::Step, &[self])
    }

    /// `ln(1 + exp(x))`。常に正の値を返します。
    pub fn softplus(self) -> Self {
        Tensor::op(OpType::Softplus, &[self])
    }

    pub fn exp(self) -> Self {
        Tensor::op(OpType::Exp, &[self])
    }

    pub fn log(self) -> Self {
        Tensor::op(OpType::Log, &[self])
    }

    pub fn sqrt(self) -> Self {
        Tensor::op(OpType::Sqrt, &[self])
    }

    pub fn powi(self, n: i32) -> Self {
        Tensor::op(OpType::Powi { n }, &[self])
    }

    pub fn square(self) -> Self {
        self.powi(2)
    }

    /// 要素ごとのシグモイド交差エントロピー。`self`はロジット。
    pub fn sigmoid_cross_entropy(self, labels: Self) -> Self {
        Tensor::op(OpType::SigmoidCrossEntropy, &[self, labels])
    }

    pub fn add_scalar(self, value: Elm) -> Self {
        self + Tensor::scalar(value)
    }

    pub fn mul_scalar(self, value: Elm) -> Self {
        self * Tensor::scalar(value)
    }
}
