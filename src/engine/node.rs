use crate::backend::Backend;

pub type NodeId = usize;

#[derive(Clone, Debug)]
pub enum NodeType {
    /// 外部からの入力データを受け取るノード
    Input,
    /// 学習可能なパラメータを表すノード
    Parameter,
    /// 定数値を表すノード
    Const,
    /// 演算を表すノード
    Operation(OpType),
    /// 変数への代入を表すノード
    /// 値は学習ステップの最後にまとめて`target`へ書き込まれる
    Assign { target: NodeId },
    /// 自動微分を行うためのノード
    /// yをxで微分した結果 (dy/dx) を表す
    Grad { x: NodeId, y: NodeId },
}

#[derive(Clone, Debug, PartialEq)]
pub enum OpType {
    Add,
    Sub,
    Mul,
    Div,
    Matmul,
    Transpose,
    Sum {
        axis: Option<usize>,
    },
    /// ブロードキャストの逆操作
    SumTo {
        shape: Vec<usize>,
    },
    BroadcastTo {
        shape: Vec<usize>,
    },
    Reshape {
        shape: Vec<usize>,
    },
    SliceCols {
        start: usize,
        end: usize,
    },
    PadCols {
        start: usize,
        width: usize,
    },
    AddN,
    Neg,
    OnesLike,
    Sigmoid,
    Tanh,
    ReLU,
    /// x > 0 なら 1、それ以外は 0 (ReLUの勾配マスク)
    Step,
    Softplus,
    Exp,
    Log,
    Sqrt,
    Powi {
        n: i32,
    },
    /// 入力は (logits, labels)
    SigmoidCrossEntropy,
    /// 逆伝播時の勾配置換用（入力をそのまま出力する）
    Identity,
}

#[derive(Clone, Debug)]
pub struct Node<B: Backend> {
    pub id: NodeId,
    pub node_type: NodeType,
    pub inputs: Vec<NodeId>,
    /// 実行時に計算結果の値が格納される場所
    /// グラフ構築時はNoneで、Executorによる実行時にSome(tensor)になる
    pub data: Option<B::Tensor>,
    pub shape: Vec<usize>,
}
