// 自動微分(Automatic Differentiation)を行うためのモジュール

use std::collections::HashMap;

use crate::backend::Backend;
use crate::engine::{
    node::{NodeId, NodeType, OpType},
    tensor::Tensor,
    with_graph,
};

/// 計算グラフを展開し、逆伝播（バックプロパゲーション）のためのノードを追加します。
///
/// この関数は以下のステップを実行します：
/// 1. 計算すべき勾配ノード(`Grad`)を特定します。
/// 2. yごとにグラフのトポロジカルソートを行い、計算順序を決定します。
/// 3. グラフを逆順に辿りながら（逆伝播）、各ノードの勾配を計算する新しいノードを追加します。
/// 4. `Grad`ノードを、計算された勾配ノードを入力とする`Identity`に置き換えます。
pub fn expand_graph<B: Backend + 'static>() {
    // 1. 計算すべき勾配の特定
    // yをxで微分したい場合 (`Grad {x, y}`ノードが存在する場合)、
    // yは逆伝播の出発点(root)となり、xは到達点となります。
    let match_grads = with_graph::<B, _, _>(|graph| {
        let mut grads_to_process: Vec<(NodeId, Vec<(NodeId, NodeId)>)> = Vec::new();
        for (i, node) in graph.nodes.iter().enumerate() {
            if let NodeType::Grad { x, y } = node.node_type {
                match grads_to_process.iter_mut().find(|(root, _)| *root == y) {
                    Some((_, targets)) => targets.push((x, i)),
                    None => grads_to_process.push((y, vec![(x, i)])),
                }
            }
        }
        grads_to_process
    });

    // 2. 各yのグループごとにバックワードパスを実行
    for (y_root, x_targets) in match_grads {
        backward::<B>(y_root, &x_targets);
    }
}

fn backward<B: Backend + 'static>(y_root: NodeId, x_targets: &[(NodeId, NodeId)]) {
    let (forward_order, requires_grad) = with_graph::<B, _, _>(|graph| {
        let order = graph.topological_sort(&[y_root]);
        // 勾配が必要なノード: xそのもの、またはxに依存するノード
        // これ以外の入力には勾配ノードを作らない
        let mut requires_grad = vec![false; graph.nodes.len()];
        for &id in &order {
            let node = &graph.nodes[id];
            let differentiable = match &node.node_type {
                NodeType::Operation(op) => op.is_differentiable(),
                NodeType::Assign { .. } => true,
                _ => false,
            };
            requires_grad[id] = x_targets.iter().any(|&(x, _)| x == id)
                || (differentiable && node.inputs.iter().any(|&i| requires_grad[i]));
        }
        (order, requires_grad)
    });

    let mut node_grads: HashMap<NodeId, Vec<Tensor<B>>> = HashMap::new();

    // 初期勾配 dy/dy = 1 を設定
    let y_tensor = Tensor::<B>::from_id(y_root);
    node_grads
        .entry(y_root)
        .or_default()
        .push(Tensor::ones_like(&y_tensor));

    // トポロジカルソートの逆順（出力から入力へ）でイテレーション
    for &node_id in forward_order.iter().rev() {
        if !requires_grad[node_id] {
            continue;
        }
        // 分岐している場合（複数の出力先がある場合）、勾配は加算されます（連鎖律）。
        let final_grad = match node_grads.remove(&node_id) {
            Some(grads) if grads.len() == 1 => grads[0],
            Some(grads) => Tensor::add_n(&grads),
            None => continue,
        };

        // 現在のノードが勾配を求めたい対象(x)である場合、
        // そのGradノードを計算された勾配(final_grad)への参照に置き換えます。
        with_graph::<B, _, _>(|graph| {
            for &(x, grad_node_id) in x_targets {
                if x == node_id {
                    graph.nodes[grad_node_id].node_type = NodeType::Operation(OpType::Identity);
                    graph.nodes[grad_node_id].inputs = vec![final_grad.id];
                }
            }
        });

        let (node_type, inputs) = with_graph::<B, _, _>(|graph| {
            let node = &graph.nodes[node_id];
            (node.node_type.clone(), node.inputs.clone())
        });

        let op = match node_type {
            NodeType::Operation(op) => op,
            // 代入ノードは値をそのまま通す
            NodeType::Assign { .. } => OpType::Identity,
            _ => continue,
        };

        let input_tensors: Vec<Tensor<B>> = inputs.iter().map(|&id| Tensor::from_id(id)).collect();
        let y = Tensor::<B>::from_id(node_id);
        for (input, grad) in input_tensors
            .iter()
            .zip(op_backward(&op, final_grad, y, &input_tensors))
        {
            if let Some(grad) = grad {
                if requires_grad[input.id] {
                    node_grads.entry(input.id).or_default().push(grad);
                }
            }
        }
    }

    // 到達しなかった（勾配が切れている）ターゲットに対してゼロ勾配を設定
    let unresolved: Vec<(NodeId, Vec<usize>)> = with_graph::<B, _, _>(|graph| {
        x_targets
            .iter()
            .filter(|&&(_, grad_node_id)| {
                matches!(graph.nodes[grad_node_id].node_type, NodeType::Grad { .. })
            })
            .map(|&(x, grad_node_id)| (grad_node_id, graph.nodes[x].shape.clone()))
            .collect()
    });
    for (grad_node_id, shape) in unresolved {
        let zeros = Tensor::<B>::new_const(B::zeros(&shape));
        with_graph::<B, _, _>(|graph| {
            graph.nodes[grad_node_id].node_type = NodeType::Operation(OpType::Identity);
            graph.nodes[grad_node_id].inputs = vec![zeros.id];
        });
    }
}

/// 一つの演算について、出力の勾配`gy`から各入力の勾配を作るノードを追加します。
/// 勾配が流れない入力には`None`を返します。
fn op_backward<B: Backend + 'static>(
    op: &OpType,
    gy: Tensor<B>,
    y: Tensor<B>,
    inputs: &[Tensor<B>],
) -> Vec<Option<Tensor<B>>> {
    match op {
        OpType::Add => {
            // z = a + b の場合
            // dL/da = dL/dz, dL/db = dL/dz
            // ブロードキャストされた次元については和をとる
            vec![
                Some(unbroadcast(gy, &inputs[0])),
                Some(unbroadcast(gy, &inputs[1])),
            ]
        }
        OpType::Sub => vec![
            Some(unbroadcast(gy, &inputs[0])),
            Some(unbroadcast(-gy, &inputs[1])),
        ],
        OpType::Mul => {
            // z = a * b (要素ごとの積) の場合
            // dL/da = dL/dz * b, dL/db = dL/dz * a
            let (a, b) = (inputs[0], inputs[1]);
            vec![
                Some(unbroadcast(gy * b, &a)),
                Some(unbroadcast(gy * a, &b)),
            ]
        }
        OpType::Div => {
            // z = a / b の場合
            // dL/da = dL/dz / b, dL/db = -dL/dz * z / b
            let (a, b) = (inputs[0], inputs[1]);
            vec![
                Some(unbroadcast(gy / b, &a)),
                Some(unbroadcast(-(gy * y / b), &b)),
            ]
        }
        OpType::Matmul => {
            // Z = A @ B の場合
            // dL/dA = dL/dZ @ B^T
            // dL/dB = A^T @ dL/dZ
            let (a, b) = (inputs[0], inputs[1]);
            vec![
                Some(gy.matmul(b.transpose())),
                Some(a.transpose().matmul(gy)),
            ]
        }
        OpType::Transpose => vec![Some(gy.transpose())],
        OpType::Sum { axis } => {
            // 和の逆伝播は、勾配を元の形状にブロードキャスト（コピー）すること
            let x_shape = inputs[0].shape();
            let gy = match axis {
                Some(ax) => {
                    let mut kept = x_shape.clone();
                    kept[*ax] = 1;
                    gy.reshape(kept)
                }
                None => gy,
            };
            vec![Some(gy.broadcast_to(x_shape))]
        }
        OpType::SumTo { .. } => vec![Some(gy.broadcast_to(inputs[0].shape()))],
        OpType::BroadcastTo { .. } => vec![Some(gy.sum_to(inputs[0].shape()))],
        OpType::Reshape { .. } => vec![Some(gy.reshape(inputs[0].shape()))],
        OpType::SliceCols { start, .. } => {
            let width = inputs[0].shape()[1];
            vec![Some(gy.pad_cols(*start, width))]
        }
        OpType::PadCols { start, .. } => {
            let cols = inputs[0].shape()[1];
            vec![Some(gy.slice_cols(*start, start + cols))]
        }
        OpType::Identity | OpType::AddN => inputs.iter().map(|_| Some(gy)).collect(),
        OpType::Neg => vec![Some(-gy)],
        OpType::OnesLike | OpType::Step => inputs.iter().map(|_| None).collect(),
        OpType::Sigmoid => {
            // y = sigmoid(x)
            // dy/dx = y * (1 - y)
            let one = Tensor::ones_like(&y);
            vec![Some(gy * y * (one - y))]
        }
        OpType::Tanh => {
            // y = tanh(x)
            // dy/dx = 1 - y^2
            let one = Tensor::ones_like(&y);
            vec![Some(gy * (one - y.square()))]
        }
        OpType::ReLU => {
            // y = max(0, x)
            // dy/dx = 1 if x > 0 else 0
            vec![Some(gy * inputs[0].step())]
        }
        OpType::Softplus => {
            // y = ln(1 + exp(x))
            // dy/dx = sigmoid(x)
            vec![Some(gy * inputs[0].sigmoid())]
        }
        OpType::Exp => vec![Some(gy * y)],
        OpType::Log => {
            // y = log(x)
            // dy/dx = 1 / x
            vec![Some(gy / inputs[0])]
        }
        OpType::Sqrt => {
            // y = sqrt(x)
            // dy/dx = 1 / (2 * y)
            vec![Some(gy / y.mul_scalar(2.0))]
        }
        OpType::Powi { n } => {
            // y = x^n
            // dy/dx = n * x^(n-1)
            let x = inputs[0];
            let slope = if *n == 2 {
                x.mul_scalar(2.0)
            } else {
                x.powi(n - 1).mul_scalar(*n as f32)
            };
            vec![Some(gy * slope)]
        }
        OpType::SigmoidCrossEntropy => {
            // l = max(x, 0) - x * z + log(1 + exp(-|x|))
            // dl/dx = sigmoid(x) - z, dl/dz = -x
            let (logits, labels) = (inputs[0], inputs[1]);
            vec![
                Some(gy * (logits.sigmoid() - labels)),
                Some(gy * -logits),
            ]
        }
    }
}

/// ブロードキャストに対応するための勾配調整を行います。
/// 勾配の形状がターゲットの形状と異なる場合（次元が多い、あるいはサイズが1の次元がある場合）、
/// 余分な次元について和をとることで形状を合わせます。
fn unbroadcast<B: Backend + 'static>(grad: Tensor<B>, target: &Tensor<B>) -> Tensor<B> {
    let t_shape = target.shape();
    if grad.shape() == t_shape {
        return grad;
    }
    grad.sum_to(t_shape)
}
