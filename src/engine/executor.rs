use std::collections::HashMap;

use crate::backend::Backend;
use crate::error::{Result, VaeError};

use super::{
    node::{Node, NodeId, NodeType},
    tensor::Tensor,
    topological_sort,
};

/// Evaluates a built graph.
///
/// The executor owns a snapshot of the graph and all node data, including
/// parameter values. A training step evaluates every `Assign` node plus the
/// requested fetches and then writes the assigned values into their targets;
/// an inference step evaluates only what the fetches need and never writes.
#[derive(Debug)]
pub struct Executor<B: Backend> {
    nodes: Vec<Node<B>>,
    assigns: Vec<NodeId>,
    // (学習ステップか, フェッチ対象) ごとの実行順序のキャッシュ
    plans: HashMap<(bool, Vec<NodeId>), Vec<NodeId>>,
}

impl<B: Backend + 'static> Executor<B> {
    pub fn new(nodes: Vec<Node<B>>) -> Self {
        let assigns = nodes
            .iter()
            .filter(|node| matches!(node.node_type, NodeType::Assign { .. }))
            .map(|node| node.id)
            .collect();
        Self {
            nodes,
            assigns,
            plans: HashMap::new(),
        }
    }

    /// Runs one training step: evaluates all assignments and `fetches`, then
    /// commits the assignments. Returns the fetched values as computed before
    /// the commit.
    pub fn step_train(
        &mut self,
        feeds: Vec<(Tensor<B>, B::Tensor)>,
        fetches: &[Tensor<B>],
    ) -> Result<Vec<B::Tensor>> {
        self.execute(feeds, fetches, true)
    }

    /// Evaluates `fetches` without touching any parameter.
    pub fn step_inference(
        &mut self,
        feeds: Vec<(Tensor<B>, B::Tensor)>,
        fetches: &[Tensor<B>],
    ) -> Result<Vec<B::Tensor>> {
        self.execute(feeds, fetches, false)
    }

    pub fn get_node_data(&self, id: NodeId) -> Option<&B::Tensor> {
        self.nodes.get(id).and_then(|node| node.data.as_ref())
    }

    /// Total element count of all parameter nodes, optimizer state included.
    pub fn parameter_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node.node_type, NodeType::Parameter))
            .map(|node| node.shape.iter().product::<usize>())
            .sum()
    }

    fn execute(
        &mut self,
        feeds: Vec<(Tensor<B>, B::Tensor)>,
        fetches: &[Tensor<B>],
        train: bool,
    ) -> Result<Vec<B::Tensor>> {
        // 前回のステップの入力を消してから、今回の入力を設定する
        for node in self.nodes.iter_mut() {
            if let NodeType::Input = node.node_type {
                node.data = None;
            }
        }
        for (tensor, data) in feeds {
            let node = self
                .nodes
                .get_mut(tensor.id)
                .ok_or(VaeError::NotAnInput(tensor.id))?;
            if !matches!(node.node_type, NodeType::Input) {
                return Err(VaeError::NotAnInput(tensor.id));
            }
            let found = B::shape(&data);
            if found != node.shape {
                return Err(VaeError::FeedShape {
                    node: tensor.id,
                    expected: node.shape.clone(),
                    found,
                });
            }
            node.data = Some(data);
        }

        let fetch_ids: Vec<NodeId> = fetches.iter().map(|t| t.id).collect();
        let plan = self.plan(train, fetch_ids.clone());

        for &node_id in &plan {
            let node_type = self.nodes[node_id].node_type.clone();
            match node_type {
                NodeType::Input => {
                    if self.nodes[node_id].data.is_none() {
                        return Err(VaeError::MissingFeed(node_id));
                    }
                }
                NodeType::Parameter | NodeType::Const => {}
                NodeType::Operation(op_type) => {
                    let output = {
                        let input_tensors: Vec<&B::Tensor> = self.nodes[node_id]
                            .inputs
                            .iter()
                            .map(|&input| self.input_data(input))
                            .collect::<Result<_>>()?;
                        op_type.forward::<B>(&input_tensors)
                    };
                    self.nodes[node_id].data = Some(output);
                }
                NodeType::Assign { .. } => {
                    let value = self.input_data(self.nodes[node_id].inputs[0])?.clone();
                    self.nodes[node_id].data = Some(value);
                }
                NodeType::Grad { .. } => {
                    return Err(VaeError::Graph(format!(
                        "gradient node {} was not expanded; build the executor with `build`",
                        node_id
                    )));
                }
            }
        }

        let outputs = fetch_ids
            .iter()
            .map(|&id| self.input_data(id).cloned())
            .collect::<Result<Vec<_>>>()?;

        if train {
            // 全ての計算が終わってから代入を反映する
            for &assign_id in &self.assigns {
                if let NodeType::Assign { target } = self.nodes[assign_id].node_type {
                    let value = self.nodes[assign_id].data.take();
                    self.nodes[target].data = value;
                }
            }
        }

        Ok(outputs)
    }

    fn input_data(&self, id: NodeId) -> Result<&B::Tensor> {
        self.nodes[id]
            .data
            .as_ref()
            .ok_or_else(|| VaeError::Graph(format!("node {} has no value", id)))
    }

    fn plan(&mut self, train: bool, fetch_ids: Vec<NodeId>) -> Vec<NodeId> {
        let key = (train, fetch_ids);
        if let Some(plan) = self.plans.get(&key) {
            return plan.clone();
        }
        let mut roots = key.1.clone();
        if train {
            roots.extend(self.assigns.iter().cloned());
        }
        let plan = topological_sort(&self.nodes, &roots);
        self.plans.insert(key, plan.clone());
        plan
    }
}
