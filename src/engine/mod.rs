use std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::HashMap,
};

use crate::backend::Backend;

use self::{
    executor::Executor,
    node::{Node, NodeId, NodeType},
};

pub mod autodiff;
pub mod executor;
pub mod layer;
pub mod node;
pub mod operation;
pub mod optimizer;
pub mod shape;
pub mod tensor;

#[derive(Debug, Clone)]
pub struct GraphBuilder<B: Backend> {
    pub(crate) nodes: Vec<Node<B>>,
}

thread_local! {
    static GLOBAL_GRAPH_STORE: RefCell<HashMap<TypeId, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

pub fn with_graph<B, F, R>(f: F) -> R
where
    B: Backend + 'static,
    F: FnOnce(&mut GraphBuilder<B>) -> R,
{
    GLOBAL_GRAPH_STORE.with(|store| {
        let mut map = store.borrow_mut();
        let type_id = TypeId::of::<B>();

        // グラフビルダーが存在しない場合は新規作成
        let graph_any = map
            .entry(type_id)
            .or_insert_with(|| Box::new(GraphBuilder::<B> { nodes: Vec::new() }));

        // グラフビルダーを取得して関数を実行
        let graph_builder = graph_any
            .downcast_mut::<GraphBuilder<B>>()
            .expect("graph store entry keyed by the backend's TypeId");
        f(graph_builder)
    })
}

/// Discards every node recorded for backend `B` on this thread.
///
/// Tensor handles created before the reset must not be used afterwards.
/// Executors already built keep their own copy of the graph.
pub fn reset_graph<B: Backend + 'static>() {
    with_graph::<B, _, _>(|graph| graph.nodes.clear());
}

pub fn build<B: Backend + 'static>() -> Executor<B> {
    // 勾配ノードを展開してから、グラフのスナップショットを実行器に渡す
    autodiff::expand_graph::<B>();
    let nodes = with_graph::<B, _, _>(|graph| graph.nodes.clone());
    log::debug!("built executor over {} graph nodes", nodes.len());
    Executor::new(nodes)
}

impl<B: Backend> GraphBuilder<B> {
    pub(crate) fn push(
        &mut self,
        node_type: NodeType,
        inputs: Vec<NodeId>,
        data: Option<B::Tensor>,
        shape: Vec<usize>,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            id,
            node_type,
            inputs,
            data,
            shape,
        });
        id
    }

    pub(crate) fn topological_sort(&self, roots: &[NodeId]) -> Vec<NodeId> {
        topological_sort(&self.nodes, roots)
    }
}

/// Returns every node reachable from `roots` through `inputs`, ordered so
/// that each node comes after all of its inputs.
pub(crate) fn topological_sort<B: Backend>(nodes: &[Node<B>], roots: &[NodeId]) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut visited = vec![false; nodes.len()];
    // (ノード, 入力を展開済みか)
    let mut stack: Vec<(NodeId, bool)> = roots.iter().rev().map(|&id| (id, false)).collect();

    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        if visited[id] {
            continue;
        }
        visited[id] = true;
        stack.push((id, true));
        for &input in nodes[id].inputs.iter().rev() {
            if !visited[input] {
                stack.push((input, false));
            }
        }
    }
    order
}
