//! Loop forest (§4.7 step 1): a reverse-post-order walk over the
//! control-flow graph that groups `LoopHeader`/`Loop`/`LoopExit` markers
//! into a nested tree, one [`LoopNode`] per natural loop.
//!
//! The source closes a loop on a fourth marker, `LoopMerge`, which has no
//! counterpart in this core's closed `ControlFlowKind` set (§3.1 keeps
//! only header/body/exit). A loop is therefore closed here directly on
//! its `LoopExit` marker; everything `LoopMerge` would have additionally
//! represented (the post-exit join point) is already reachable as
//! `LoopExit`'s own control successor, so no information is lost, only
//! the explicit fourth node.

use std::collections::HashMap;

use crate::error::HirResult;
use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::ControlFlowKind;

#[derive(Debug, Clone)]
pub struct LoopNode {
    pub id: u32,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub header: NodeId,
    pub body: Option<NodeId>,
    pub exit: Option<NodeId>,
    pub depth: usize,
    pub block_count: usize,
}

impl LoopNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The loop nest cluster: a forest of [`LoopNode`]s addressed by index,
/// plus a map from every control-flow node to the innermost loop
/// containing it (`None` for nodes outside any loop).
#[derive(Debug, Default)]
pub struct LoopForest {
    nodes: Vec<LoopNode>,
    roots: Vec<usize>,
    node_to_loop: HashMap<NodeId, usize>,
}

impl LoopForest {
    pub fn build(graph: &Graph) -> HirResult<Self> {
        let mut forest = LoopForest::default();
        let mut stack: Vec<usize> = Vec::new();
        let mut next_id = 0u32;

        for node in graph.control_flow_rpo() {
            let kind = match graph.get(node)? {
                crate::node::NodeKind::ControlFlow(k) => k,
                _ => continue,
            };
            match kind {
                ControlFlowKind::LoopHeader(_) => {
                    let parent = stack.last().copied();
                    let idx = forest.nodes.len();
                    forest.nodes.push(LoopNode {
                        id: next_id,
                        parent,
                        children: Vec::new(),
                        header: node,
                        body: None,
                        exit: None,
                        depth: stack.len() + 1,
                        block_count: 0,
                    });
                    next_id += 1;
                    match parent {
                        Some(p) => forest.nodes[p].children.push(idx),
                        None => forest.roots.push(idx),
                    }
                    stack.push(idx);
                    forest.touch(idx, node);
                }
                ControlFlowKind::Loop(_) => {
                    if let Some(&top) = stack.last() {
                        forest.nodes[top].body = Some(node);
                        forest.touch(top, node);
                    }
                }
                ControlFlowKind::LoopExit(_) => {
                    if let Some(top) = stack.pop() {
                        forest.nodes[top].exit = Some(node);
                        forest.touch(top, node);
                    }
                }
                _ => {
                    if let Some(&top) = stack.last() {
                        forest.touch(top, node);
                    }
                }
            }
        }
        Ok(forest)
    }

    fn touch(&mut self, idx: usize, node: NodeId) {
        self.nodes[idx].block_count += 1;
        self.node_to_loop.insert(node, idx);
    }

    pub fn get(&self, idx: usize) -> &LoopNode {
        &self.nodes[idx]
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn loop_of(&self, node: NodeId) -> Option<usize> {
        self.node_to_loop.get(&node).copied()
    }

    /// Reverse-DFS order (§4.7 step 2): every loop's children precede the
    /// loop itself, so nested loops are always typed before their parent.
    pub fn inner_first(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut visit_stack: Vec<(usize, usize)> = Vec::new();
        for &root in &self.roots {
            visit_stack.push((root, 0));
            while let Some(&mut (node, ref mut pos)) = visit_stack.last_mut() {
                let children = &self.nodes[node].children;
                if *pos < children.len() {
                    let child = children[*pos];
                    *pos += 1;
                    visit_stack.push((child, 0));
                } else {
                    order.push(node);
                    visit_stack.pop();
                }
            }
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn push_loop(graph: &mut Graph, pred: NodeId) -> (NodeId, NodeId, NodeId) {
        let header = graph.new_node(NodeKind::ControlFlow(ControlFlowKind::LoopHeader(pred)));
        let body = graph.new_node(NodeKind::ControlFlow(ControlFlowKind::Loop(header)));
        let exit = graph.new_node(NodeKind::ControlFlow(ControlFlowKind::LoopExit(header)));
        (header, body, exit)
    }

    #[test]
    fn single_loop_is_one_root_with_no_children() {
        let mut g = Graph::new();
        let start = g.new_start().unwrap();
        let (header, body, exit) = push_loop(&mut g, start);
        let forest = LoopForest::build(&g).unwrap();
        assert_eq!(forest.roots().len(), 1);
        let root = forest.get(forest.roots()[0]);
        assert!(root.is_leaf());
        assert_eq!(root.header, header);
        assert_eq!(root.body, Some(body));
        assert_eq!(root.exit, Some(exit));
    }

    #[test]
    fn nested_loop_is_child_of_outer() {
        let mut g = Graph::new();
        let start = g.new_start().unwrap();
        let outer_header = g.new_node(NodeKind::ControlFlow(ControlFlowKind::LoopHeader(start)));
        let outer_body = g.new_node(NodeKind::ControlFlow(ControlFlowKind::Loop(outer_header)));
        let (inner_header, _inner_body, inner_exit) = push_loop(&mut g, outer_body);
        let _outer_exit = g.new_node(NodeKind::ControlFlow(ControlFlowKind::LoopExit(inner_exit)));

        let forest = LoopForest::build(&g).unwrap();
        assert_eq!(forest.roots().len(), 1);
        let outer = forest.get(forest.roots()[0]);
        assert_eq!(outer.children.len(), 1);
        let inner = forest.get(outer.children[0]);
        assert_eq!(inner.depth, outer.depth + 1);
        assert_eq!(forest.loop_of(inner_header), Some(outer.children[0]));
    }

    #[test]
    fn inner_first_visits_children_before_parent() {
        let mut g = Graph::new();
        let start = g.new_start().unwrap();
        let outer_header = g.new_node(NodeKind::ControlFlow(ControlFlowKind::LoopHeader(start)));
        let outer_body = g.new_node(NodeKind::ControlFlow(ControlFlowKind::Loop(outer_header)));
        let (_inner_header, _inner_body, inner_exit) = push_loop(&mut g, outer_body);
        let _outer_exit = g.new_node(NodeKind::ControlFlow(ControlFlowKind::LoopExit(inner_exit)));

        let forest = LoopForest::build(&g).unwrap();
        let order = forest.inner_first();
        assert_eq!(order.len(), 2);
        let outer_idx = forest.roots()[0];
        assert_eq!(order.last().copied(), Some(outer_idx));
    }
}
