//! The graph arena (§4.1) and node replacement (§4.2).
//!
//! `Graph` owns every node in a single arena, indexed by the dense
//! [`NodeId`] the arena hands out on creation (§9: stable integer ids
//! instead of pointer-back-references). Reference (use) lists live in a
//! parallel side table indexed by the same id, resized whenever the
//! ceiling grows -- the idiomatic Rust form of "side-tables indexed by id"
//! from the Design Notes, rather than storing them inline on the node.
//!
//! No public operation frees a node (§3.4); [`Graph::replace`] only rewires
//! references. The arena (and everything in it) is dropped wholesale when
//! the `Graph` goes out of scope.

use smallvec::SmallVec;
use std::collections::HashMap;

use crate::error::{HirError, HirResult};
use crate::id::NodeId;
use crate::node::{ControlFlowKind, EffectKind, ExprKind, NodeKind};

/// One use site: `user`'s operand slot number `slot` holds the node being
/// referenced. Slot numbers follow `NodeKind::operands()` order; they let
/// printer/debug output name *which* edge is which, even though `replace`
/// itself only needs the `user` half (it rewrites by value equality).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandRef {
    pub user: NodeId,
    pub slot: u16,
}

pub type RefList = SmallVec<[OperandRef; 4]>;

pub struct Graph {
    nodes: Vec<NodeKind>,
    refs: Vec<RefList>,
    start: Option<NodeId>,
    end: Option<NodeId>,
    /// GVN interning table for pure expressions: structural key -> canonical id.
    gvn_table: HashMap<Vec<u64>, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            nodes: Vec::new(),
            refs: Vec::new(),
            start: None,
            end: None,
            gvn_table: HashMap::new(),
        }
    }

    /// The current node-id ceiling: every live id is `< ceiling`.
    pub fn ceiling(&self) -> u32 {
        self.nodes.len() as u32
    }

    pub fn start(&self) -> Option<NodeId> {
        self.start
    }

    pub fn end(&self) -> Option<NodeId> {
        self.end
    }

    pub fn get(&self, id: NodeId) -> HirResult<&NodeKind> {
        self.nodes
            .get(id.index())
            .ok_or(HirError::NodeNotFound { id })
    }

    pub fn get_mut(&mut self, id: NodeId) -> HirResult<&mut NodeKind> {
        self.nodes
            .get_mut(id.index())
            .ok_or(HirError::NodeNotFound { id })
    }

    pub fn references(&self, id: NodeId) -> &[OperandRef] {
        self.refs.get(id.index()).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Allocates a node, stamps its id, registers its operand edges into
    /// each operand's reference list, and returns the new id. This is the
    /// one place new ids are minted; the arena never shrinks.
    pub fn new_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let operands = kind.operands();
        self.nodes.push(kind);
        self.refs.push(RefList::new());
        for (slot, operand) in operands.iter().enumerate() {
            self.push_ref(*operand, OperandRef { user: id, slot: slot as u16 });
        }
        id
    }

    fn push_ref(&mut self, target: NodeId, r: OperandRef) {
        if let Some(list) = self.refs.get_mut(target.index()) {
            list.push(r);
        }
    }

    pub fn new_start(&mut self) -> HirResult<NodeId> {
        if let Some(existing) = self.start {
            return Err(HirError::DuplicateStartOrEnd { kind: "Start", existing });
        }
        let id = self.new_node(NodeKind::ControlFlow(ControlFlowKind::Start));
        self.start = Some(id);
        Ok(id)
    }

    pub fn new_end(&mut self) -> HirResult<NodeId> {
        if let Some(existing) = self.end {
            return Err(HirError::DuplicateStartOrEnd { kind: "End", existing });
        }
        let id = self.new_node(NodeKind::ControlFlow(ControlFlowKind::End));
        self.end = Some(id);
        Ok(id)
    }

    pub fn new_region(&mut self, preds: &[NodeId]) -> NodeId {
        let mut v = crate::node::OperandVec::new();
        v.extend(preds.iter().copied());
        self.new_node(NodeKind::ControlFlow(ControlFlowKind::Region(v)))
    }

    /// Factory for expression nodes (§6). Pure expressions are interned by
    /// GVN key; if a structurally equal node already exists, its id is
    /// returned and no new node is allocated. Folding itself (trying the
    /// folder chain before committing) is the builder's responsibility --
    /// see `builder::GraphBuilder::new_expr` -- this method only performs
    /// GVN, which is unconditional per §3.3.
    pub fn new_expr(&mut self, kind: ExprKind) -> NodeId {
        if let Some(key) = kind.gvn_key() {
            if let Some(existing) = self.gvn_table.get(&key) {
                return *existing;
            }
            let id = self.new_node(NodeKind::Expr(kind));
            self.gvn_table.insert(key, id);
            id
        } else {
            self.new_node(NodeKind::Expr(kind))
        }
    }

    /// `replace(old, new)` (§4.2): rewrites every use of `old` to point at
    /// `new` and transfers `old`'s reference list to `new`. Replacing a
    /// pure node with another pure node is always legal; replacing a pure
    /// node with an effectful one is forbidden (the folder contract
    /// guarantees callers never attempt it, but the invariant is enforced
    /// here too).
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> HirResult<()> {
        if old == new {
            return Ok(());
        }
        let old_is_pure = self.get(old)?.is_pure();
        let new_is_pure = self.get(new)?.is_pure();
        if old_is_pure && !new_is_pure {
            return Err(HirError::ReplacePureWithEffectful { old, new });
        }

        let old_refs: RefList = self.refs.get(old.index()).cloned().unwrap_or_default();
        for r in &old_refs {
            if let Some(user_kind) = self.nodes.get_mut(r.user.index()) {
                user_kind.replace_operand(old, new);
            }
            self.push_ref(new, *r);
        }
        if let Some(list) = self.refs.get_mut(old.index()) {
            list.clear();
        }
        Ok(())
    }

    /// Reverse-post-order walk over control-flow nodes reachable from
    /// `Start`, following forward control edges (derived from the
    /// reference list of each control-flow node). Uses an explicit
    /// visit-marker bitset and worklist, never recursion, to bound stack
    /// usage (§4.1).
    pub fn control_flow_rpo(&self) -> Vec<NodeId> {
        let Some(start) = self.start else { return Vec::new() };
        let mut visited = vec![false; self.ceiling() as usize];
        let mut post_order = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
        visited[start.index()] = true;

        while let Some((node, next_child)) = stack.pop() {
            let successors = self.cf_successors(node);
            if next_child < successors.len() {
                stack.push((node, next_child + 1));
                let child = successors[next_child];
                if !visited[child.index()] {
                    visited[child.index()] = true;
                    stack.push((child, 0));
                }
            } else {
                post_order.push(node);
            }
        }
        post_order.reverse();
        post_order
    }

    /// Control-flow nodes that reference `id` as one of their control
    /// operands -- the forward control-flow edge, derived from the
    /// reference list rather than stored twice.
    fn cf_successors(&self, id: NodeId) -> Vec<NodeId> {
        self.references(id)
            .iter()
            .map(|r| r.user)
            .filter(|u| self.nodes[u.index()].is_control_flow())
            .collect()
    }

    /// Depth-first walk over one expression's operand tree (used by the
    /// printer and by marker passes). Explicit stack + visited bitset.
    pub fn expr_dfs(&self, root: NodeId) -> Vec<NodeId> {
        let mut visited = vec![false; self.ceiling() as usize];
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if visited[id.index()] {
                continue;
            }
            visited[id.index()] = true;
            order.push(id);
            if let Ok(kind) = self.get(id) {
                for operand in kind.operands().iter().rev() {
                    if !visited[operand.index()] {
                        stack.push(*operand);
                    }
                }
            }
        }
        order
    }

    /// Edge iterator used by printers and region-local analyses: every
    /// `(user, slot, target)` triple in the graph.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, u16, NodeId)> + '_ {
        self.nodes.iter().enumerate().flat_map(|(idx, kind)| {
            let user = NodeId(idx as u32);
            kind.operands()
                .into_iter()
                .enumerate()
                .map(move |(slot, target)| (user, slot as u16, target))
                .collect::<Vec<_>>()
        })
    }

    /// The incoming effect edge of a node, if any (§3.2).
    pub fn effect_edge(&self, id: NodeId) -> HirResult<Option<NodeId>> {
        Ok(match self.get(id)? {
            NodeKind::Expr(e) => e.effect_edge(),
            NodeKind::Effect(eff) => match eff {
                EffectKind::EffectBarrier { input, .. } => Some(*input),
                EffectKind::BranchStartEffect(x)
                | EffectKind::WriteEffect(x)
                | EffectKind::ReadEffect(x) => Some(*x),
                EffectKind::EffectPhi { region, .. } => Some(*region),
                EffectKind::ListResize { input, .. } | EffectKind::ObjectResize { input, .. } => {
                    Some(*input)
                }
                EffectKind::EmptyBarrier => None,
            },
            NodeKind::ControlFlow(_) => None,
        })
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ExprKind;
    use crate::ops::{ArithOp, BinaryOp};

    fn float(g: &mut Graph, v: f64) -> NodeId {
        g.new_expr(ExprKind::Float64(v))
    }

    #[test]
    fn start_and_end_are_unique() {
        let mut g = Graph::new();
        g.new_start().unwrap();
        assert!(g.new_start().is_err());
        g.new_end().unwrap();
        assert!(g.new_end().is_err());
    }

    #[test]
    fn gvn_interns_identical_float_constants() {
        let mut g = Graph::new();
        let a = float(&mut g, 1.5);
        let b = float(&mut g, 1.5);
        assert_eq!(a, b);
        assert_eq!(g.ceiling(), 1);
    }

    #[test]
    fn gvn_keeps_distinct_constants_distinct() {
        let mut g = Graph::new();
        let a = float(&mut g, 1.0);
        let b = float(&mut g, 2.0);
        assert_ne!(a, b);
    }

    #[test]
    fn new_node_registers_operand_references() {
        let mut g = Graph::new();
        let a = float(&mut g, 1.0);
        let b = float(&mut g, 2.0);
        let bin = g.new_expr(ExprKind::Binary {
            op: BinaryOp::Arith(ArithOp::Add),
            lhs: a,
            rhs: b,
        });
        let refs = g.references(a);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].user, bin);
        assert_eq!(refs[0].slot, 0);
    }

    #[test]
    fn replace_rewires_all_users_and_reference_list() {
        let mut g = Graph::new();
        let a = float(&mut g, 1.0);
        let b = float(&mut g, 2.0);
        let bin = g.new_expr(ExprKind::Binary {
            op: BinaryOp::Arith(ArithOp::Add),
            lhs: a,
            rhs: b,
        });
        let folded = float(&mut g, 3.0);
        g.replace(bin, folded).unwrap();

        assert!(g.references(a).is_empty());
        assert!(g.references(b).is_empty());
        assert!(g.references(bin).is_empty());
    }

    #[test]
    fn replace_forbids_pure_with_effectful() {
        let mut g = Graph::new();
        let pure = float(&mut g, 1.0);
        let effect = g.new_node(NodeKind::Effect(EffectKind::EmptyBarrier));
        let call = g.new_node(NodeKind::Expr(ExprKind::Call {
            callee: pure,
            args: crate::node::OperandVec::new(),
            effect,
        }));
        assert!(g.replace(pure, call).is_err());
    }

    #[test]
    fn control_flow_rpo_visits_start_first() {
        let mut g = Graph::new();
        let start = g.new_start().unwrap();
        let region = g.new_region(&[start]);
        g.new_node(NodeKind::ControlFlow(ControlFlowKind::Jump(region)));
        let order = g.control_flow_rpo();
        assert_eq!(order.first(), Some(&start));
    }

    #[test]
    fn expr_dfs_visits_operands() {
        let mut g = Graph::new();
        let a = float(&mut g, 1.0);
        let b = float(&mut g, 2.0);
        let bin = g.new_expr(ExprKind::Binary {
            op: BinaryOp::Arith(ArithOp::Add),
            lhs: a,
            rhs: b,
        });
        let order = g.expr_dfs(bin);
        assert!(order.contains(&a));
        assert!(order.contains(&b));
        assert_eq!(order[0], bin);
    }
}
