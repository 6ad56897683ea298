//! Effect groups (§4.5): construction-time bookkeeping tracking, for each
//! of three memory regions, which node is currently "the last write".
//!
//! Per the Design Notes (§9), the source's COW pointer-chain of effect
//! groups becomes a plain value type here: an [`EffectState`] is three
//! [`NodeId`]s (root/list/object current-write pointers) -- cheap enough
//! to clone wholesale on scope entry instead of threading a prev-pointer
//! chain with lazy copy-on-write.

use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::{EffectKind, NodeKind, OperandVec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectGroup {
    /// Effects on arbitrary memory: globals, unknown objects.
    Root,
    /// Effects on lists whose identity is tracked.
    ListRoot,
    /// Effects on objects whose identity is tracked.
    ObjectRoot,
}

/// A snapshot of the three effect groups' current-write pointers, as they
/// stand at one point during graph construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectState {
    root: NodeId,
    list_root: NodeId,
    object_root: NodeId,
}

impl EffectState {
    /// Starts all three groups pointing at the same `NoWriteEffect`
    /// sentinel (an `EmptyBarrier` node).
    pub fn new(sentinel: NodeId) -> Self {
        EffectState { root: sentinel, list_root: sentinel, object_root: sentinel }
    }

    /// The node a new read in `group` should record as its dependency.
    /// Adding the read does not change the state; only writes do.
    pub fn current_write(&self, group: EffectGroup) -> NodeId {
        match group {
            EffectGroup::Root => self.root,
            EffectGroup::ListRoot => self.list_root,
            EffectGroup::ObjectRoot => self.object_root,
        }
    }

    /// Advances `group`'s current write to `new_write` (which the caller
    /// has already built with `effect: old_current_write`, so the new
    /// write happens-after the old one). A write to a leaf group also
    /// advances root, since root observes everything underneath it; a
    /// write to root advances both leaves, since a write to arbitrary
    /// memory aliases everything inside it.
    pub fn record_write(&mut self, group: EffectGroup, new_write: NodeId) {
        match group {
            EffectGroup::Root => {
                self.root = new_write;
                self.list_root = new_write;
                self.object_root = new_write;
            }
            EffectGroup::ListRoot => {
                self.list_root = new_write;
                self.root = new_write;
            }
            EffectGroup::ObjectRoot => {
                self.object_root = new_write;
                self.root = new_write;
            }
        }
    }

    /// Merges two control-flow paths' effect states at `region`: installs
    /// an `EffectPhi` per group over the two sides' current writes, unless
    /// both sides still carry `sentinel` (no real write happened on either
    /// path), in which case the sentinel is kept.
    pub fn merge(
        graph: &mut Graph,
        region: NodeId,
        lhs: EffectState,
        rhs: EffectState,
        sentinel: NodeId,
    ) -> EffectState {
        let mut merge_one = |l: NodeId, r: NodeId| -> NodeId {
            if l == sentinel && r == sentinel {
                return sentinel;
            }
            let mut operands = OperandVec::new();
            operands.push(l);
            operands.push(r);
            graph.new_node(NodeKind::Effect(EffectKind::EffectPhi { region, operands }))
        };
        EffectState {
            root: merge_one(lhs.root, rhs.root),
            list_root: merge_one(lhs.list_root, rhs.list_root),
            object_root: merge_one(lhs.object_root, rhs.object_root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentinel(g: &mut Graph) -> NodeId {
        g.new_node(NodeKind::Effect(EffectKind::EmptyBarrier))
    }

    #[test]
    fn read_observes_current_write_without_mutating_state() {
        let mut g = Graph::new();
        let s = sentinel(&mut g);
        let state = EffectState::new(s);
        assert_eq!(state.current_write(EffectGroup::Root), s);
        assert_eq!(state.current_write(EffectGroup::ListRoot), s);
    }

    #[test]
    fn leaf_write_propagates_to_root() {
        let mut g = Graph::new();
        let s = sentinel(&mut g);
        let mut state = EffectState::new(s);
        let w = g.new_node(NodeKind::Effect(EffectKind::WriteEffect(s)));
        state.record_write(EffectGroup::ListRoot, w);
        assert_eq!(state.current_write(EffectGroup::ListRoot), w);
        assert_eq!(state.current_write(EffectGroup::Root), w);
        assert_eq!(state.current_write(EffectGroup::ObjectRoot), s);
    }

    #[test]
    fn root_write_propagates_to_both_leaves() {
        let mut g = Graph::new();
        let s = sentinel(&mut g);
        let mut state = EffectState::new(s);
        let w = g.new_node(NodeKind::Effect(EffectKind::WriteEffect(s)));
        state.record_write(EffectGroup::Root, w);
        assert_eq!(state.current_write(EffectGroup::ListRoot), w);
        assert_eq!(state.current_write(EffectGroup::ObjectRoot), w);
    }

    #[test]
    fn merge_keeps_sentinel_when_neither_side_wrote() {
        let mut g = Graph::new();
        let s = sentinel(&mut g);
        let lhs = EffectState::new(s);
        let rhs = EffectState::new(s);
        let region = g.new_region(&[]);
        let merged = EffectState::merge(&mut g, region, lhs, rhs, s);
        assert_eq!(merged.current_write(EffectGroup::Root), s);
    }

    #[test]
    fn merge_installs_effect_phi_when_sides_diverge() {
        let mut g = Graph::new();
        let s = sentinel(&mut g);
        let mut lhs = EffectState::new(s);
        let w = g.new_node(NodeKind::Effect(EffectKind::WriteEffect(s)));
        lhs.record_write(EffectGroup::Root, w);
        let rhs = EffectState::new(s);
        let region = g.new_region(&[]);
        let merged = EffectState::merge(&mut g, region, lhs, rhs, s);
        let phi = merged.current_write(EffectGroup::Root);
        assert_ne!(phi, s);
        match g.get(phi).unwrap() {
            NodeKind::Effect(EffectKind::EffectPhi { operands, .. }) => {
                assert_eq!(operands.as_slice(), &[w, s]);
            }
            _ => panic!("expected EffectPhi"),
        }
    }
}
