//! Memory folder (§4.6): the most intricate folder. It is not driven
//! through [`super::folder::FolderChain`] -- it needs a numbering table
//! that persists across the whole graph build and the builder calls it
//! directly at `ObjectFind`/`ListIndex`/`*RefGet`/`*RefSet` construction
//! sites, mirroring how the source keeps `MemoryFolder::ref_table_` as
//! folder-instance state rather than routing it through the generic
//! `FolderData` dispatch.
//!
//! Three pieces: reference numbering (`FindRef`), store-forwarding (a
//! load observes a prior write to the same slot), and store-collapsing (a
//! write makes an earlier write to the same slot dead).
//!
//! Narrowing: the source also collapses a write into a *whole-container*
//! literal (`a = {"a":1}; a.a = 2;` becomes a single rewritten literal).
//! `IrObject`/`IrList` are pure, GVN'd nodes here (§3.3) -- mutating one
//! in place would corrupt every other user sharing that interned node,
//! and building a *new* literal to replace it needs a live edge rewrite
//! the folder layer has no access to. That half of store-collapsing is
//! therefore not implemented; it is a missed optimization, not a
//! correctness gap (§7: no-fold is an expected outcome). Store-forwarding
//! from a whole-container literal has no such hazard (it only reads) and
//! is implemented.

use indexmap::IndexMap;

use crate::alias::{self, AliasResult};
use crate::error::HirResult;
use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::{EffectKind, ExprKind, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RefKey {
    is_list: bool,
    object: NodeId,
    key: NodeId,
    barrier: NodeId,
}

/// Numbering table for `ObjectFind`/`ListIndex` nodes. Node equality here
/// is plain `NodeId` equality: pure operands are already GVN'd, so two
/// structurally equal `{object, key}` pairs already share one id each.
#[derive(Debug, Default)]
pub struct RefTable {
    table: IndexMap<RefKey, NodeId>,
}

impl RefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `FindRef` (§4.6): walks barriers back from `effect` looking for an
    /// existing numbering of `{object, key}`. Stops and gives up as soon
    /// as an intervening barrier may or must alias `object`, or a hard
    /// barrier is reached. Returns `None` when the caller should build a
    /// fresh reference node and register it with [`RefTable::insert`].
    pub fn find_ref(
        &self,
        graph: &Graph,
        object: NodeId,
        key: NodeId,
        effect: NodeId,
        is_list: bool,
    ) -> HirResult<Option<NodeId>> {
        let mut cur = effect;
        loop {
            if let Some(existing) = self.table.get(&RefKey { is_list, object, key, barrier: cur }) {
                return Ok(Some(*existing));
            }
            let alias = if is_list {
                alias::query_list(graph, object, cur)?
            } else {
                alias::query_object(graph, object, cur)?
            };
            if alias != AliasResult::Not {
                return Ok(None);
            }
            if is_barrier_stop(graph, cur)? {
                return Ok(None);
            }
            match graph.effect_edge(cur)? {
                Some(pred) => cur = pred,
                None => return Ok(None),
            }
        }
    }

    /// Registers `reference` as the numbering for `{object, key}` at the
    /// barrier it was built against (its "first barrier").
    pub fn insert(&mut self, object: NodeId, key: NodeId, effect: NodeId, is_list: bool, reference: NodeId) {
        self.table.insert(RefKey { is_list, object, key, barrier: effect }, reference);
    }
}

fn is_barrier_stop(graph: &Graph, id: NodeId) -> HirResult<bool> {
    Ok(match graph.get(id)? {
        NodeKind::Effect(kind) => kind.is_hard_barrier() || matches!(kind, EffectKind::EffectPhi { .. }),
        _ => false,
    })
}

enum BranchAa {
    Must,
    May,
    Not(NodeId),
}

fn set_ref_of(graph: &Graph, id: NodeId) -> HirResult<Option<NodeId>> {
    Ok(match graph.get(id)? {
        NodeKind::Expr(ExprKind::ObjectRefSet { reference, .. }) => Some(*reference),
        NodeKind::Expr(ExprKind::ListRefSet { reference, .. }) => Some(*reference),
        _ => None,
    })
}

fn container_write_object(graph: &Graph, id: NodeId) -> HirResult<Option<NodeId>> {
    // A fresh container literal used as the current write of its root group
    // marks "the whole object/list was just (re)built here".
    Ok(match graph.get(id)? {
        NodeKind::Expr(ExprKind::IrObject(_)) | NodeKind::Expr(ExprKind::IrList(_)) => Some(id),
        _ => None,
    })
}

fn branch_alias_single(graph: &Graph, reference: NodeId, start: NodeId) -> HirResult<BranchAa> {
    let mut cur = start;
    loop {
        if let Some(set_ref) = set_ref_of(graph, cur)? {
            match alias::query_field_ref(graph, reference, set_ref)? {
                AliasResult::Must => return Ok(BranchAa::Must),
                AliasResult::May => return Ok(BranchAa::May),
                AliasResult::Not => {}
            }
        } else if container_write_object(graph, cur)?.is_some() {
            // Conservative: a whole-container rebuild may touch anything.
            return Ok(BranchAa::May);
        } else if let NodeKind::Effect(EffectKind::BranchStartEffect(_)) = graph.get(cur)? {
            return Ok(BranchAa::Not(cur));
        } else if let NodeKind::Effect(EffectKind::EffectPhi { operands, .. }) = graph.get(cur)? {
            return branch_alias(graph, reference, &operands.clone());
        } else if is_barrier_stop(graph, cur)? {
            return Ok(BranchAa::May);
        }
        match graph.effect_edge(cur)? {
            Some(pred) => cur = pred,
            None => return Ok(BranchAa::May),
        }
    }
}

/// Branch alias analysis (§4.6): walks every incoming write of an
/// `EffectPhi`, requiring unanimous agreement before reporting anything
/// other than `May`. A `Must` verdict is degraded to `May` here (per
/// spec: "no pairs are recorded"), since neither forwarding nor
/// collapsing is sound across a branch unless every path is provably
/// unaliased.
fn branch_alias(graph: &Graph, reference: NodeId, operands: &[NodeId]) -> HirResult<BranchAa> {
    if operands.len() < 2 {
        return Ok(BranchAa::May);
    }
    let first = branch_alias_single(graph, reference, operands[0])?;
    if matches!(first, BranchAa::May) {
        return Ok(BranchAa::May);
    }
    for &op in &operands[1..] {
        let next = branch_alias_single(graph, reference, op)?;
        match (&first, &next) {
            (BranchAa::Must, BranchAa::Must) => {}
            (BranchAa::Not(_), BranchAa::Not(_)) => {}
            _ => return Ok(BranchAa::May),
        }
    }
    match first {
        BranchAa::Not(end) => Ok(BranchAa::Not(end)),
        _ => Ok(BranchAa::May),
    }
}

fn container_load(graph: &Graph, reference: NodeId, container: NodeId) -> HirResult<Option<NodeId>> {
    match (graph.get(reference)?, graph.get(container)?) {
        (NodeKind::Expr(ExprKind::ObjectFind { key, .. }), NodeKind::Expr(ExprKind::IrObject(pairs))) => {
            let key = *key;
            Ok(pairs.iter().find(|pair| pair.0 == key).map(|pair| pair.1))
        }
        (NodeKind::Expr(ExprKind::ListIndex { index, .. }), NodeKind::Expr(ExprKind::IrList(elems))) => {
            match graph.get(*index)? {
                NodeKind::Expr(ExprKind::Float64(n)) if n.fract() == 0.0 && *n >= 0.0 => {
                    Ok(elems.get(*n as usize).copied())
                }
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

/// Store-forwarding (§4.6): walks the write chain from `effect`, looking
/// for the write that produced `reference`'s current value.
pub fn store_forward(graph: &Graph, reference: NodeId, effect: NodeId) -> HirResult<Option<NodeId>> {
    let mut cur = effect;
    loop {
        if let Some(set_ref) = set_ref_of(graph, cur)? {
            match alias::query_field_ref(graph, reference, set_ref)? {
                AliasResult::Must => {
                    let value = match graph.get(cur)? {
                        NodeKind::Expr(ExprKind::ObjectRefSet { value, .. }) => *value,
                        NodeKind::Expr(ExprKind::ListRefSet { value, .. }) => *value,
                        _ => unreachable!(),
                    };
                    return Ok(Some(value));
                }
                AliasResult::May => return Ok(None),
                AliasResult::Not => {}
            }
        } else if let Some(container) = container_write_object(graph, cur)? {
            if let Some(obj) = reference_object(graph, reference)? {
                if obj == container {
                    if let Some(value) = container_load(graph, reference, container)? {
                        return Ok(Some(value));
                    }
                }
            }
        } else if let NodeKind::Effect(EffectKind::EffectPhi { operands, .. }) = graph.get(cur)? {
            match branch_alias(graph, reference, &operands.clone())? {
                BranchAa::Not(end) => {
                    cur = match graph.effect_edge(end)? {
                        Some(pred) => pred,
                        None => return Ok(None),
                    };
                    continue;
                }
                _ => return Ok(None),
            }
        } else if is_barrier_stop(graph, cur)? {
            return Ok(None);
        }
        match graph.effect_edge(cur)? {
            Some(pred) => cur = pred,
            None => return Ok(None),
        }
    }
}

fn reference_object(graph: &Graph, reference: NodeId) -> HirResult<Option<NodeId>> {
    Ok(match graph.get(reference)? {
        NodeKind::Expr(ExprKind::ObjectFind { object, .. }) => Some(*object),
        NodeKind::Expr(ExprKind::ListIndex { object, .. }) => Some(*object),
        _ => None,
    })
}

/// Returns `true` if some `ObjectRefGet`/`ListRefGet` built directly
/// against `write` (i.e. its `effect` input is `write`) may or must alias
/// `reference`. Reads do not advance [`crate::effect::EffectState`]'s
/// current-write pointer (only writes do), so a read sitting between
/// `write` and the next write to the same group is otherwise invisible to
/// a backward effect-chain walk -- this is the step that catches it.
fn write_has_aliasing_read(graph: &Graph, write: NodeId, reference: NodeId) -> HirResult<bool> {
    for user_ref in graph.references(write) {
        let (read_reference, read_effect) = match graph.get(user_ref.user)? {
            NodeKind::Expr(ExprKind::ObjectRefGet { reference, effect }) => (*reference, *effect),
            NodeKind::Expr(ExprKind::ListRefGet { reference, effect }) => (*reference, *effect),
            _ => continue,
        };
        if read_effect != write {
            continue;
        }
        if alias::query_field_ref(graph, reference, read_reference)? != AliasResult::Not {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Store-collapsing (§4.6): a new write at `reference` with `value` may
/// overwrite an existing dead write to the same slot in place instead of
/// allocating a new node, provided no read of that slot happened since.
/// Step 1 (§4.6) checks exactly that: a must-aliased prior write is only
/// collapsed if no `ObjectRefGet`/`ListRefGet` built against it could have
/// observed its value -- otherwise the collapse would retroactively change
/// what that read saw. This core does not track a forward read list per
/// write node (§9 simplification to a value-typed
/// [`crate::effect::EffectState`]), so [`write_has_aliasing_read`] recovers
/// the same answer by walking the write's use-list instead.
pub fn store_collapse(
    graph: &mut Graph,
    reference: NodeId,
    value: NodeId,
    effect: NodeId,
) -> HirResult<Option<NodeId>> {
    let mut cur = effect;
    loop {
        if let Some(set_ref) = set_ref_of(graph, cur)? {
            match alias::query_field_ref(graph, reference, set_ref)? {
                AliasResult::Must => {
                    if write_has_aliasing_read(graph, cur, reference)? {
                        return Ok(None);
                    }
                    overwrite_set_value(graph, cur, value)?;
                    return Ok(Some(cur));
                }
                AliasResult::May => return Ok(None),
                AliasResult::Not => {}
            }
        } else if container_write_object(graph, cur)?.is_some() {
            // See module doc comment: whole-container collapsing is not
            // implemented (GVN/mutation hazard). Treat as opaque.
            return Ok(None);
        } else if let NodeKind::Effect(EffectKind::EffectPhi { operands, .. }) = graph.get(cur)? {
            match branch_alias(graph, reference, &operands.clone())? {
                BranchAa::Not(end) => {
                    cur = match graph.effect_edge(end)? {
                        Some(pred) => pred,
                        None => return Ok(None),
                    };
                    continue;
                }
                _ => return Ok(None),
            }
        } else if is_barrier_stop(graph, cur)? {
            return Ok(None);
        }
        match graph.effect_edge(cur)? {
            Some(pred) => cur = pred,
            None => return Ok(None),
        }
    }
}

fn overwrite_set_value(graph: &mut Graph, set_node: NodeId, value: NodeId) -> HirResult<()> {
    match graph.get_mut(set_node)? {
        NodeKind::Expr(ExprKind::ObjectRefSet { value: v, .. }) => *v = value,
        NodeKind::Expr(ExprKind::ListRefSet { value: v, .. }) => *v = value,
        _ => unreachable!(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentinel(g: &mut Graph) -> NodeId {
        g.new_node(NodeKind::Effect(EffectKind::EmptyBarrier))
    }

    #[test]
    fn find_ref_reuses_same_object_key_at_same_barrier() {
        let mut g = Graph::new();
        let mut table = RefTable::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let key = g.new_expr(ExprKind::SString("x".into()));
        let barrier = sentinel(&mut g);
        let first = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key, effect: barrier }));
        table.insert(obj, key, barrier, false, first);
        let found = table.find_ref(&g, obj, key, barrier, false).unwrap();
        assert_eq!(found, Some(first));
    }

    #[test]
    fn find_ref_aborts_past_unrelated_write() {
        let mut g = Graph::new();
        let mut table = RefTable::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let key = g.new_expr(ExprKind::SString("x".into()));
        let barrier = sentinel(&mut g);
        let first = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key, effect: barrier }));
        table.insert(obj, key, barrier, false, first);

        let other_ref = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key, effect: barrier }));
        let new_value = g.new_expr(ExprKind::Float64(1.0));
        let write = g.new_node(NodeKind::Expr(ExprKind::ObjectRefSet {
            reference: other_ref,
            value: new_value,
            effect: barrier,
        }));
        assert!(table.find_ref(&g, obj, key, write, false).unwrap().is_none());
    }

    #[test]
    fn store_forward_returns_must_aliased_write_value() {
        let mut g = Graph::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let key = g.new_expr(ExprKind::SString("x".into()));
        let barrier = sentinel(&mut g);
        let reference = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key, effect: barrier }));
        let value = g.new_expr(ExprKind::Float64(42.0));
        let write = g.new_node(NodeKind::Expr(ExprKind::ObjectRefSet {
            reference,
            value,
            effect: barrier,
        }));
        let forwarded = store_forward(&g, reference, write).unwrap();
        assert_eq!(forwarded, Some(value));
    }

    #[test]
    fn store_forward_stops_on_may_aliased_write() {
        let mut g = Graph::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::UGet(0)));
        let key1 = g.new_expr(ExprKind::SString("x".into()));
        let key2 = g.new_node(NodeKind::Expr(ExprKind::Arg(1)));
        let barrier = sentinel(&mut g);
        let reference = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key: key1, effect: barrier }));
        let other_ref = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key: key2, effect: barrier }));
        let value = g.new_expr(ExprKind::Float64(1.0));
        let write = g.new_node(NodeKind::Expr(ExprKind::ObjectRefSet {
            reference: other_ref,
            value,
            effect: barrier,
        }));
        assert!(store_forward(&g, reference, write).unwrap().is_none());
    }

    #[test]
    fn store_collapse_overwrites_must_aliased_write_in_place() {
        let mut g = Graph::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let key = g.new_expr(ExprKind::SString("x".into()));
        let barrier = sentinel(&mut g);
        let reference = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key, effect: barrier }));
        let old_value = g.new_expr(ExprKind::Float64(1.0));
        let write = g.new_node(NodeKind::Expr(ExprKind::ObjectRefSet {
            reference,
            value: old_value,
            effect: barrier,
        }));
        let new_value = g.new_expr(ExprKind::Float64(2.0));
        let collapsed = store_collapse(&mut g, reference, new_value, write).unwrap();
        assert_eq!(collapsed, Some(write));
        match g.get(write).unwrap() {
            NodeKind::Expr(ExprKind::ObjectRefSet { value, .. }) => assert_eq!(*value, new_value),
            _ => panic!("expected ObjectRefSet"),
        }
    }

    #[test]
    fn store_collapse_refuses_when_intervening_read_observed_the_write() {
        // a.x = 1; t = a.x; a.x = 2;  -- collapsing the second store into
        // the first would drop the value `t` observed.
        let mut g = Graph::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let key = g.new_expr(ExprKind::SString("x".into()));
        let barrier = sentinel(&mut g);
        let reference = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key, effect: barrier }));
        let old_value = g.new_expr(ExprKind::Float64(1.0));
        let write = g.new_node(NodeKind::Expr(ExprKind::ObjectRefSet {
            reference,
            value: old_value,
            effect: barrier,
        }));
        let _read = g.new_node(NodeKind::Expr(ExprKind::ObjectRefGet { reference, effect: write }));
        let new_value = g.new_expr(ExprKind::Float64(2.0));
        let collapsed = store_collapse(&mut g, reference, new_value, write).unwrap();
        assert!(collapsed.is_none());
        match g.get(write).unwrap() {
            NodeKind::Expr(ExprKind::ObjectRefSet { value, .. }) => assert_eq!(*value, old_value),
            _ => panic!("expected ObjectRefSet"),
        }
    }

    #[test]
    fn store_forward_reads_whole_container_literal() {
        let mut g = Graph::new();
        let key = g.new_expr(ExprKind::SString("a".into()));
        let value = g.new_expr(ExprKind::Float64(1.0));
        let obj = g.new_node(NodeKind::Expr(ExprKind::IrObject(vec![(key, value)])));
        let effect = sentinel(&mut g);
        let reference = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key, effect }));
        let forwarded = store_forward(&g, reference, obj).unwrap();
        assert_eq!(forwarded, Some(value));
    }
}
