//! Three-valued alias analysis (§4.4): `Must`, `May`, `Not`.
//!
//! Two queries. (a) field-reference vs. field-reference, used by the
//! memory folder to decide whether a read can be forwarded from a prior
//! write to the same slot. (b) memory object vs. typed effect barrier,
//! used to decide whether a `ListResize`/`ObjectResize` can be skipped
//! over when looking for the write that produced a value.
//!
//! Node equality here is `NodeId` equality: pure expressions are GVN'd
//! (§3.3), so two structurally equal pure operands already share one id;
//! identity is exactly the structural-equality test the source performs.

use crate::error::HirResult;
use crate::id::NodeId;
use crate::node::{EffectKind, ExprKind, NodeKind};
use crate::types::TypeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasResult {
    Not,
    May,
    Must,
}

struct FieldRef {
    is_list: bool,
    object: NodeId,
    component: NodeId,
}

fn field_ref(graph: &crate::graph::Graph, id: NodeId) -> HirResult<Option<FieldRef>> {
    Ok(match graph.get(id)? {
        NodeKind::Expr(ExprKind::ObjectFind { object, key, .. }) => Some(FieldRef {
            is_list: false,
            object: *object,
            component: *key,
        }),
        NodeKind::Expr(ExprKind::ListIndex { object, index, .. }) => Some(FieldRef {
            is_list: true,
            object: *object,
            component: *index,
        }),
        _ => None,
    })
}

fn is_container_literal(graph: &crate::graph::Graph, id: NodeId) -> HirResult<bool> {
    Ok(matches!(
        graph.get(id)?,
        NodeKind::Expr(ExprKind::IrList(_)) | NodeKind::Expr(ExprKind::IrObject(_))
    ))
}

fn is_param_like(graph: &crate::graph::Graph, id: NodeId) -> HirResult<bool> {
    Ok(matches!(
        graph.get(id)?,
        NodeKind::Expr(ExprKind::Arg(_)) | NodeKind::Expr(ExprKind::UGet(_))
    ))
}

fn is_float_or_string_const(graph: &crate::graph::Graph, id: NodeId) -> HirResult<bool> {
    Ok(matches!(
        graph.get(id)?,
        NodeKind::Expr(ExprKind::Float64(_))
            | NodeKind::Expr(ExprKind::LongString(_))
            | NodeKind::Expr(ExprKind::SString(_))
    ))
}

/// Query alias information between two field-reference nodes
/// (`ObjectFind`/`ListIndex` results). Either argument that is not a field
/// reference is treated as opaque and yields `May` (the fallback the
/// source takes for anything it cannot classify further).
pub fn query_field_ref(
    graph: &crate::graph::Graph,
    lhs: NodeId,
    rhs: NodeId,
) -> HirResult<AliasResult> {
    if lhs == rhs {
        return Ok(AliasResult::Must);
    }
    let (Some(l), Some(r)) = (field_ref(graph, lhs)?, field_ref(graph, rhs)?) else {
        return Ok(AliasResult::May);
    };

    if l.is_list != r.is_list {
        return Ok(AliasResult::Not);
    }

    if l.object == r.object {
        if l.component == r.component {
            return Ok(AliasResult::Must);
        }
        let both_float = is_float_or_string_const(graph, l.component)?
            && is_float_or_string_const(graph, r.component)?;
        if both_float {
            return Ok(AliasResult::Not);
        }
    } else {
        let lobj_container = is_container_literal(graph, l.object)?;
        let robj_container = is_container_literal(graph, r.object)?;

        if lobj_container {
            if is_param_like(graph, r.object)? || robj_container {
                return Ok(AliasResult::Not);
            }
        }
        if robj_container {
            if is_param_like(graph, l.object)? || lobj_container {
                return Ok(AliasResult::Not);
            }
        }
    }

    Ok(AliasResult::May)
}

/// Query whether `effect` (expected to be a typed `EffectBarrier`-family
/// node, i.e. `ListResize`/`ObjectResize`) can be ruled out as touching
/// `object`, which is known (by `type_hint`) to be a list or an object.
fn query_memory(
    graph: &crate::graph::Graph,
    object: NodeId,
    effect: NodeId,
    type_hint: TypeKind,
) -> HirResult<AliasResult> {
    match graph.get(effect)? {
        NodeKind::Effect(EffectKind::ListResize { object: target, .. }) => {
            if type_hint == TypeKind::Object {
                return Ok(AliasResult::Not);
            }
            if type_hint == TypeKind::List && *target == object {
                return Ok(AliasResult::Must);
            }
        }
        NodeKind::Effect(EffectKind::ObjectResize { object: target, .. }) => {
            if type_hint == TypeKind::List {
                return Ok(AliasResult::Not);
            }
            if type_hint == TypeKind::Object && *target == object {
                return Ok(AliasResult::Must);
            }
        }
        _ => {}
    }
    Ok(AliasResult::May)
}

pub fn query_object(
    graph: &crate::graph::Graph,
    object: NodeId,
    effect: NodeId,
) -> HirResult<AliasResult> {
    query_memory(graph, object, effect, TypeKind::Object)
}

pub fn query_list(
    graph: &crate::graph::Graph,
    list: NodeId,
    effect: NodeId,
) -> HirResult<AliasResult> {
    query_memory(graph, list, effect, TypeKind::List)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::node::NodeKind;

    #[test]
    fn identical_field_ref_is_must() {
        let mut g = Graph::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let key = g.new_expr(ExprKind::SString("x".into()));
        let effect = g.new_node(NodeKind::Effect(EffectKind::EmptyBarrier));
        let fref = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key, effect }));
        assert_eq!(query_field_ref(&g, fref, fref).unwrap(), AliasResult::Must);
    }

    #[test]
    fn list_ref_vs_object_ref_is_not() {
        let mut g = Graph::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let key = g.new_expr(ExprKind::SString("x".into()));
        let idx = g.new_expr(ExprKind::Float64(0.0));
        let effect = g.new_node(NodeKind::Effect(EffectKind::EmptyBarrier));
        let oref = g.new_node(NodeKind::Expr(ExprKind::ObjectFind { object: obj, key, effect }));
        let lref = g.new_node(NodeKind::Expr(ExprKind::ListIndex { object: obj, index: idx, effect }));
        assert_eq!(query_field_ref(&g, oref, lref).unwrap(), AliasResult::Not);
    }

    #[test]
    fn same_object_different_float_components_is_not() {
        let mut g = Graph::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let idx1 = g.new_expr(ExprKind::Float64(1.0));
        let idx2 = g.new_expr(ExprKind::Float64(2.0));
        let effect = g.new_node(NodeKind::Effect(EffectKind::EmptyBarrier));
        let a = g.new_node(NodeKind::Expr(ExprKind::ListIndex { object: obj, index: idx1, effect }));
        let b = g.new_node(NodeKind::Expr(ExprKind::ListIndex { object: obj, index: idx2, effect }));
        assert_eq!(query_field_ref(&g, a, b).unwrap(), AliasResult::Not);
    }

    #[test]
    fn distinct_container_literals_are_not_aliased() {
        let mut g = Graph::new();
        let obj1 = g.new_node(NodeKind::Expr(ExprKind::IrList(Default::default())));
        let obj2 = g.new_node(NodeKind::Expr(ExprKind::IrList(Default::default())));
        let key = g.new_expr(ExprKind::Float64(0.0));
        let effect = g.new_node(NodeKind::Effect(EffectKind::EmptyBarrier));
        let a = g.new_node(NodeKind::Expr(ExprKind::ListIndex { object: obj1, index: key, effect }));
        let b = g.new_node(NodeKind::Expr(ExprKind::ListIndex { object: obj2, index: key, effect }));
        assert_eq!(query_field_ref(&g, a, b).unwrap(), AliasResult::Not);
    }

    #[test]
    fn list_resize_not_aliased_with_object_hint() {
        let mut g = Graph::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let input = g.new_node(NodeKind::Effect(EffectKind::EmptyBarrier));
        let resize = g.new_node(NodeKind::Effect(EffectKind::ListResize { object: obj, input }));
        assert_eq!(query_object(&g, obj, resize).unwrap(), AliasResult::Not);
    }

    #[test]
    fn list_resize_must_when_target_matches() {
        let mut g = Graph::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let input = g.new_node(NodeKind::Effect(EffectKind::EmptyBarrier));
        let resize = g.new_node(NodeKind::Effect(EffectKind::ListResize { object: obj, input }));
        assert_eq!(query_list(&g, obj, resize).unwrap(), AliasResult::Must);
    }
}
