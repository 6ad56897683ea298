//! Box/Unbox folder (§4.6): elides round-trips through the boxed
//! representation when the numeric kind matches on both sides.
//!
//! The source's `FoldUnboxNode` has no return value on its "not a box
//! node" branch (an open question per §9). Resolved here as: no fold (the
//! node is returned to the caller unchanged, i.e. `None`), matching the
//! sibling `FoldBoxNode`'s behavior for a non-matching input.

use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::{ExprKind, NodeKind};
use crate::types::NumericKind;

use super::folder::{Folder, FolderData};

pub struct BoxFolder;

impl Folder for BoxFolder {
    fn can_fold(&self, _graph: &Graph, data: &FolderData) -> bool {
        matches!(data, FolderData::Expr { .. })
    }

    fn fold(&self, graph: &mut Graph, data: &FolderData) -> Option<ExprKind> {
        let FolderData::Expr { node } = data else { return None };
        match graph.get(*node).ok()? {
            NodeKind::Expr(ExprKind::Box { kind, operand }) => fold_box(graph, *kind, *operand),
            NodeKind::Expr(ExprKind::Unbox { kind, operand }) => fold_unbox(graph, *kind, *operand),
            _ => None,
        }
    }
}

fn fold_box(graph: &Graph, kind: NumericKind, operand: NodeId) -> Option<ExprKind> {
    match graph.get(operand).ok()? {
        NodeKind::Expr(ExprKind::Unbox { kind: inner_kind, operand: inner }) if *inner_kind == kind => {
            Some(ExprKind::Alias(*inner))
        }
        _ => None,
    }
}

fn fold_unbox(graph: &Graph, kind: NumericKind, operand: NodeId) -> Option<ExprKind> {
    match graph.get(operand).ok()? {
        NodeKind::Expr(ExprKind::Box { kind: inner_kind, operand: inner }) if *inner_kind == kind => {
            Some(ExprKind::Alias(*inner))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_of_unbox_elides() {
        let mut g = Graph::new();
        let x = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let unboxed = g.new_node(NodeKind::Expr(ExprKind::Unbox { kind: NumericKind::Float64, operand: x }));
        let boxed = g.new_node(NodeKind::Expr(ExprKind::Box { kind: NumericKind::Float64, operand: unboxed }));
        let folded = BoxFolder.fold(&mut g, &FolderData::Expr { node: boxed });
        assert!(matches!(folded, Some(ExprKind::Alias(id)) if id == x));
    }

    #[test]
    fn unbox_of_box_elides() {
        let mut g = Graph::new();
        let x = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let boxed = g.new_node(NodeKind::Expr(ExprKind::Box { kind: NumericKind::Int64, operand: x }));
        let unboxed = g.new_node(NodeKind::Expr(ExprKind::Unbox { kind: NumericKind::Int64, operand: boxed }));
        let folded = BoxFolder.fold(&mut g, &FolderData::Expr { node: unboxed });
        assert!(matches!(folded, Some(ExprKind::Alias(id)) if id == x));
    }

    #[test]
    fn mismatched_kind_does_not_fold() {
        let mut g = Graph::new();
        let x = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let unboxed = g.new_node(NodeKind::Expr(ExprKind::Unbox { kind: NumericKind::Int64, operand: x }));
        let boxed = g.new_node(NodeKind::Expr(ExprKind::Box { kind: NumericKind::Float64, operand: unboxed }));
        assert!(BoxFolder.fold(&mut g, &FolderData::Expr { node: boxed }).is_none());
    }
}
