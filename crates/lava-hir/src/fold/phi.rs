//! Phi folder (§4.6): collapses a two-operand value phi whose incoming
//! values are identical, and otherwise tries to re-express the phi as a
//! ternary when its region is an `If` and the condition is available.

use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::{ControlFlowKind, ExprKind, NodeKind};

use super::arith::fold_ternary;
use super::folder::{Folder, FolderData};

pub struct PhiFolder;

impl Folder for PhiFolder {
    fn can_fold(&self, graph: &Graph, data: &FolderData) -> bool {
        match data {
            FolderData::Phi { .. } => true,
            FolderData::Expr { node } => {
                matches!(graph.get(*node), Ok(NodeKind::Expr(ExprKind::Phi { .. })))
            }
            _ => false,
        }
    }

    fn fold(&self, graph: &mut Graph, data: &FolderData) -> Option<ExprKind> {
        match data {
            FolderData::Phi { lhs, rhs, region } => fold_phi_operands(graph, *lhs, *rhs, *region),
            FolderData::Expr { node } => fold_phi_node(graph, *node),
            _ => None,
        }
    }
}

fn fold_phi_operands(graph: &mut Graph, lhs: NodeId, rhs: NodeId, region: NodeId) -> Option<ExprKind> {
    if lhs == rhs {
        return Some(ExprKind::Alias(lhs));
    }
    if let Ok(NodeKind::ControlFlow(ControlFlowKind::If { cond, .. })) = graph.get(region) {
        let cond = *cond;
        if let Some(folded) = fold_ternary(graph, cond, lhs, rhs) {
            return Some(folded);
        }
    }
    None
}

fn fold_phi_node(graph: &mut Graph, node: NodeId) -> Option<ExprKind> {
    let (region, operands) = match graph.get(node).ok()? {
        NodeKind::Expr(ExprKind::Phi { region, operands }) => (*region, operands.clone()),
        _ => return None,
    };
    if operands.len() != 2 {
        return None;
    }
    let lhs = operands[0];
    let rhs = operands[1];
    if lhs == rhs {
        return Some(ExprKind::Alias(lhs));
    }
    fold_phi_operands(graph, lhs, rhs, region)
}
