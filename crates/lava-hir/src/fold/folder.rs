//! The folder chain (§4.6): a registry of local rewrites tried eagerly at
//! node-construction time.
//!
//! The source registers folders via per-file static constructors (§9); here
//! a single [`register_all_folders`] call builds the chain explicitly at
//! core initialization. `Folder` is object-safe so the chain is a plain
//! `Vec<Box<dyn Folder>>` instead of the source's factory-of-factories
//! indirection.

use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::ExprKind;
use crate::ops::{BinaryOp, UnaryOp};

/// The closed set of fold-request shapes (§4.6).
pub enum FolderData {
    Unary { op: UnaryOp, operand: NodeId },
    Binary { op: BinaryOp, lhs: NodeId, rhs: NodeId },
    Ternary { cond: NodeId, lhs: NodeId, rhs: NodeId },
    Phi { lhs: NodeId, rhs: NodeId, region: NodeId },
    Expr { node: NodeId },
}

/// One local rewrite rule. `can_fold` is a cheap tag check (it may inspect
/// the nodes `data` names, since the request only carries ids); `fold` does
/// the actual rewrite and may still return `None`.
pub trait Folder {
    fn can_fold(&self, graph: &Graph, data: &FolderData) -> bool;
    fn fold(&self, graph: &mut Graph, data: &FolderData) -> Option<ExprKind>;
}

/// The ordered sequence of registered folders. The first folder that both
/// matches and returns `Some` wins; folding then stops.
pub struct FolderChain {
    chain: Vec<Box<dyn Folder>>,
}

impl FolderChain {
    pub fn new() -> Self {
        FolderChain { chain: Vec::new() }
    }

    pub fn register(&mut self, folder: Box<dyn Folder>) {
        self.chain.push(folder);
    }

    pub fn fold(&self, graph: &mut Graph, data: &FolderData) -> Option<ExprKind> {
        for folder in &self.chain {
            if folder.can_fold(graph, data) {
                if let Some(result) = folder.fold(graph, data) {
                    return Some(result);
                }
            }
        }
        None
    }
}

impl Default for FolderChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the standard folder chain in registration order: arithmetic,
/// intrinsic, cast, phi, box/unbox. The memory folder is driven separately
/// by the builder (it needs the numbering table and effect-chain walk, not
/// just a `FolderData` request) -- see [`crate::fold::memory`].
pub fn register_all_folders() -> FolderChain {
    let mut chain = FolderChain::new();
    chain.register(Box::new(super::arith::ArithFolder));
    chain.register(Box::new(super::intrinsic::IntrinsicFolder));
    chain.register(Box::new(super::cast::CastFolder));
    chain.register(Box::new(super::phi::PhiFolder));
    chain.register(Box::new(super::boxop::BoxFolder));
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_stops_at_first_matching_fold() {
        let mut g = Graph::new();
        let chain = register_all_folders();
        let a = g.new_expr(ExprKind::Float64(1.5));
        let b = g.new_expr(ExprKind::Float64(2.5));
        let req = FolderData::Binary { op: BinaryOp::Arith(crate::ops::ArithOp::Add), lhs: a, rhs: b };
        let folded = chain.fold(&mut g, &req);
        assert!(matches!(folded, Some(ExprKind::Float64(v)) if v == 4.0));
    }
}
