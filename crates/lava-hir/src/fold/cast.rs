//! Cast folder (§4.6): `Float64ToInt64(Unbox(Float64 const))` constant
//! folding, when the value fits losslessly in an `i64`.
//!
//! The closed node-kind set (§3.1) has no separate int64 literal node --
//! typed int64 arithmetic operates on an unboxed `i64` domain without its
//! own constant wrapper. The fold result here is therefore represented as
//! a `Float64` node holding the integral value; downstream typed nodes
//! read it the same way any other constant operand is read.

use crate::graph::Graph;
use crate::node::{ExprKind, NodeKind};

use super::folder::{Folder, FolderData};

pub struct CastFolder;

impl Folder for CastFolder {
    fn can_fold(&self, graph: &Graph, data: &FolderData) -> bool {
        match data {
            FolderData::Expr { node } => matches!(
                graph.get(*node),
                Ok(NodeKind::Expr(ExprKind::Float64ToInt64(_)))
            ),
            _ => false,
        }
    }

    fn fold(&self, graph: &mut Graph, data: &FolderData) -> Option<ExprKind> {
        let FolderData::Expr { node } = data else { return None };
        let operand = match graph.get(*node).ok()? {
            NodeKind::Expr(ExprKind::Float64ToInt64(x)) => *x,
            _ => return None,
        };
        let operand = match graph.get(operand).ok()? {
            NodeKind::Expr(ExprKind::Unbox { operand: inner, .. }) => *inner,
            _ => operand,
        };
        let value = match graph.get(operand).ok()? {
            NodeKind::Expr(ExprKind::Float64(v)) => *v,
            _ => return None,
        };
        try_cast_real_to_int64(value).map(|i| ExprKind::Float64(i as f64))
    }
}

fn try_cast_real_to_int64(v: f64) -> Option<i64> {
    if v.fract() != 0.0 {
        return None;
    }
    if v < i64::MIN as f64 || v > i64::MAX as f64 {
        return None;
    }
    Some(v as i64)
}
