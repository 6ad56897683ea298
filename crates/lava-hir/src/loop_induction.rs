//! Loop-induction typing (§4.7 steps 2-3): once a loop's shape is known
//! ([`crate::loop_forest`]), find its linear induction-variable phis,
//! replace each with a typed `LoopIvInt64`/`LoopIvFloat64` node, and push
//! that concrete numeric type outward through its users, specializing
//! polymorphic `Unary`/`Binary` nodes into their unboxed `Float64*`/
//! `Int64*` forms (or folding them away entirely) as the type reaches them.
//! Grounded on `original_source/src/cbase/pass/loop-induction.cc`'s
//! `LoopIVTyper`.
//!
//! The source also consults a separate static type-inference pass
//! (`GetTypeInference`) to seed and re-check types as propagation
//! proceeds. This core has no such oracle, so a `start`/`step` operand's
//! type is read directly off the shape of whatever produced it (a
//! `Float64` literal, a `Box`/`Unbox { kind, .. }`, or an already-typed
//! `Float64*`/`Int64*` producer); anything else is untyped, matching
//! `GetTypeInference` returning "unknown". Because that typing is a pure
//! function of node shape rather than a mutable inference oracle, a phi's
//! typeability cannot change between visits, so the source's per-loop
//! fixpoint (`has_change`) loop is unnecessary here: each phi and each
//! propagated user is visited once.

use std::collections::{HashSet, VecDeque};

use crate::error::HirResult;
use crate::fold::arith::ArithFolder;
use crate::fold::folder::{Folder, FolderData};
use crate::graph::Graph;
use crate::id::NodeId;
use crate::loop_forest::LoopForest;
use crate::node::{ExprKind, NodeKind};
use crate::ops::BinaryOp;
use crate::types::NumericKind;

/// Summary of what the pass managed to type, for diagnostics/tests.
#[derive(Debug, Default)]
pub struct LoopIvReport {
    pub typed_ivs: usize,
    pub specialized: usize,
}

/// Entry point mirroring `LoopInduction::Perform`: type every loop's
/// induction variables, inner loops first.
pub struct LoopInduction;

impl LoopInduction {
    pub fn perform(graph: &mut Graph, forest: &LoopForest) -> HirResult<LoopIvReport> {
        let mut report = LoopIvReport::default();
        for idx in forest.inner_first() {
            let header = forest.get(idx).header;
            for phi in phis_in_region(graph, header) {
                if let Some((new_iv, kind)) = install_loop_iv(graph, phi)? {
                    report.typed_ivs += 1;
                    report.specialized += propagate(graph, new_iv, kind)?;
                }
            }
        }
        Ok(report)
    }
}

fn phis_in_region(graph: &Graph, region: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    for i in 0..graph.ceiling() {
        let id = NodeId(i);
        if let Ok(NodeKind::Expr(ExprKind::Phi { region: r, .. })) = graph.get(id) {
            if *r == region {
                out.push(id);
            }
        }
    }
    out
}

fn numeric_kind_of(graph: &Graph, id: NodeId) -> HirResult<Option<NumericKind>> {
    Ok(match graph.get(id)? {
        NodeKind::Expr(ExprKind::Float64(_)) => Some(NumericKind::Float64),
        NodeKind::Expr(ExprKind::Box { kind, .. } | ExprKind::Unbox { kind, .. }) => Some(*kind),
        NodeKind::Expr(
            ExprKind::Float64Negate(_) | ExprKind::Float64Arithmetic { .. } | ExprKind::Int64ToFloat64(_),
        ) => Some(NumericKind::Float64),
        NodeKind::Expr(
            ExprKind::Int64Negate(_) | ExprKind::Int64Arithmetic { .. } | ExprKind::Float64ToInt64(_),
        ) => Some(NumericKind::Int64),
        NodeKind::Expr(ExprKind::LoopIvInt64 { .. }) => Some(NumericKind::Int64),
        NodeKind::Expr(ExprKind::LoopIvFloat64 { .. }) => Some(NumericKind::Float64),
        _ => None,
    })
}

/// A linear induction variable has exactly two incoming values: a `start`
/// and a step expression that is an `Arithmetic`-family `Binary` node with
/// the phi itself as one of its two operands (the other operand is the
/// `step`). Mirrors `GetLinearLoopIVComponent`.
fn linear_step(graph: &Graph, phi: NodeId, incr: NodeId) -> HirResult<Option<NodeId>> {
    Ok(match graph.get(incr)? {
        NodeKind::Expr(ExprKind::Binary {
            op: BinaryOp::Arith(_),
            lhs,
            rhs,
        }) => {
            if *lhs == phi {
                Some(*rhs)
            } else if *rhs == phi {
                Some(*lhs)
            } else {
                None
            }
        }
        _ => None,
    })
}

/// Recognizes `phi` as a linear induction variable and, if both `start`
/// and `step` carry a known numeric type, installs a typed
/// `LoopIvInt64`/`LoopIvFloat64` node in its place (mirrors `TypeLoopIV`).
/// Returns the new node's id and its numeric kind so the caller can drive
/// propagation through its users.
fn install_loop_iv(graph: &mut Graph, phi: NodeId) -> HirResult<Option<(NodeId, NumericKind)>> {
    let (region, operands) = match graph.get(phi)? {
        NodeKind::Expr(ExprKind::Phi { region, operands }) => (*region, operands.clone()),
        _ => return Ok(None),
    };
    if operands.len() != 2 {
        return Ok(None);
    }
    let start = operands[0];
    let incr = operands[1];
    let Some(step) = linear_step(graph, phi, incr)? else {
        return Ok(None);
    };
    let (Some(start_kind), Some(step_kind)) = (numeric_kind_of(graph, start)?, numeric_kind_of(graph, step)?)
    else {
        return Ok(None);
    };
    let kind = match (start_kind, step_kind) {
        (NumericKind::Int64, NumericKind::Int64) => NumericKind::Int64,
        _ => NumericKind::Float64,
    };
    let start = coerce(graph, start, kind, Ok(Some(start_kind)));
    let step = coerce(graph, step, kind, Ok(Some(step_kind)));
    let new_iv = graph.new_expr(match kind {
        NumericKind::Int64 => ExprKind::LoopIvInt64 { region, start, step },
        NumericKind::Float64 => ExprKind::LoopIvFloat64 { region, start, step },
    });
    graph.replace(phi, new_iv)?;
    Ok(Some((new_iv, kind)))
}

/// Walks every user of `iv`, specializing the ones that fold to an
/// unboxed `kind`-typed operation or that can be rewritten into one, and
/// enqueues their own users so a type propagates transitively through a
/// chain of arithmetic built on the induction variable. Mirrors
/// `TypeLoopIV`'s `Enqueue`/`RunLoop` worklist.
fn propagate(graph: &mut Graph, iv: NodeId, kind: NumericKind) -> HirResult<usize> {
    let mut specialized = 0usize;
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = graph.references(iv).iter().map(|r| r.user).collect();

    while let Some(user) = queue.pop_front() {
        if !visited.insert(user) {
            continue;
        }
        let Some(new_kind) = specialize_user(graph, user, kind)? else {
            continue;
        };
        specialized += 1;
        let new_id = graph.new_expr(new_kind);
        graph.replace(user, new_id)?;
        for r in graph.references(new_id).to_vec() {
            queue.push_back(r.user);
        }
    }
    Ok(specialized)
}

fn specialize_user(graph: &mut Graph, user: NodeId, kind: NumericKind) -> HirResult<Option<ExprKind>> {
    let node = match graph.get(user)? {
        NodeKind::Expr(e) => e.clone(),
        _ => return Ok(None),
    };
    match node {
        ExprKind::Unary { op, operand } => {
            let data = FolderData::Unary { op, operand };
            if ArithFolder.can_fold(graph, &data) {
                if let Some(folded) = ArithFolder.fold(graph, &data) {
                    return Ok(Some(folded));
                }
            }
            Ok(specialize_unary(graph, op, operand, kind))
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let data = FolderData::Binary { op, lhs, rhs };
            if ArithFolder.can_fold(graph, &data) {
                if let Some(folded) = ArithFolder.fold(graph, &data) {
                    return Ok(Some(folded));
                }
            }
            Ok(specialize_binary(graph, op, lhs, rhs, kind))
        }
        _ => Ok(None),
    }
}

fn coerce(graph: &mut Graph, id: NodeId, want: NumericKind, have: HirResult<Option<NumericKind>>) -> NodeId {
    match have {
        Ok(Some(k)) if k == want => id,
        Ok(Some(NumericKind::Int64)) if want == NumericKind::Float64 => graph.new_expr(ExprKind::Int64ToFloat64(id)),
        Ok(Some(NumericKind::Float64)) if want == NumericKind::Int64 => graph.new_expr(ExprKind::Float64ToInt64(id)),
        _ => id,
    }
}

fn specialize_unary(graph: &mut Graph, op: crate::ops::UnaryOp, operand: NodeId, kind: NumericKind) -> Option<ExprKind> {
    if op != crate::ops::UnaryOp::Minus {
        return None;
    }
    let have = numeric_kind_of(graph, operand);
    let operand = coerce(graph, operand, kind, have);
    Some(match kind {
        NumericKind::Int64 => ExprKind::Int64Negate(operand),
        NumericKind::Float64 => ExprKind::Float64Negate(operand),
    })
}

fn specialize_binary(graph: &mut Graph, op: BinaryOp, lhs: NodeId, rhs: NodeId, kind: NumericKind) -> Option<ExprKind> {
    let lhs_have = numeric_kind_of(graph, lhs);
    let rhs_have = numeric_kind_of(graph, rhs);
    let lhs = coerce(graph, lhs, kind, lhs_have);
    let rhs = coerce(graph, rhs, kind, rhs_have);
    match op {
        BinaryOp::Arith(op) => Some(match kind {
            NumericKind::Int64 => ExprKind::Int64Arithmetic { op, lhs, rhs },
            NumericKind::Float64 => ExprKind::Float64Arithmetic { op, lhs, rhs },
        }),
        BinaryOp::Cmp(op) => Some(match kind {
            NumericKind::Int64 => ExprKind::Int64Compare { op, lhs, rhs },
            NumericKind::Float64 => ExprKind::Float64Compare { op, lhs, rhs },
        }),
        _ => None,
    }
}
