//! Arithmetic/logic folder (§4.6): constant folding and algebraic
//! simplification over `Unary`, `Binary`, and `Ternary` nodes.
//!
//! The source drives several of these rules off a static type-inference
//! pass that has no counterpart in this core (out of scope); rules that
//! depended on it are narrowed here to the cases decidable from node shape
//! alone (literal operands, `Unary`/`Binary` structure) -- see DESIGN.md
//! for the specific narrowings.

use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::{ExprKind, NodeKind};
use crate::ops::{ArithOp, BinaryOp, CmpOp, LogicOp, UnaryOp};
use crate::types::{NumericKind, TypeKind};

use super::folder::{Folder, FolderData};

pub struct ArithFolder;

impl Folder for ArithFolder {
    fn can_fold(&self, _graph: &Graph, data: &FolderData) -> bool {
        matches!(
            data,
            FolderData::Unary { .. } | FolderData::Binary { .. } | FolderData::Ternary { .. }
        )
    }

    fn fold(&self, graph: &mut Graph, data: &FolderData) -> Option<ExprKind> {
        match data {
            FolderData::Unary { op, operand } => fold_unary(graph, *op, *operand),
            FolderData::Binary { op, lhs, rhs } => fold_binary(graph, *op, *lhs, *rhs),
            FolderData::Ternary { cond, lhs, rhs } => fold_ternary(graph, *cond, *lhs, *rhs),
            _ => None,
        }
    }
}

fn as_float(graph: &Graph, id: NodeId) -> Option<f64> {
    match graph.get(id).ok()? {
        NodeKind::Expr(ExprKind::Float64(v)) => Some(*v),
        _ => None,
    }
}

fn as_bool(graph: &Graph, id: NodeId) -> Option<bool> {
    match graph.get(id).ok()? {
        NodeKind::Expr(ExprKind::Boolean(v)) => Some(*v),
        _ => None,
    }
}

fn is_nil(graph: &Graph, id: NodeId) -> bool {
    matches!(graph.get(id), Ok(NodeKind::Expr(ExprKind::Nil)))
}

fn as_string(graph: &Graph, id: NodeId) -> Option<String> {
    match graph.get(id).ok()? {
        NodeKind::Expr(ExprKind::LongString(s)) | NodeKind::Expr(ExprKind::SString(s)) => {
            Some(s.clone())
        }
        _ => None,
    }
}

fn is_truthy_literal_container(graph: &Graph, id: NodeId) -> bool {
    matches!(
        graph.get(id),
        Ok(NodeKind::Expr(ExprKind::Float64(_)))
            | Ok(NodeKind::Expr(ExprKind::LongString(_)))
            | Ok(NodeKind::Expr(ExprKind::SString(_)))
            | Ok(NodeKind::Expr(ExprKind::IrList(_)))
            | Ok(NodeKind::Expr(ExprKind::IrObject(_)))
    )
}

/// Shape-provable float64: a literal, or a `Box`/`Unbox` tagged
/// `NumericKind::Float64`. A bare `Unary(Minus, _)` does not qualify -- its
/// operand's type is unknown without the source's type-inference pass.
fn is_float64_shaped(graph: &Graph, id: NodeId) -> bool {
    match graph.get(id) {
        Ok(NodeKind::Expr(ExprKind::Float64(_))) => true,
        Ok(NodeKind::Expr(ExprKind::Box { kind, .. } | ExprKind::Unbox { kind, .. })) => {
            *kind == NumericKind::Float64
        }
        _ => false,
    }
}

fn unary_minus_operand(graph: &Graph, id: NodeId) -> Option<NodeId> {
    match graph.get(id).ok()? {
        NodeKind::Expr(ExprKind::Unary { op: UnaryOp::Minus, operand }) => Some(*operand),
        _ => None,
    }
}

fn unary_not_operand(graph: &Graph, id: NodeId) -> Option<NodeId> {
    match graph.get(id).ok()? {
        NodeKind::Expr(ExprKind::Unary { op: UnaryOp::Not, operand }) => Some(*operand),
        _ => None,
    }
}

fn fold_unary(graph: &mut Graph, op: UnaryOp, operand: NodeId) -> Option<ExprKind> {
    match op {
        UnaryOp::Minus => {
            if let Some(v) = as_float(graph, operand) {
                return Some(ExprKind::Float64(-v));
            }
            // `- - x => x`, `- - - x => - x`: strip the chain two levels at a
            // time, tracking parity.
            let mut cur = operand;
            let mut depth = 0u32;
            while let Some(inner) = unary_minus_operand(graph, cur) {
                cur = inner;
                depth += 1;
            }
            // `operand` itself already carries one implicit minus (we are
            // folding `-(operand)`), so the net minus count is `depth + 1`:
            // depth odd => net even => the minuses cancel; depth even =>
            // net odd => one minus remains.
            if depth == 0 {
                None
            } else if depth % 2 == 1 {
                Some(ExprKind::Alias(cur))
            } else {
                Some(ExprKind::Unary { op: UnaryOp::Minus, operand: cur })
            }
        }
        UnaryOp::Not => {
            if let Some(b) = as_bool(graph, operand) {
                return Some(ExprKind::Boolean(!b));
            }
            if is_nil(graph, operand) {
                return Some(ExprKind::Boolean(true));
            }
            if is_truthy_literal_container(graph, operand) {
                return Some(ExprKind::Boolean(false));
            }
            None
        }
    }
}

fn unbox_f64(graph: &mut Graph, id: NodeId) -> NodeId {
    graph.new_expr(ExprKind::Unbox { kind: NumericKind::Float64, operand: id })
}

fn box_f64(expr: ExprKind) -> ExprKind {
    // Callers build the unboxed arithmetic node first via `graph.new_expr`
    // and then wrap the resulting id in `Box`; see call sites.
    expr
}

fn fold_binary(graph: &mut Graph, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Option<ExprKind> {
    if let (Some(l), Some(r)) = (as_float(graph, lhs), as_float(graph, rhs)) {
        return fold_float_binary(op, l, r);
    }
    if let (Some(l), Some(r)) = (as_string(graph, lhs), as_string(graph, rhs)) {
        return fold_string_binary(op, &l, &r);
    }
    if is_nil(graph, lhs) || is_nil(graph, rhs) {
        return match op {
            BinaryOp::Cmp(CmpOp::Eq) => {
                Some(ExprKind::Boolean(is_nil(graph, lhs) && is_nil(graph, rhs)))
            }
            BinaryOp::Cmp(CmpOp::Ne) => {
                Some(ExprKind::Boolean(is_nil(graph, lhs) != is_nil(graph, rhs)))
            }
            _ => None,
        };
    }

    // The source only calls `Float64Reassociate` when both operand types are
    // statically known to be float64 (fold-arith.cc's `SimplifyBinary`).
    // Without a type-inference oracle this core can only prove that shape --
    // a literal or a `Box`/`Unbox` tagged float64 -- so the reassociation
    // rules are gated the same way rather than firing on bare structural
    // shape (e.g. `Unary(Minus, _)`) alone.
    if is_float64_shaped(graph, lhs) && is_float64_shaped(graph, rhs) {
        if let Some(reassoc) = float_reassociate(graph, op, lhs, rhs) {
            return Some(reassoc);
        }
    }
    if let BinaryOp::Logic(logic) = op {
        return fold_logic(graph, logic, lhs, rhs);
    }
    if matches!(op, BinaryOp::Cmp(CmpOp::Eq) | BinaryOp::Cmp(CmpOp::Ne)) {
        if let Some(r) = fold_boolean_compare(graph, lhs, rhs) {
            return Some(r);
        }
        if let Some(r) = fold_test_type_pattern(graph, lhs, rhs) {
            return Some(r);
        }
    }
    None
}

fn fold_float_binary(op: BinaryOp, l: f64, r: f64) -> Option<ExprKind> {
    match op {
        BinaryOp::Arith(ArithOp::Add) => Some(ExprKind::Float64(l + r)),
        BinaryOp::Arith(ArithOp::Sub) => Some(ExprKind::Float64(l - r)),
        BinaryOp::Arith(ArithOp::Mul) => Some(ExprKind::Float64(l * r)),
        BinaryOp::Arith(ArithOp::Div) => Some(ExprKind::Float64(l / r)),
        BinaryOp::Arith(ArithOp::Mod) => {
            let li = l as i64;
            let ri = r as i64;
            if ri == 0 {
                None
            } else {
                Some(ExprKind::Float64((li % ri) as f64))
            }
        }
        BinaryOp::Cmp(CmpOp::Lt) => Some(ExprKind::Boolean(l < r)),
        BinaryOp::Cmp(CmpOp::Le) => Some(ExprKind::Boolean(l <= r)),
        BinaryOp::Cmp(CmpOp::Gt) => Some(ExprKind::Boolean(l > r)),
        BinaryOp::Cmp(CmpOp::Ge) => Some(ExprKind::Boolean(l >= r)),
        BinaryOp::Cmp(CmpOp::Eq) => Some(ExprKind::Boolean(l == r)),
        BinaryOp::Cmp(CmpOp::Ne) => Some(ExprKind::Boolean(l != r)),
        BinaryOp::Logic(LogicOp::And) => Some(ExprKind::Float64(r)),
        BinaryOp::Logic(LogicOp::Or) => Some(ExprKind::Float64(l)),
        BinaryOp::Concat => None,
    }
}

fn fold_string_binary(op: BinaryOp, l: &str, r: &str) -> Option<ExprKind> {
    match op {
        BinaryOp::Cmp(CmpOp::Lt) => Some(ExprKind::Boolean(l < r)),
        BinaryOp::Cmp(CmpOp::Le) => Some(ExprKind::Boolean(l <= r)),
        BinaryOp::Cmp(CmpOp::Gt) => Some(ExprKind::Boolean(l > r)),
        BinaryOp::Cmp(CmpOp::Ge) => Some(ExprKind::Boolean(l >= r)),
        BinaryOp::Cmp(CmpOp::Eq) => Some(ExprKind::Boolean(l == r)),
        BinaryOp::Cmp(CmpOp::Ne) => Some(ExprKind::Boolean(l != r)),
        _ => None,
    }
}

fn float_reassociate(graph: &mut Graph, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Option<ExprKind> {
    let lhs_neg = unary_minus_operand(graph, lhs);
    let rhs_neg = unary_minus_operand(graph, rhs);

    if let (Some(a), BinaryOp::Arith(ArithOp::Add)) = (lhs_neg, op) {
        // (-a) + b => b - a
        let l = unbox_f64(graph, rhs);
        let r = unbox_f64(graph, a);
        let arith = graph.new_expr(ExprKind::Float64Arithmetic { op: ArithOp::Sub, lhs: l, rhs: r });
        return Some(box_f64(ExprKind::Box { kind: NumericKind::Float64, operand: arith }));
    }
    if let (Some(b), BinaryOp::Arith(ArithOp::Add)) = (rhs_neg, op) {
        // a + (-b) => a - b
        let l = unbox_f64(graph, lhs);
        let r = unbox_f64(graph, b);
        let arith = graph.new_expr(ExprKind::Float64Arithmetic { op: ArithOp::Sub, lhs: l, rhs: r });
        return Some(box_f64(ExprKind::Box { kind: NumericKind::Float64, operand: arith }));
    }
    if let (Some(a), BinaryOp::Arith(ArithOp::Sub)) = (lhs_neg, op) {
        // (-a) - b => (-b) - a
        let neg_rhs = unbox_f64(graph, rhs);
        let new_lhs = graph.new_expr(ExprKind::Float64Negate(neg_rhs));
        let r = unbox_f64(graph, a);
        let arith = graph.new_expr(ExprKind::Float64Arithmetic { op: ArithOp::Sub, lhs: new_lhs, rhs: r });
        return Some(box_f64(ExprKind::Box { kind: NumericKind::Float64, operand: arith }));
    }
    if let (Some(b), BinaryOp::Arith(ArithOp::Sub)) = (rhs_neg, op) {
        // a - (-b) => a + b
        let l = unbox_f64(graph, lhs);
        let r = unbox_f64(graph, b);
        let arith = graph.new_expr(ExprKind::Float64Arithmetic { op: ArithOp::Add, lhs: l, rhs: r });
        return Some(box_f64(ExprKind::Box { kind: NumericKind::Float64, operand: arith }));
    }
    if op == BinaryOp::Arith(ArithOp::Div) {
        if let Some(1.0) = as_float(graph, rhs) {
            return Some(ExprKind::Alias(lhs)); // a / 1 => a
        }
        if let Some(v) = as_float(graph, rhs) {
            if v == -1.0 {
                let l = unbox_f64(graph, lhs);
                let neg = graph.new_expr(ExprKind::Float64Negate(l));
                return Some(box_f64(ExprKind::Box { kind: NumericKind::Float64, operand: neg }));
            }
        }
    }
    if let (Some(a), Some(b), BinaryOp::Arith(ArithOp::Mul)) = (lhs_neg, rhs_neg, op) {
        // (-a) * (-b) => a * b
        let l = unbox_f64(graph, a);
        let r = unbox_f64(graph, b);
        let arith = graph.new_expr(ExprKind::Float64Arithmetic { op: ArithOp::Mul, lhs: l, rhs: r });
        return Some(box_f64(ExprKind::Box { kind: NumericKind::Float64, operand: arith }));
    }
    if op == BinaryOp::Arith(ArithOp::Sub) && lhs == rhs {
        return Some(ExprKind::Float64(0.0)); // a - a => 0
    }
    None
}

fn fold_logic(graph: &mut Graph, logic: LogicOp, lhs: NodeId, rhs: NodeId) -> Option<ExprKind> {
    match logic {
        LogicOp::And => {
            if let Some(false) = as_bool(graph, lhs) {
                return Some(ExprKind::Boolean(false));
            }
            if let Some(true) = as_bool(graph, lhs) {
                return Some(ExprKind::Alias(rhs));
            }
            if lhs == rhs {
                return Some(ExprKind::Alias(lhs));
            }
            if unary_not_operand(graph, lhs) == Some(rhs) || unary_not_operand(graph, rhs) == Some(lhs) {
                return Some(ExprKind::Boolean(false));
            }
            None
        }
        LogicOp::Or => {
            if let Some(true) = as_bool(graph, lhs) {
                return Some(ExprKind::Boolean(true));
            }
            if let Some(false) = as_bool(graph, lhs) {
                return Some(ExprKind::Alias(rhs));
            }
            if lhs == rhs {
                return Some(ExprKind::Alias(lhs));
            }
            if unary_not_operand(graph, lhs) == Some(rhs) || unary_not_operand(graph, rhs) == Some(lhs) {
                return Some(ExprKind::Boolean(true));
            }
            None
        }
    }
}

fn fold_boolean_compare(graph: &Graph, lhs: NodeId, rhs: NodeId) -> Option<ExprKind> {
    if let Some(b) = as_bool(graph, rhs) {
        return Some(if b {
            ExprKind::Alias(lhs)
        } else {
            ExprKind::Unary { op: UnaryOp::Not, operand: lhs }
        });
    }
    if let Some(b) = as_bool(graph, lhs) {
        return Some(if b {
            ExprKind::Alias(rhs)
        } else {
            ExprKind::Unary { op: UnaryOp::Not, operand: rhs }
        });
    }
    None
}

fn fold_test_type_pattern(graph: &Graph, lhs: NodeId, rhs: NodeId) -> Option<ExprKind> {
    let (icall_args, name) = match (graph.get(lhs).ok()?, graph.get(rhs).ok()?) {
        (NodeKind::Expr(ExprKind::ICall { intrinsic: crate::ops::Intrinsic::Type, args, .. }), _) => {
            (args.clone(), as_string(graph, rhs)?)
        }
        (_, NodeKind::Expr(ExprKind::ICall { intrinsic: crate::ops::Intrinsic::Type, args, .. })) => {
            (args.clone(), as_string(graph, lhs)?)
        }
        _ => return None,
    };
    let operand = *icall_args.first()?;
    let kind = match name.as_str() {
        "real" => TypeKind::Real,
        "boolean" => TypeKind::Boolean,
        "null" => TypeKind::Null,
        "list" => TypeKind::List,
        "object" => TypeKind::Object,
        "closure" => TypeKind::Closure,
        "iterator" => TypeKind::Iterator,
        "extension" => TypeKind::Extension,
        _ => return None,
    };
    Some(ExprKind::TestType { kind, operand })
}

pub(crate) fn fold_ternary(graph: &mut Graph, cond: NodeId, lhs: NodeId, rhs: NodeId) -> Option<ExprKind> {
    if is_truthy_literal_container(graph, cond) {
        return Some(ExprKind::Alias(lhs));
    }
    if is_nil(graph, cond) {
        return Some(ExprKind::Alias(rhs));
    }
    if let Some(b) = as_bool(graph, cond) {
        return Some(ExprKind::Alias(if b { lhs } else { rhs }));
    }
    if lhs == rhs {
        return Some(ExprKind::Alias(lhs));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_add_constant_folds() {
        let mut g = Graph::new();
        let a = g.new_expr(ExprKind::Float64(1.5));
        let b = g.new_expr(ExprKind::Float64(2.5));
        let r = fold_binary(&mut g, BinaryOp::Arith(ArithOp::Add), a, b);
        assert!(matches!(r, Some(ExprKind::Float64(v)) if v == 4.0));
    }

    #[test]
    fn mod_by_zero_does_not_fold() {
        let mut g = Graph::new();
        let a = g.new_expr(ExprKind::Float64(1.0));
        let z = g.new_expr(ExprKind::Float64(0.0));
        assert!(fold_binary(&mut g, BinaryOp::Arith(ArithOp::Mod), a, z).is_none());
    }

    #[test]
    fn double_negate_collapses_to_operand() {
        // --x => x
        let mut g = Graph::new();
        let x = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let neg1 = g.new_node(NodeKind::Expr(ExprKind::Unary { op: UnaryOp::Minus, operand: x }));
        let r = fold_unary(&mut g, UnaryOp::Minus, neg1);
        assert!(matches!(r, Some(ExprKind::Alias(id)) if id == x));
    }

    #[test]
    fn triple_negate_collapses_to_single_negate() {
        // ---x => -x
        let mut g = Graph::new();
        let x = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let n1 = g.new_node(NodeKind::Expr(ExprKind::Unary { op: UnaryOp::Minus, operand: x }));
        let n2 = g.new_node(NodeKind::Expr(ExprKind::Unary { op: UnaryOp::Minus, operand: n1 }));
        let r = fold_unary(&mut g, UnaryOp::Minus, n2);
        assert!(matches!(r, Some(ExprKind::Unary { op: UnaryOp::Minus, operand }) if operand == x));
    }

    #[test]
    fn not_of_string_literal_is_false() {
        let mut g = Graph::new();
        let s = g.new_expr(ExprKind::SString("x".into()));
        let r = fold_unary(&mut g, UnaryOp::Not, s);
        assert!(matches!(r, Some(ExprKind::Boolean(false))));
    }

    #[test]
    fn a_sub_a_is_zero_when_float64_shaped() {
        let mut g = Graph::new();
        let arg = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let unboxed = g.new_node(NodeKind::Expr(ExprKind::Unbox { kind: NumericKind::Float64, operand: arg }));
        let r = fold_binary(&mut g, BinaryOp::Arith(ArithOp::Sub), unboxed, unboxed);
        assert!(matches!(r, Some(ExprKind::Float64(v)) if v == 0.0));
    }

    #[test]
    fn a_sub_a_does_not_fold_without_float64_shape() {
        // `a` could be a string/object at runtime; without a type oracle
        // this core must not assume `a - a => 0`.
        let mut g = Graph::new();
        let obj = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let r = fold_binary(&mut g, BinaryOp::Arith(ArithOp::Sub), obj, obj);
        assert!(r.is_none());
    }

    #[test]
    fn ternary_constant_cond_selects_branch() {
        let mut g = Graph::new();
        let cond = g.new_expr(ExprKind::Boolean(true));
        let lhs = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let rhs = g.new_node(NodeKind::Expr(ExprKind::Arg(1)));
        let r = fold_ternary(&mut g, cond, lhs, rhs);
        assert!(matches!(r, Some(ExprKind::Alias(id)) if id == lhs));
    }

    #[test]
    fn test_type_pattern_recognized() {
        let mut g = Graph::new();
        let x = g.new_node(NodeKind::Expr(ExprKind::Arg(0)));
        let effect = g.new_node(NodeKind::Effect(crate::node::EffectKind::EmptyBarrier));
        let mut args = crate::node::OperandVec::new();
        args.push(x);
        let icall = g.new_node(NodeKind::Expr(ExprKind::ICall {
            intrinsic: crate::ops::Intrinsic::Type,
            args,
            effect,
        }));
        let name = g.new_expr(ExprKind::SString("list".into()));
        let r = fold_binary(&mut g, BinaryOp::Cmp(CmpOp::Eq), icall, name);
        assert!(matches!(r, Some(ExprKind::TestType { kind: TypeKind::List, operand }) if operand == x));
    }
}
