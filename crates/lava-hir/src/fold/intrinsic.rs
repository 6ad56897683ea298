//! Intrinsic folder (§4.6): constant-folds calls to the built-in numeric,
//! bitwise, coercion, and list-mutation intrinsics.

use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::{ExprKind, NodeKind, OperandVec};
use crate::ops::{BitwiseOp, Intrinsic};

use super::folder::{Folder, FolderData};

pub struct IntrinsicFolder;

impl Folder for IntrinsicFolder {
    fn can_fold(&self, _graph: &Graph, data: &FolderData) -> bool {
        matches!(data, FolderData::Expr { .. })
    }

    fn fold(&self, graph: &mut Graph, data: &FolderData) -> Option<ExprKind> {
        let FolderData::Expr { node } = data else { return None };
        let (intrinsic, args) = match graph.get(*node).ok()? {
            NodeKind::Expr(ExprKind::ICall { intrinsic, args, .. }) => (*intrinsic, args.clone()),
            _ => return None,
        };
        fold_intrinsic(graph, intrinsic, &args)
    }
}

fn arg_f64(graph: &Graph, args: &OperandVec, index: usize) -> Option<f64> {
    match graph.get(*args.get(index)?).ok()? {
        NodeKind::Expr(ExprKind::Float64(v)) => Some(*v),
        _ => None,
    }
}

fn fold_intrinsic(graph: &mut Graph, intrinsic: Intrinsic, args: &OperandVec) -> Option<ExprKind> {
    match intrinsic {
        Intrinsic::Min => {
            let (a, b) = (arg_f64(graph, args, 0)?, arg_f64(graph, args, 1)?);
            Some(ExprKind::Float64(a.min(b)))
        }
        Intrinsic::Max => {
            let (a, b) = (arg_f64(graph, args, 0)?, arg_f64(graph, args, 1)?);
            Some(ExprKind::Float64(a.max(b)))
        }
        Intrinsic::Sqrt => Some(ExprKind::Float64(arg_f64(graph, args, 0)?.sqrt())),
        Intrinsic::Sin => Some(ExprKind::Float64(arg_f64(graph, args, 0)?.sin())),
        Intrinsic::Cos => Some(ExprKind::Float64(arg_f64(graph, args, 0)?.cos())),
        Intrinsic::Tan => Some(ExprKind::Float64(arg_f64(graph, args, 0)?.tan())),
        Intrinsic::Abs => Some(ExprKind::Float64(arg_f64(graph, args, 0)?.abs())),
        Intrinsic::Ceil => Some(ExprKind::Float64(arg_f64(graph, args, 0)?.ceil())),
        Intrinsic::Floor => Some(ExprKind::Float64(arg_f64(graph, args, 0)?.floor())),
        Intrinsic::ToInt => {
            let v = arg_f64(graph, args, 0)?;
            Some(ExprKind::Float64((v as i64) as f64))
        }
        Intrinsic::ToReal => Some(ExprKind::Float64(arg_f64(graph, args, 0)?)),
        Intrinsic::ToString => {
            let v = arg_f64(graph, args, 0)?;
            Some(ExprKind::SString(format!("{}", v)))
        }
        Intrinsic::Push => {
            let list_id = *args.first()?;
            let value = *args.get(1)?;
            match graph.get(list_id).ok()? {
                NodeKind::Expr(ExprKind::IrList(elems)) => {
                    let mut new_elems = elems.clone();
                    new_elems.push(value);
                    Some(ExprKind::IrList(new_elems))
                }
                _ => None,
            }
        }
        Intrinsic::Pop => match graph.get(*args.first()?).ok()? {
            NodeKind::Expr(ExprKind::IrList(elems)) if !elems.is_empty() => {
                let mut new_elems = elems.clone();
                new_elems.pop();
                Some(ExprKind::IrList(new_elems))
            }
            _ => None,
        },
        Intrinsic::Type => None, // handled structurally by the arithmetic folder's TestType pattern
        Intrinsic::Bitwise(bitwise) => fold_bitwise(graph, bitwise, args),
    }
}

fn fold_bitwise(graph: &Graph, op: BitwiseOp, args: &OperandVec) -> Option<ExprKind> {
    let a = arg_f64(graph, args, 0)? as i64 as i32;
    match op {
        BitwiseOp::Shl | BitwiseOp::Shr | BitwiseOp::RotL | BitwiseOp::RotR => {
            let shift = (arg_f64(graph, args, 1)? as i64 as u32) & 0x1f;
            let result = match op {
                BitwiseOp::Shl => a.wrapping_shl(shift),
                BitwiseOp::Shr => ((a as u32) >> shift) as i32,
                BitwiseOp::RotL => (a as u32).rotate_left(shift) as i32,
                BitwiseOp::RotR => (a as u32).rotate_right(shift) as i32,
                _ => unreachable!(),
            };
            Some(ExprKind::Float64(result as f64))
        }
        BitwiseOp::And => Some(ExprKind::Float64((a & (arg_f64(graph, args, 1)? as i64 as i32)) as f64)),
        BitwiseOp::Or => Some(ExprKind::Float64((a | (arg_f64(graph, args, 1)? as i64 as i32)) as f64)),
        BitwiseOp::Xor => Some(ExprKind::Float64((a ^ (arg_f64(graph, args, 1)? as i64 as i32)) as f64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_call(graph: &mut Graph, intrinsic: Intrinsic, args: Vec<NodeId>) -> NodeId {
        let effect = graph.new_node(NodeKind::Effect(crate::node::EffectKind::EmptyBarrier));
        let mut v = OperandVec::new();
        v.extend(args);
        graph.new_node(NodeKind::Expr(ExprKind::ICall { intrinsic, args: v, effect }))
    }

    #[test]
    fn sqrt_constant_folds() {
        let mut g = Graph::new();
        let x = g.new_expr(ExprKind::Float64(9.0));
        let call = mk_call(&mut g, Intrinsic::Sqrt, vec![x]);
        let folded = IntrinsicFolder.fold(&mut g, &FolderData::Expr { node: call });
        assert!(matches!(folded, Some(ExprKind::Float64(v)) if (v - 3.0).abs() < 1e-9));
    }

    #[test]
    fn push_clones_and_extends_list() {
        let mut g = Graph::new();
        let list = g.new_node(NodeKind::Expr(ExprKind::IrList(Default::default())));
        let v = g.new_expr(ExprKind::Float64(1.0));
        let call = mk_call(&mut g, Intrinsic::Push, vec![list, v]);
        let folded = IntrinsicFolder.fold(&mut g, &FolderData::Expr { node: call });
        match folded {
            Some(ExprKind::IrList(elems)) => assert_eq!(elems.as_slice(), &[v]),
            _ => panic!("expected IrList"),
        }
    }

    #[test]
    fn shift_left_wraps_32_bits() {
        let mut g = Graph::new();
        let a = g.new_expr(ExprKind::Float64(1.0));
        let shift = g.new_expr(ExprKind::Float64(4.0));
        let call = mk_call(&mut g, Intrinsic::Bitwise(BitwiseOp::Shl), vec![a, shift]);
        let folded = IntrinsicFolder.fold(&mut g, &FolderData::Expr { node: call });
        assert!(matches!(folded, Some(ExprKind::Float64(v)) if v == 16.0));
    }
}
