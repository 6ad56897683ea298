//! The closed node-kind taxonomy (§3.1).
//!
//! A single tagged union ([`NodeKind`]) replaces the original's deep
//! inheritance hierarchy with virtual dispatch (§9): three disjoint
//! families -- [`ExprKind`], [`ControlFlowKind`], [`EffectKind`] -- each a
//! flat sum type with per-variant payload. Kind-specific accessors are
//! pattern-matched extractors rather than downcasts.
//!
//! Every operand, reference, and effect edge is a [`NodeId`]; nodes never
//! hold owning pointers to one another (§9).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::NodeId;
use crate::ops::{BinaryOp, Intrinsic, UnaryOp};
use crate::types::{ConstValue, NumericKind, TypeKind};

/// Inline small-vector used for variable-arity operand lists (phis, calls,
/// list/object literals). Four is enough to keep the common phi/call shapes
/// off the heap without bloating every node.
pub type OperandVec = SmallVec<[NodeId; 4]>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    Expr(ExprKind),
    ControlFlow(ControlFlowKind),
    Effect(EffectKind),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    // -- Constants --
    Float64(f64),
    LongString(String),
    SString(String),
    Boolean(bool),
    Nil,

    // -- Composites --
    IrList(OperandVec),
    IrObject(Vec<(NodeId, NodeId)>),
    ClosureLoad { function_index: u32 },

    // -- Polymorphic arithmetic/logic --
    Unary { op: UnaryOp, operand: NodeId },
    Binary { op: BinaryOp, lhs: NodeId, rhs: NodeId },
    Ternary { cond: NodeId, lhs: NodeId, rhs: NodeId },

    // -- Typed specializations --
    Float64Negate(NodeId),
    Float64Arithmetic { op: crate::ops::ArithOp, lhs: NodeId, rhs: NodeId },
    Float64Compare { op: crate::ops::CmpOp, lhs: NodeId, rhs: NodeId },
    StringCompare { op: crate::ops::CmpOp, lhs: NodeId, rhs: NodeId },
    SStringEq(NodeId, NodeId),
    SStringNe(NodeId, NodeId),
    Int64Negate(NodeId),
    Int64Arithmetic { op: crate::ops::ArithOp, lhs: NodeId, rhs: NodeId },
    Int64Compare { op: crate::ops::CmpOp, lhs: NodeId, rhs: NodeId },
    Int64ToFloat64(NodeId),
    Float64ToInt64(NodeId),

    // -- Memory operations --
    PropGet { object: NodeId, key: NodeId, effect: NodeId },
    PropSet { object: NodeId, key: NodeId, value: NodeId, effect: NodeId },
    IndexGet { object: NodeId, index: NodeId, effect: NodeId },
    IndexSet { object: NodeId, index: NodeId, value: NodeId, effect: NodeId },
    /// Produces a `StaticRef` to an object slot, numbered by the memory folder.
    ObjectFind { object: NodeId, key: NodeId, effect: NodeId },
    /// Produces a `StaticRef` to a list slot, numbered by the memory folder.
    ListIndex { object: NodeId, index: NodeId, effect: NodeId },
    ObjectRefGet { reference: NodeId, effect: NodeId },
    ObjectRefSet { reference: NodeId, value: NodeId, effect: NodeId },
    ListRefGet { reference: NodeId, effect: NodeId },
    ListRefSet { reference: NodeId, value: NodeId, effect: NodeId },
    ExtensionGet { object: NodeId, key: NodeId, effect: NodeId },
    ExtensionSet { object: NodeId, key: NodeId, value: NodeId, effect: NodeId },

    // -- Iterators --
    IteratorNew(NodeId),
    IteratorNext { iterator: NodeId, effect: NodeId },
    IteratorTest(NodeId),
    IteratorDeref(NodeId),

    // -- Calls --
    Call { callee: NodeId, args: OperandVec, effect: NodeId },
    ICall { intrinsic: Intrinsic, args: OperandVec, effect: NodeId },

    // -- Guards and predicates --
    TestType { kind: TypeKind, operand: NodeId },
    ListOobTest { object: NodeId, index: NodeId },
    TypeGuard { kind: TypeKind, operand: NodeId },

    // -- Box / Unbox --
    Box { kind: NumericKind, operand: NodeId },
    Unbox { kind: NumericKind, operand: NodeId },

    // -- Control-dependent --
    Phi { region: NodeId, operands: OperandVec },
    Projection { index: u32, operand: NodeId },
    Alias(NodeId),
    Checkpoint(OperandVec),
    StackSlot(u32),

    // -- Upvalue / argument --
    UGet(u32),
    USet { index: u32, value: NodeId },
    Arg(u32),
    OsrLoad(u32),

    // -- Loop-induction typed phis (installed by the loop-induction pass) --
    LoopIvInt64 { region: NodeId, start: NodeId, step: NodeId },
    LoopIvFloat64 { region: NodeId, start: NodeId, step: NodeId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlFlowKind {
    Start,
    End,
    Region(OperandVec),
    If { cond: NodeId, region: NodeId },
    IfTrue(NodeId),
    IfFalse(NodeId),
    Jump(NodeId),
    LoopHeader(NodeId),
    Loop(NodeId),
    LoopExit(NodeId),
    Return { value: NodeId, region: NodeId },
    Success(NodeId),
    Fail(NodeId),
    Trap(NodeId),
    OsrStart,
    OsrEnd,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EffectKind {
    EffectBarrier { hard: bool, input: NodeId },
    BranchStartEffect(NodeId),
    WriteEffect(NodeId),
    ReadEffect(NodeId),
    EffectPhi { region: NodeId, operands: OperandVec },
    ListResize { object: NodeId, input: NodeId },
    ObjectResize { object: NodeId, input: NodeId },
    EmptyBarrier,
}

impl NodeKind {
    pub fn is_control_flow(&self) -> bool {
        matches!(self, NodeKind::ControlFlow(_))
    }

    pub fn is_effect(&self) -> bool {
        matches!(self, NodeKind::Effect(_))
    }

    /// Pure expressions participate in no effect chain and are GVN'd
    /// structurally; everything else (control flow, effect markers, and
    /// effectful expressions) is identity-hashed (§3.3).
    pub fn is_pure(&self) -> bool {
        match self {
            NodeKind::Expr(e) => e.effect_edge().is_none(),
            NodeKind::ControlFlow(_) | NodeKind::Effect(_) => false,
        }
    }

    /// All operand ids this node consumes, in slot order. Effect edges are
    /// included -- replacement rewires them identically to data operands.
    pub fn operands(&self) -> OperandVec {
        match self {
            NodeKind::Expr(e) => e.operands(),
            NodeKind::ControlFlow(c) => c.operands(),
            NodeKind::Effect(e) => e.operands(),
        }
    }

    /// Rewrites every occurrence of `old` in this node's operand slots to
    /// `new`. Returns the number of slots rewritten.
    pub fn replace_operand(&mut self, old: NodeId, new: NodeId) -> usize {
        match self {
            NodeKind::Expr(e) => e.replace_operand(old, new),
            NodeKind::ControlFlow(c) => c.replace_operand(old, new),
            NodeKind::Effect(e) => e.replace_operand(old, new),
        }
    }
}

macro_rules! ids {
    ($($id:expr),* $(,)?) => {{
        let mut v = OperandVec::new();
        $(v.push($id);)*
        v
    }};
}

impl ExprKind {
    /// The incoming effect edge, for expressions that observe or produce a
    /// memory effect. `None` for pure expressions.
    pub fn effect_edge(&self) -> Option<NodeId> {
        match self {
            ExprKind::PropGet { effect, .. }
            | ExprKind::PropSet { effect, .. }
            | ExprKind::IndexGet { effect, .. }
            | ExprKind::IndexSet { effect, .. }
            | ExprKind::ObjectFind { effect, .. }
            | ExprKind::ListIndex { effect, .. }
            | ExprKind::ObjectRefGet { effect, .. }
            | ExprKind::ObjectRefSet { effect, .. }
            | ExprKind::ListRefGet { effect, .. }
            | ExprKind::ListRefSet { effect, .. }
            | ExprKind::ExtensionGet { effect, .. }
            | ExprKind::ExtensionSet { effect, .. }
            | ExprKind::IteratorNext { effect, .. }
            | ExprKind::Call { effect, .. }
            | ExprKind::ICall { effect, .. } => Some(*effect),
            _ => None,
        }
    }

    pub fn operands(&self) -> OperandVec {
        match self {
            ExprKind::Float64(_)
            | ExprKind::LongString(_)
            | ExprKind::SString(_)
            | ExprKind::Boolean(_)
            | ExprKind::Nil
            | ExprKind::ClosureLoad { .. }
            | ExprKind::StackSlot(_)
            | ExprKind::UGet(_)
            | ExprKind::Arg(_)
            | ExprKind::OsrLoad(_) => OperandVec::new(),

            ExprKind::IrList(elems) => elems.clone(),
            ExprKind::IrObject(pairs) => {
                let mut v = OperandVec::new();
                for (k, val) in pairs {
                    v.push(*k);
                    v.push(*val);
                }
                v
            }
            ExprKind::Unary { operand, .. } => ids![*operand],
            ExprKind::Binary { lhs, rhs, .. } => ids![*lhs, *rhs],
            ExprKind::Ternary { cond, lhs, rhs } => ids![*cond, *lhs, *rhs],
            ExprKind::Float64Negate(x)
            | ExprKind::Int64Negate(x)
            | ExprKind::Int64ToFloat64(x)
            | ExprKind::Float64ToInt64(x)
            | ExprKind::IteratorNew(x)
            | ExprKind::IteratorTest(x)
            | ExprKind::IteratorDeref(x)
            | ExprKind::Alias(x)
            | ExprKind::Projection { operand: x, .. }
            | ExprKind::TestType { operand: x, .. }
            | ExprKind::TypeGuard { operand: x, .. }
            | ExprKind::Box { operand: x, .. }
            | ExprKind::Unbox { operand: x, .. } => ids![*x],
            ExprKind::Float64Arithmetic { lhs, rhs, .. }
            | ExprKind::Float64Compare { lhs, rhs, .. }
            | ExprKind::StringCompare { lhs, rhs, .. }
            | ExprKind::Int64Arithmetic { lhs, rhs, .. }
            | ExprKind::Int64Compare { lhs, rhs, .. } => ids![*lhs, *rhs],
            ExprKind::SStringEq(a, b) | ExprKind::SStringNe(a, b) => ids![*a, *b],
            ExprKind::PropGet { object, key, effect } => ids![*object, *key, *effect],
            ExprKind::PropSet { object, key, value, effect } => {
                ids![*object, *key, *value, *effect]
            }
            ExprKind::IndexGet { object, index, effect } => ids![*object, *index, *effect],
            ExprKind::IndexSet { object, index, value, effect } => {
                ids![*object, *index, *value, *effect]
            }
            ExprKind::ObjectFind { object, key, effect } => ids![*object, *key, *effect],
            ExprKind::ListIndex { object, index, effect } => ids![*object, *index, *effect],
            ExprKind::ObjectRefGet { reference, effect } => ids![*reference, *effect],
            ExprKind::ObjectRefSet { reference, value, effect } => {
                ids![*reference, *value, *effect]
            }
            ExprKind::ListRefGet { reference, effect } => ids![*reference, *effect],
            ExprKind::ListRefSet { reference, value, effect } => {
                ids![*reference, *value, *effect]
            }
            ExprKind::ExtensionGet { object, key, effect } => ids![*object, *key, *effect],
            ExprKind::ExtensionSet { object, key, value, effect } => {
                ids![*object, *key, *value, *effect]
            }
            ExprKind::IteratorNext { iterator, effect } => ids![*iterator, *effect],
            ExprKind::Call { callee, args, effect } => {
                let mut v = ids![*callee];
                v.extend(args.iter().copied());
                v.push(*effect);
                v
            }
            ExprKind::ICall { args, effect, .. } => {
                let mut v = args.clone();
                v.push(*effect);
                v
            }
            ExprKind::ListOobTest { object, index } => ids![*object, *index],
            ExprKind::Phi { region, operands } => {
                let mut v = ids![*region];
                v.extend(operands.iter().copied());
                v
            }
            ExprKind::Checkpoint(ops) => ops.clone(),
            ExprKind::USet { value, .. } => ids![*value],
            ExprKind::LoopIvInt64 { region, start, step }
            | ExprKind::LoopIvFloat64 { region, start, step } => {
                ids![*region, *start, *step]
            }
        }
    }

    pub fn replace_operand(&mut self, old: NodeId, new: NodeId) -> usize {
        let mut count = 0;
        let mut hit = |slot: &mut NodeId| {
            if *slot == old {
                *slot = new;
                count += 1;
            }
        };
        match self {
            ExprKind::Float64(_)
            | ExprKind::LongString(_)
            | ExprKind::SString(_)
            | ExprKind::Boolean(_)
            | ExprKind::Nil
            | ExprKind::ClosureLoad { .. }
            | ExprKind::StackSlot(_)
            | ExprKind::UGet(_)
            | ExprKind::Arg(_)
            | ExprKind::OsrLoad(_) => {}
            ExprKind::IrList(elems) => elems.iter_mut().for_each(|e| hit(e)),
            ExprKind::IrObject(pairs) => {
                for (k, v) in pairs.iter_mut() {
                    hit(k);
                    hit(v);
                }
            }
            ExprKind::Unary { operand, .. } => hit(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                hit(lhs);
                hit(rhs);
            }
            ExprKind::Ternary { cond, lhs, rhs } => {
                hit(cond);
                hit(lhs);
                hit(rhs);
            }
            ExprKind::Float64Negate(x)
            | ExprKind::Int64Negate(x)
            | ExprKind::Int64ToFloat64(x)
            | ExprKind::Float64ToInt64(x)
            | ExprKind::IteratorNew(x)
            | ExprKind::IteratorTest(x)
            | ExprKind::IteratorDeref(x)
            | ExprKind::Alias(x)
            | ExprKind::Projection { operand: x, .. }
            | ExprKind::TestType { operand: x, .. }
            | ExprKind::TypeGuard { operand: x, .. }
            | ExprKind::Box { operand: x, .. }
            | ExprKind::Unbox { operand: x, .. } => hit(x),
            ExprKind::Float64Arithmetic { lhs, rhs, .. }
            | ExprKind::Float64Compare { lhs, rhs, .. }
            | ExprKind::StringCompare { lhs, rhs, .. }
            | ExprKind::Int64Arithmetic { lhs, rhs, .. }
            | ExprKind::Int64Compare { lhs, rhs, .. } => {
                hit(lhs);
                hit(rhs);
            }
            ExprKind::SStringEq(a, b) | ExprKind::SStringNe(a, b) => {
                hit(a);
                hit(b);
            }
            ExprKind::PropGet { object, key, effect } => {
                hit(object);
                hit(key);
                hit(effect);
            }
            ExprKind::PropSet { object, key, value, effect } => {
                hit(object);
                hit(key);
                hit(value);
                hit(effect);
            }
            ExprKind::IndexGet { object, index, effect } => {
                hit(object);
                hit(index);
                hit(effect);
            }
            ExprKind::IndexSet { object, index, value, effect } => {
                hit(object);
                hit(index);
                hit(value);
                hit(effect);
            }
            ExprKind::ObjectFind { object, key, effect } => {
                hit(object);
                hit(key);
                hit(effect);
            }
            ExprKind::ListIndex { object, index, effect } => {
                hit(object);
                hit(index);
                hit(effect);
            }
            ExprKind::ObjectRefGet { reference, effect } => {
                hit(reference);
                hit(effect);
            }
            ExprKind::ObjectRefSet { reference, value, effect } => {
                hit(reference);
                hit(value);
                hit(effect);
            }
            ExprKind::ListRefGet { reference, effect } => {
                hit(reference);
                hit(effect);
            }
            ExprKind::ListRefSet { reference, value, effect } => {
                hit(reference);
                hit(value);
                hit(effect);
            }
            ExprKind::ExtensionGet { object, key, effect } => {
                hit(object);
                hit(key);
                hit(effect);
            }
            ExprKind::ExtensionSet { object, key, value, effect } => {
                hit(object);
                hit(key);
                hit(value);
                hit(effect);
            }
            ExprKind::IteratorNext { iterator, effect } => {
                hit(iterator);
                hit(effect);
            }
            ExprKind::Call { callee, args, effect } => {
                hit(callee);
                args.iter_mut().for_each(|a| hit(a));
                hit(effect);
            }
            ExprKind::ICall { args, effect, .. } => {
                args.iter_mut().for_each(|a| hit(a));
                hit(effect);
            }
            ExprKind::ListOobTest { object, index } => {
                hit(object);
                hit(index);
            }
            ExprKind::Phi { region, operands } => {
                hit(region);
                operands.iter_mut().for_each(|o| hit(o));
            }
            ExprKind::Checkpoint(ops) => ops.iter_mut().for_each(|o| hit(o)),
            ExprKind::USet { value, .. } => hit(value),
            ExprKind::LoopIvInt64 { region, start, step }
            | ExprKind::LoopIvFloat64 { region, start, step } => {
                hit(region);
                hit(start);
                hit(step);
            }
        }
        count
    }

    /// Structural GVN key for pure nodes: discriminant tag plus bit-encoded
    /// operands, matching the original's `GVNHash0/1/2/3` combine strategy
    /// but producing an equality key instead of only a hash (Rust's
    /// `#[derive(Hash, Eq)]` cannot cover `f64`, so constants are bit-cast).
    pub fn gvn_key(&self) -> Option<Vec<u64>> {
        if self.effect_edge().is_some() {
            return None;
        }
        let tag = std::mem::discriminant(self);
        let mut key = vec![tag_hash(&tag)];
        match self {
            ExprKind::Float64(v) => key.push(v.to_bits()),
            ExprKind::LongString(s) | ExprKind::SString(s) => key.push(str_hash(s)),
            ExprKind::Boolean(b) => key.push(*b as u64),
            ExprKind::Nil => {}
            ExprKind::ClosureLoad { function_index } => key.push(*function_index as u64),
            ExprKind::IrList(elems) => key.extend(elems.iter().map(|id| id.0 as u64)),
            ExprKind::IrObject(pairs) => {
                for (k, v) in pairs {
                    key.push(k.0 as u64);
                    key.push(v.0 as u64);
                }
            }
            ExprKind::Unary { op, operand } => {
                key.push(*op as u64);
                key.push(operand.0 as u64);
            }
            ExprKind::Binary { op, lhs, rhs } => {
                key.push(binary_op_hash(*op));
                key.push(lhs.0 as u64);
                key.push(rhs.0 as u64);
            }
            ExprKind::Ternary { cond, lhs, rhs } => {
                key.push(cond.0 as u64);
                key.push(lhs.0 as u64);
                key.push(rhs.0 as u64);
            }
            ExprKind::Float64Negate(x)
            | ExprKind::Int64Negate(x)
            | ExprKind::Int64ToFloat64(x)
            | ExprKind::Float64ToInt64(x)
            | ExprKind::IteratorTest(x)
            | ExprKind::IteratorDeref(x)
            | ExprKind::Alias(x) => key.push(x.0 as u64),
            ExprKind::Projection { index, operand } => {
                key.push(*index as u64);
                key.push(operand.0 as u64);
            }
            ExprKind::TestType { kind, operand } | ExprKind::TypeGuard { kind, operand } => {
                key.push(*kind as u64);
                key.push(operand.0 as u64);
            }
            ExprKind::Box { kind, operand } | ExprKind::Unbox { kind, operand } => {
                key.push(*kind as u64);
                key.push(operand.0 as u64);
            }
            ExprKind::Float64Arithmetic { op, lhs, rhs } | ExprKind::Int64Arithmetic { op, lhs, rhs } => {
                key.push(*op as u64);
                key.push(lhs.0 as u64);
                key.push(rhs.0 as u64);
            }
            ExprKind::Float64Compare { op, lhs, rhs }
            | ExprKind::StringCompare { op, lhs, rhs }
            | ExprKind::Int64Compare { op, lhs, rhs } => {
                key.push(*op as u64);
                key.push(lhs.0 as u64);
                key.push(rhs.0 as u64);
            }
            ExprKind::SStringEq(a, b) | ExprKind::SStringNe(a, b) => {
                key.push(a.0 as u64);
                key.push(b.0 as u64);
            }
            ExprKind::ListOobTest { object, index } => {
                key.push(object.0 as u64);
                key.push(index.0 as u64);
            }
            ExprKind::Checkpoint(ops) => key.extend(ops.iter().map(|o| o.0 as u64)),
            ExprKind::StackSlot(i) | ExprKind::UGet(i) | ExprKind::Arg(i) | ExprKind::OsrLoad(i) => {
                key.push(*i as u64)
            }
            // Phi and the remaining variants (memory ops, calls, iterators-new/next,
            // USet, loop IVs) all carry an effect edge or are intentionally
            // identity-hashed as control-dependent; unreachable here because
            // `effect_edge().is_some()` already filtered memory/call/iterator-next,
            // and Phi/IteratorNew/USet are excluded below.
            ExprKind::Phi { .. } | ExprKind::IteratorNew(_) | ExprKind::USet { .. } => return None,
            ExprKind::LoopIvInt64 { .. } | ExprKind::LoopIvFloat64 { .. } => return None,
            ExprKind::PropGet { .. }
            | ExprKind::PropSet { .. }
            | ExprKind::IndexGet { .. }
            | ExprKind::IndexSet { .. }
            | ExprKind::ObjectFind { .. }
            | ExprKind::ListIndex { .. }
            | ExprKind::ObjectRefGet { .. }
            | ExprKind::ObjectRefSet { .. }
            | ExprKind::ListRefGet { .. }
            | ExprKind::ListRefSet { .. }
            | ExprKind::ExtensionGet { .. }
            | ExprKind::ExtensionSet { .. }
            | ExprKind::IteratorNext { .. }
            | ExprKind::Call { .. }
            | ExprKind::ICall { .. } => return None,
        }
        Some(key)
    }
}

fn tag_hash<T>(tag: &std::mem::Discriminant<T>) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut h = std::collections::hash_map::DefaultHasher::new();
    tag.hash(&mut h);
    h.finish()
}

fn str_hash(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut h = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut h);
    h.finish()
}

fn binary_op_hash(op: BinaryOp) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut h = std::collections::hash_map::DefaultHasher::new();
    op.hash(&mut h);
    h.finish()
}

impl std::hash::Hash for BinaryOp {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            BinaryOp::Arith(op) => (*op as u8).hash(state),
            BinaryOp::Cmp(op) => (*op as u8).hash(state),
            BinaryOp::Logic(op) => (*op as u8).hash(state),
            BinaryOp::Concat => {}
        }
    }
}

impl ControlFlowKind {
    pub fn operands(&self) -> OperandVec {
        match self {
            ControlFlowKind::Start
            | ControlFlowKind::End
            | ControlFlowKind::OsrStart
            | ControlFlowKind::OsrEnd => OperandVec::new(),
            ControlFlowKind::Region(preds) => preds.clone(),
            ControlFlowKind::If { cond, region } => ids![*cond, *region],
            ControlFlowKind::IfTrue(x)
            | ControlFlowKind::IfFalse(x)
            | ControlFlowKind::Jump(x)
            | ControlFlowKind::LoopHeader(x)
            | ControlFlowKind::Loop(x)
            | ControlFlowKind::LoopExit(x)
            | ControlFlowKind::Success(x)
            | ControlFlowKind::Fail(x)
            | ControlFlowKind::Trap(x) => ids![*x],
            ControlFlowKind::Return { value, region } => ids![*value, *region],
        }
    }

    pub fn replace_operand(&mut self, old: NodeId, new: NodeId) -> usize {
        let mut count = 0;
        let mut hit = |slot: &mut NodeId| {
            if *slot == old {
                *slot = new;
                count += 1;
            }
        };
        match self {
            ControlFlowKind::Start
            | ControlFlowKind::End
            | ControlFlowKind::OsrStart
            | ControlFlowKind::OsrEnd => {}
            ControlFlowKind::Region(preds) => preds.iter_mut().for_each(|p| hit(p)),
            ControlFlowKind::If { cond, region } => {
                hit(cond);
                hit(region);
            }
            ControlFlowKind::IfTrue(x)
            | ControlFlowKind::IfFalse(x)
            | ControlFlowKind::Jump(x)
            | ControlFlowKind::LoopHeader(x)
            | ControlFlowKind::Loop(x)
            | ControlFlowKind::LoopExit(x)
            | ControlFlowKind::Success(x)
            | ControlFlowKind::Fail(x)
            | ControlFlowKind::Trap(x) => hit(x),
            ControlFlowKind::Return { value, region } => {
                hit(value);
                hit(region);
            }
        }
        count
    }
}

impl EffectKind {
    pub fn operands(&self) -> OperandVec {
        match self {
            EffectKind::EmptyBarrier => OperandVec::new(),
            EffectKind::EffectBarrier { input, .. } => ids![*input],
            EffectKind::BranchStartEffect(x)
            | EffectKind::WriteEffect(x)
            | EffectKind::ReadEffect(x) => ids![*x],
            EffectKind::EffectPhi { region, operands } => {
                let mut v = ids![*region];
                v.extend(operands.iter().copied());
                v
            }
            EffectKind::ListResize { object, input } | EffectKind::ObjectResize { object, input } => {
                ids![*object, *input]
            }
        }
    }

    pub fn replace_operand(&mut self, old: NodeId, new: NodeId) -> usize {
        let mut count = 0;
        let mut hit = |slot: &mut NodeId| {
            if *slot == old {
                *slot = new;
                count += 1;
            }
        };
        match self {
            EffectKind::EmptyBarrier => {}
            EffectKind::EffectBarrier { input, .. } => hit(input),
            EffectKind::BranchStartEffect(x)
            | EffectKind::WriteEffect(x)
            | EffectKind::ReadEffect(x) => hit(x),
            EffectKind::EffectPhi { region, operands } => {
                hit(region);
                operands.iter_mut().for_each(|o| hit(o));
            }
            EffectKind::ListResize { object, input } | EffectKind::ObjectResize { object, input } => {
                hit(object);
                hit(input);
            }
        }
        count
    }

    /// `true` for nodes that cannot be crossed by store-forwarding/collapsing
    /// without alias-analysis evidence (§4.6 step 4-5).
    pub fn is_hard_barrier(&self) -> bool {
        matches!(self, EffectKind::EffectBarrier { hard: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{ArithOp, CmpOp};

    #[test]
    fn binary_operands_in_order() {
        let e = ExprKind::Binary {
            op: BinaryOp::Arith(ArithOp::Add),
            lhs: NodeId(1),
            rhs: NodeId(2),
        };
        assert_eq!(e.operands().as_slice(), &[NodeId(1), NodeId(2)]);
    }

    #[test]
    fn replace_operand_rewrites_all_matching_slots() {
        let mut e = ExprKind::Binary {
            op: BinaryOp::Arith(ArithOp::Add),
            lhs: NodeId(1),
            rhs: NodeId(1),
        };
        let n = e.replace_operand(NodeId(1), NodeId(9));
        assert_eq!(n, 2);
        assert_eq!(e.operands().as_slice(), &[NodeId(9), NodeId(9)]);
    }

    #[test]
    fn pure_expr_has_no_effect_edge() {
        let e = ExprKind::Float64(1.0);
        assert!(e.effect_edge().is_none());
        assert!(NodeKind::Expr(e).is_pure());
    }

    #[test]
    fn memory_expr_has_effect_edge_and_is_impure() {
        let e = ExprKind::PropGet {
            object: NodeId(0),
            key: NodeId(1),
            effect: NodeId(2),
        };
        assert_eq!(e.effect_edge(), Some(NodeId(2)));
        assert!(!NodeKind::Expr(e).is_pure());
    }

    #[test]
    fn gvn_key_equal_for_structurally_equal_pure_nodes() {
        let a = ExprKind::Binary {
            op: BinaryOp::Arith(ArithOp::Mul),
            lhs: NodeId(3),
            rhs: NodeId(4),
        };
        let b = ExprKind::Binary {
            op: BinaryOp::Arith(ArithOp::Mul),
            lhs: NodeId(3),
            rhs: NodeId(4),
        };
        assert_eq!(a.gvn_key(), b.gvn_key());
    }

    #[test]
    fn gvn_key_differs_for_different_operators() {
        let a = ExprKind::Binary {
            op: BinaryOp::Cmp(CmpOp::Eq),
            lhs: NodeId(3),
            rhs: NodeId(4),
        };
        let b = ExprKind::Binary {
            op: BinaryOp::Cmp(CmpOp::Ne),
            lhs: NodeId(3),
            rhs: NodeId(4),
        };
        assert_ne!(a.gvn_key(), b.gvn_key());
    }

    #[test]
    fn gvn_key_none_for_effectful() {
        let e = ExprKind::Call {
            callee: NodeId(0),
            args: OperandVec::new(),
            effect: NodeId(1),
        };
        assert!(e.gvn_key().is_none());
    }

    #[test]
    fn control_flow_is_not_pure() {
        assert!(!NodeKind::ControlFlow(ControlFlowKind::Start).is_pure());
        assert!(NodeKind::ControlFlow(ControlFlowKind::Start).is_control_flow());
    }

    #[test]
    fn effect_barrier_hard_classification() {
        let hard = EffectKind::EffectBarrier { hard: true, input: NodeId(0) };
        let soft = EffectKind::EffectBarrier { hard: false, input: NodeId(0) };
        assert!(hard.is_hard_barrier());
        assert!(!soft.is_hard_barrier());
    }
}
