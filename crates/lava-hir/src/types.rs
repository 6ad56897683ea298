//! Dynamic type kinds and constant literal values.
//!
//! lavascript is dynamically typed: every runtime value belongs to one of a
//! closed set of kinds. [`TypeKind`] is that set (used by `Box`/`Unbox`,
//! `TestType`, and the loop-induction pass); [`ConstValue`] is the literal
//! payload carried by constant expression nodes.

use serde::{Deserialize, Serialize};

/// The closed set of runtime value kinds in lavascript.
///
/// Mirrors the type-test vocabulary in the arithmetic folder's pattern-match
/// rule (`type(x) == "<name>"`): real, boolean, null, list, object, closure,
/// iterator, extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Real,
    Boolean,
    Null,
    List,
    Object,
    Closure,
    Iterator,
    Extension,
}

impl TypeKind {
    /// `true` for the two kinds the loop-induction pass specializes to
    /// unboxed arithmetic (float64/int64 both present themselves as `Real`
    /// at the dynamic-type level; the distinction between float64 and int64
    /// representation lives in [`NumericKind`]).
    pub fn is_numeric(self) -> bool {
        matches!(self, TypeKind::Real)
    }
}

/// Which unboxed numeric representation a value specializes to. Distinct
/// from [`TypeKind::Real`], which is the dynamic (boxed) type tag; this is
/// the representation chosen once the loop-induction pass or a typed
/// folder has proven a value is always a particular native width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericKind {
    Int64,
    Float64,
}

/// Constant literal payload for `Const*` expression nodes.
///
/// `LongString`/`SString` distinguish heap-allocated long strings from
/// small, interned strings the way the original source's string
/// representation does; both are modeled here as owned `String` since the
/// interning table itself is out of scope (it lives in the GC/object layer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Float64(f64),
    Int64(i64),
    LongString(String),
    SString(String),
    Boolean(bool),
    Nil,
}

impl ConstValue {
    pub fn type_kind(&self) -> TypeKind {
        match self {
            ConstValue::Float64(_) | ConstValue::Int64(_) => TypeKind::Real,
            ConstValue::LongString(_) | ConstValue::SString(_) => TypeKind::Extension,
            ConstValue::Boolean(_) => TypeKind::Boolean,
            ConstValue::Nil => TypeKind::Null,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstValue::Float64(v) => Some(*v),
            ConstValue::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_kind_numeric_only_for_real() {
        assert!(TypeKind::Real.is_numeric());
        assert!(!TypeKind::Boolean.is_numeric());
        assert!(!TypeKind::Null.is_numeric());
    }

    #[test]
    fn const_value_type_kind() {
        assert_eq!(ConstValue::Float64(1.0).type_kind(), TypeKind::Real);
        assert_eq!(ConstValue::Int64(1).type_kind(), TypeKind::Real);
        assert_eq!(ConstValue::Boolean(true).type_kind(), TypeKind::Boolean);
        assert_eq!(ConstValue::Nil.type_kind(), TypeKind::Null);
        assert_eq!(
            ConstValue::SString("x".into()).type_kind(),
            TypeKind::Extension
        );
    }

    #[test]
    fn const_value_as_f64() {
        assert_eq!(ConstValue::Float64(2.5).as_f64(), Some(2.5));
        assert_eq!(ConstValue::Int64(3).as_f64(), Some(3.0));
        assert_eq!(ConstValue::Nil.as_f64(), None);
    }

    #[test]
    fn serde_roundtrip_const_value() {
        for v in [
            ConstValue::Float64(1.5),
            ConstValue::Int64(7),
            ConstValue::Boolean(false),
            ConstValue::Nil,
            ConstValue::SString("hi".into()),
        ] {
            let json = serde_json::to_string(&v).unwrap();
            let back: ConstValue = serde_json::from_str(&json).unwrap();
            assert_eq!(format!("{:?}", v), format!("{:?}", back));
        }
    }
}
