//! Error taxonomy for the HIR core.
//!
//! Per §7, the only `Result::Err` paths the core exposes are contract
//! violations -- bugs in a caller, never expected outcomes. "No fold",
//! "ambiguous alias", and "type mismatch in induction typing" are not
//! errors; they surface as `Option::None` / early returns from the
//! relevant functions, not as `HirError` variants.

use thiserror::Error;

use crate::id::NodeId;

#[derive(Debug, Error)]
pub enum HirError {
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    #[error("cannot replace pure node {old} with effectful node {new}")]
    ReplacePureWithEffectful { old: NodeId, new: NodeId },

    #[error("graph already has a {kind} node: {existing}")]
    DuplicateStartOrEnd { kind: &'static str, existing: NodeId },

    #[error("node {id} participates in no effect chain")]
    NotInEffectChain { id: NodeId },

    #[error("control-flow node {id} is not reachable from start")]
    UnreachableFromStart { id: NodeId },
}

pub type HirResult<T> = Result<T, HirError>;
