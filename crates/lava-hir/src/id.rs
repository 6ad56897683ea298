//! Stable node identifiers.
//!
//! [`NodeId`] is the dense, monotonically increasing integer the arena hands
//! out for every node (§3.2/§9: "model nodes in a single arena and use
//! stable integer ids as the reference type"). All operand, reference, and
//! effect edges are `NodeId` values, never owning pointers.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
