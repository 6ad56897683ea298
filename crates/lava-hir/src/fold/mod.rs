//! The folder chain (§4.6).
//!
//! `folder` holds the generic `FolderData`/`Folder`/`FolderChain` registry
//! used by the construction-time local rewrites (arithmetic, intrinsic,
//! cast, phi, box/unbox). `memory` is driven separately by the builder,
//! since it needs a persistent numbering table rather than a stateless
//! `can_fold`/`fold` pair.

pub mod arith;
pub mod boxop;
pub mod cast;
pub mod folder;
pub mod intrinsic;
pub mod memory;
pub mod phi;

pub use folder::{register_all_folders, Folder, FolderChain, FolderData};
pub use memory::RefTable;
