//! CLI error taxonomy: one variant per failure boundary (I/O,
//! deserialization, HIR contract violation), each carrying enough context
//! to print a useful diagnostic without the caller having to downcast.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read bytecode program '{}': {source}", path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse bytecode program '{}': {source}", path.display())]
    Json { path: PathBuf, #[source] source: serde_json::Error },

    #[error("failed to write DOT output '{}': {source}", path.display())]
    DotWrite { path: PathBuf, #[source] source: std::io::Error },

    #[error(transparent)]
    Hir(#[from] lava_hir::HirError),
}

impl CliError {
    /// Maps an error to the process exit code `main` reports, matching the
    /// source boundaries listed above: bad input on disk is `3`, a bad
    /// bytecode program is `2`, and a core contract violation is `1` since
    /// per the core's own error design that always indicates a caller bug.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Io { .. } | CliError::DotWrite { .. } => 3,
            CliError::Json { .. } => 2,
            CliError::Hir(_) => 1,
        }
    }
}
