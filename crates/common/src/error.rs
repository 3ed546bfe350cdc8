//! Typed error vocabulary (§7). Internal plumbing still returns
//! `anyhow::Result`; these variants are what a caller can match on at
//! the boundary of each component, attached to the `anyhow::Error` chain
//! via `.context(...)` so `err.downcast_ref::<CoreError>()` recovers the
//! kind without string-sniffing the message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    /// A known non-failure condition reported by an ecosystem tool
    /// (e.g. dotnet's "No assets file was found"). Recorded, not
    /// rolled back, and never counted as a failure.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("{exit_info}: {detail}")]
    Exec { exit_info: String, detail: String },

    #[error("command timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("failed to parse output: {0}")]
    Parse(String),

    #[error("filter/policy error: {0}")]
    Filter(String),

    #[error("apply error: {0}")]
    Apply(String),

    #[error("rollback error (manual restore needed): {0}")]
    Rollback(String),

    #[error("cancelled")]
    Cancelled,
}

impl CoreError {
    /// Rollback and config errors are always fatal to the whole run;
    /// everything else is local to the package/group that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Config(_) | CoreError::Rollback(_))
    }
}
