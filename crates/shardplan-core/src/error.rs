use thiserror::Error;

/// Canonical result for every shardplan crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    /// The node cannot be split over its children's declared partitions.
    /// Callers may retry with a forced single-partition plan.
    #[error("Unsupported partitioning for {node}: {reason}")]
    UnsupportedPartitioning { node: String, reason: String },

    /// A node reached lowering or task generation without a usable handler.
    /// Always a defect, never user-recoverable.
    #[error("Dispatch coverage gap at {node}: {detail}")]
    DispatchCoverage { node: String, detail: String },

    /// Children disagree on partition counts, or a task references a key
    /// that does not exist.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Hashing error: {0}")]
    Hash(String),

    #[error("Internal invariant failed: {0}")]
    Invariant(String),
}

impl Error {
    pub fn unsupported(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::UnsupportedPartitioning {
            node: node.into(),
            reason: reason.into(),
        }
    }

    pub fn coverage(node: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::DispatchCoverage {
            node: node.into(),
            detail: detail.into(),
        }
    }

    /// True for errors that signal a missing feature rather than a defect.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedPartitioning { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Hash(e.to_string())
    }
}
