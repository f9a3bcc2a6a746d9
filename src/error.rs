//! Error types for pipebench.

use thiserror::Error;

/// The main error type for benchmark operations.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Dropping, creating or filling the dataset table failed.
    #[error("Setup failed: {0}")]
    Setup(String),

    /// The post-setup count query disagrees with the configured row count.
    #[error("Row count mismatch: expected {expected}, found {actual}")]
    CountMismatch { expected: i64, actual: i64 },

    /// The pool could not hand out a connection.
    #[error("Connection acquisition failed: {0}")]
    Acquisition(String),

    /// A lookup or statement failed on an acquired connection.
    #[error("Query failed: {0}")]
    Query(String),

    /// A batch returned a different key set than the one requested.
    #[error(
        "Key set mismatch in {scenario}: {missing} key(s) missing, {unexpected} unexpected or duplicated"
    )]
    KeyMismatch {
        scenario: &'static str,
        missing: usize,
        unexpected: usize,
    },

    /// Dropping the dataset table at exit failed.
    #[error("Teardown failed: {0}")]
    Teardown(String),

    /// A mean was requested over zero samples.
    #[error("Cannot aggregate an empty sample set")]
    NoSamples,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// True when the pool failed to yield a connection, as opposed to a query bug.
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Self::Acquisition(_))
    }

    /// Create a query error from any displayable driver error.
    pub fn query(err: impl std::fmt::Display) -> Self {
        Self::Query(err.to_string())
    }

    /// Re-label a failure that happened while building the dataset.
    pub(crate) fn into_setup(self) -> Self {
        match self {
            Self::Query(msg) | Self::Acquisition(msg) => Self::Setup(msg),
            other => other,
        }
    }
}

/// Result type alias for benchmark operations.
pub type BenchResult<T> = Result<T, BenchError>;
