//! Unified error types for voltset
//!
//! [`VoltsetError`] is the error surfaced at the oracle boundary and by the
//! sampler. Crate-specific errors (engine process failures, fixture parsing)
//! convert into it so callers can match on one taxonomy:
//!
//! - setup failures ([`VoltsetError::OracleUnavailable`]) abort before any
//!   scenario runs
//! - configuration errors ([`VoltsetError::Config`]) are rejected up-front
//! - [`VoltsetError::NotConverged`] is only raised by single-solve entry
//!   points; the batch sampler counts non-convergence instead

use thiserror::Error;

/// Unified error type for all voltset operations.
#[derive(Error, Debug)]
pub enum VoltsetError {
    /// I/O errors (file access, pipes, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid sampler or oracle configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The oracle could not be started or initialized
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// The oracle rejected a request or broke the protocol mid-run
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// A solve reported non-convergence where a solution was required
    #[error("Solution did not converge")]
    NotConverged,

    /// A dataset row did not match the schema fixed by the first row
    #[error("Schema error: {0}")]
    Schema(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using VoltsetError.
pub type VoltsetResult<T> = Result<T, VoltsetError>;

impl From<anyhow::Error> for VoltsetError {
    fn from(err: anyhow::Error) -> Self {
        VoltsetError::Other(format!("{err:#}"))
    }
}

impl From<String> for VoltsetError {
    fn from(s: String) -> Self {
        VoltsetError::Other(s)
    }
}

impl From<&str> for VoltsetError {
    fn from(s: &str) -> Self {
        VoltsetError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for VoltsetError {
    fn from(err: serde_json::Error) -> Self {
        VoltsetError::Parse(err.to_string())
    }
}
