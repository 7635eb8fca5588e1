//! Error types for engine communication and fixture loading.

use thiserror::Error;
use voltset_core::VoltsetError;

/// Errors that can occur while talking to a circuit engine.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Engine binary could not be located.
    #[error("Engine {engine} is not installed. Put `{hint}` on PATH or in ~/.voltset/engines/")]
    NotInstalled { engine: String, hint: String },

    /// Engine process failed to start.
    #[error("Failed to start engine process: {0}")]
    ProcessStart(#[source] std::io::Error),

    /// The engine sent something the protocol does not allow here.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The engine answered a request with an error.
    #[error("Engine error: {0}")]
    Engine(String),

    /// The engine did not answer a request before the deadline.
    #[error("Engine did not answer within {seconds}s")]
    Timeout { seconds: u64 },

    /// The engine closed its output stream.
    #[error("Engine closed the connection")]
    Closed,

    /// Fixture circuit could not be loaded or is inconsistent.
    #[error("Fixture error: {0}")]
    Fixture(String),

    /// Generic IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error on the wire.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for oracle operations.
pub type OracleResult<T> = Result<T, OracleError>;

impl From<OracleError> for VoltsetError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::NotInstalled { .. } | OracleError::ProcessStart(_) => {
                VoltsetError::OracleUnavailable(err.to_string())
            }
            OracleError::Fixture(message) => VoltsetError::Parse(message),
            OracleError::Io(io) => VoltsetError::Io(io),
            other => VoltsetError::Oracle(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_failures_map_to_unavailable() {
        let err: VoltsetError = OracleError::NotInstalled {
            engine: "opendss".into(),
            hint: "opendss".into(),
        }
        .into();
        assert!(matches!(err, VoltsetError::OracleUnavailable(_)));
    }

    #[test]
    fn runtime_failures_map_to_oracle() {
        let err: VoltsetError = OracleError::Engine("no such load".into()).into();
        assert!(matches!(err, VoltsetError::Oracle(ref msg) if msg.contains("no such load")));
        let err: VoltsetError = OracleError::Closed.into();
        assert!(matches!(err, VoltsetError::Oracle(_)));
        let err: VoltsetError = OracleError::Timeout { seconds: 30 }.into();
        assert!(matches!(err, VoltsetError::Oracle(ref msg) if msg.contains("30s")));
    }
}
