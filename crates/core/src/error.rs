//! Unified error types for waystation.
//!
//! Display strings carry a stable `CODE: detail` prefix so log lines and MCP
//! error payloads can be matched on the code alone.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error type shared by the storage, client and server crates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., unknown partition name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No cache entry found for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored headers could not be encoded or decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Transport-level failure: offline, DNS, connection reset.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Populating the static partition failed; the previous generation keeps serving.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// Partition cleanup or client claim failed.
    #[error("ACTIVATE_FAILED: {0}")]
    ActivateFailed(String),

    /// Lifecycle operation invoked from the wrong state.
    #[error("LIFECYCLE_STATE: {0}")]
    LifecycleState(String),

    /// Push payload was not the expected JSON shape.
    #[error("INVALID_PAYLOAD: {0}")]
    InvalidPayload(String),

    /// No pending action with the given id.
    #[error("ACTION_NOT_FOUND: {0}")]
    ActionNotFound(i64),
}

impl Error {
    /// Whether this error came from the transport rather than from local state.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::FetchTimeout(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::CorruptEntry(msg) => (-32002, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Network(msg) => (-32004, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::InstallFailed(msg) => (-32020, msg.clone()),
            Error::ActivateFailed(msg) => (-32021, msg.clone()),
            Error::LifecycleState(msg) => (-32022, msg.clone()),
            Error::InvalidPayload(msg) => (-32602, msg.clone()),
            Error::ActionNotFound(id) => (-32001, format!("no pending action with id {id}")),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CacheMiss("static-v1 /app.js".to_string());
        assert!(err.to_string().starts_with("CACHE_MISS"));
        assert!(err.to_string().contains("/app.js"));
    }

    #[test]
    fn test_error_to_mcp_error() {
        let mcp_err: McpError = Error::InstallFailed("/manifest.json returned 404".to_string()).into();
        assert_eq!(mcp_err.code.0, -32020);
    }

    #[test]
    fn test_transport_classification() {
        assert!(Error::Network("connection refused".into()).is_transport());
        assert!(Error::FetchTimeout("5000ms".into()).is_transport());
        assert!(!Error::InvalidUrl("::".into()).is_transport());
    }
}
