//! Unified error types for sw-cache.
//!
//! Every variant carries a stable code prefix so hosts can match on the
//! display string as well as on the MCP error code.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

use crate::worker::lifecycle::{LifecycleEvent, LifecycleState};

/// Unified error types for the cache engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or disallowed URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Neither the network nor the cache store could produce a response.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// The live fetch failed before a response arrived.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A manifest asset could not be pre-cached; nothing was written.
    #[error("INSTALL_FAILED: {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    /// A lifecycle event arrived in a state that does not accept it.
    #[error("INVALID_TRANSITION: {event:?} not allowed in state {state:?}")]
    InvalidTransition { state: LifecycleState, event: LifecycleEvent },

    /// Stored headers could not be encoded or decoded.
    #[error("CACHE_ERROR: invalid headers: {0}")]
    InvalidHeaders(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
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
        Error::InvalidHeaders(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::CacheMiss(_) => -32001,
            Error::Database(_) | Error::MigrationFailed(_) | Error::InvalidHeaders(_) => -32002,
            Error::InvalidUrl(_) => -32003,
            Error::Network(_) => -32004,
            Error::FetchTimeout(_) => -32006,
            Error::FetchTooLarge(_) => -32007,
            Error::InstallFailed { .. } => -32008,
            Error::InvalidTransition { .. } => -32009,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
