//! Errors raised while decoding tool arguments or encoding tool output.
//!
//! Worker failures travel as `swcache_core::Error`; these cover the MCP edge.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use swcache_client::UrlError;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., an empty method).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The target URL could not be resolved against the origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(#[from] UrlError),

    /// Tool output could not be encoded as JSON.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::InvalidUrl(_) => -32003,
            ToolError::Serialize(_) => -32000,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
