//! MCP tool implementations.
//!
//! Each tool turns one host event into a `ServiceWorker` call and reports
//! the result as pretty-printed JSON text.

use std::collections::BTreeMap;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use swcache_core::{Request, ServiceWorker};

use crate::error::ToolError;

pub mod cache;
pub mod lifecycle;
pub mod notification;
pub mod sw_fetch;
pub mod sync;

pub use cache::{CacheListParams, list_impl};
pub use lifecycle::{activate_impl, install_impl, status_impl};
pub use notification::{NotificationClickParams, notification_click_impl};
pub use sw_fetch::{SwFetchParams, fetch_impl};
pub use sync::{SwQueueParams, SwSyncParams, queue_impl, sync_impl};

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(ToolError::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Build a worker request from tool arguments. Relative URLs resolve
/// against the worker's origin.
pub(crate) fn build_request(
    worker: &ServiceWorker, url: &str, method: &str, headers: BTreeMap<String, String>, body: Option<String>,
) -> Result<Request, ToolError> {
    let method = method.trim();
    if method.is_empty() {
        return Err(ToolError::InvalidInput("method cannot be empty".into()));
    }

    let url = swcache_client::resolve(worker.routes().origin(), url)?;
    Ok(Request {
        method: method.to_ascii_uppercase(),
        url,
        headers: headers.into_iter().collect(),
        body: body.map(Into::into),
    })
}
