//! sw_queue and sw_sync tool implementations.
//!
//! A form submission that failed while offline is parked with `sw_queue`;
//! the host calls `sw_sync` when connectivity for the tag returns.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::ServiceWorker;

use super::{build_request, json_result};

/// Input parameters for sw_queue tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwQueueParams {
    /// Target of the submission; paths resolve against the origin.
    pub url: String,

    /// HTTP method (default: POST).
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub body: Option<String>,

    /// Sync tag (default: the configured form sync tag).
    #[serde(default)]
    pub tag: Option<String>,
}

fn default_method() -> String {
    "POST".into()
}

/// Input parameters for sw_sync tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncParams {
    /// Sync tag to replay (default: the configured form sync tag).
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwQueueOutput {
    pub id: i64,
    pub tag: String,
    /// Requests parked under the tag, including this one.
    pub pending: usize,
}

/// Implementation of the sw_queue tool.
pub async fn queue_impl(
    worker: &ServiceWorker, default_tag: &str, params: SwQueueParams,
) -> Result<CallToolResult, McpError> {
    let tag = params.tag.unwrap_or_else(|| default_tag.to_string());
    let request = build_request(worker, &params.url, &params.method, params.headers, params.body)?;

    let id = worker.enqueue(&tag, &request).await?;
    let pending = worker.db().queued_requests(&tag).await?.len();

    json_result(&SwQueueOutput { id, tag, pending })
}

/// Implementation of the sw_sync tool.
pub async fn sync_impl(
    worker: &ServiceWorker, default_tag: &str, params: SwSyncParams,
) -> Result<CallToolResult, McpError> {
    let tag = params.tag.unwrap_or_else(|| default_tag.to_string());
    let report = worker.sync(&tag).await?;
    json_result(&report)
}
