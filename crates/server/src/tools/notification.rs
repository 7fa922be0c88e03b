//! sw_notification_click tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::ServiceWorker;

use super::json_result;

/// Input parameters for sw_notification_click tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// Page the notification points at (default: "/").
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickOutput {
    /// Window URL to focus or open.
    pub open: String,
}

/// Implementation of the sw_notification_click tool.
pub async fn notification_click_impl(
    worker: &ServiceWorker, params: NotificationClickParams,
) -> Result<CallToolResult, McpError> {
    let url = worker.notification_target(params.target.as_deref())?;
    tracing::debug!(%url, "notification click");
    json_result(&NotificationClickOutput { open: url.to_string() })
}
