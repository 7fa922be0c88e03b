//! sw_install, sw_activate and sw_status tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{LifecycleState, Matcher, ServiceWorker, Strategy};

use super::json_result;

/// Output structure for sw_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusOutput {
    pub state: LifecycleState,
    /// True while fetches are intercepted.
    pub controlling: bool,
    pub origin: String,
    pub store: String,
    pub manifest: Vec<String>,
    /// Classification rules in match order.
    pub routes: Vec<RouteRule>,
    /// Stores currently present, including stale ones awaiting activation.
    pub stores: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RouteRule {
    /// "contains" or "suffix".
    pub matcher: String,
    pub pattern: String,
    pub strategy: Strategy,
}

/// Implementation of the sw_install tool.
pub async fn install_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let report = worker.install().await?;
    json_result(&report)
}

/// Implementation of the sw_activate tool.
pub async fn activate_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let report = worker.activate().await?;
    json_result(&report)
}

/// Implementation of the sw_status tool.
pub async fn status_impl(worker: &ServiceWorker) -> Result<CallToolResult, McpError> {
    let state = worker.state().await;
    let routes = worker
        .routes()
        .rules()
        .iter()
        .map(|rule| {
            let (matcher, pattern) = match &rule.matcher {
                Matcher::Contains(p) => ("contains", p),
                Matcher::Suffix(p) => ("suffix", p),
            };
            RouteRule { matcher: matcher.into(), pattern: pattern.clone(), strategy: rule.strategy }
        })
        .collect();

    let output = StatusOutput {
        state,
        controlling: state.is_controlling(),
        origin: worker.routes().origin().to_string(),
        store: worker.store_name().to_string(),
        manifest: worker.manifest().to_vec(),
        routes,
        stores: worker.db().store_names().await?,
    };

    json_result(&output)
}
