//! sw_fetch tool implementation.
//!
//! Delivers one intercepted request to the worker. When a cached response
//! is returned while a refresh runs, the refresh is left to finish in the
//! background; the next call observes its result.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{ResponseSource, Route, ServiceWorker};

use super::{build_request, json_result};

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the controlled origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests consult the cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, sent as UTF-8.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8; invalid sequences are replaced.
    pub body: String,
    /// Where the response came from.
    pub source: ResponseSource,
    /// How the request was classified.
    pub route: Route,
    /// True when a background refresh was started for a cached response.
    pub revalidating: bool,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(worker: &ServiceWorker, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(worker, &params.url, &params.method, params.headers, params.body)?;
    let url = request.url.to_string();

    let outcome = worker.handle_fetch(request).await?;

    let output = SwFetchOutput {
        url,
        status: outcome.response.status,
        headers: outcome.response.headers,
        body: String::from_utf8_lossy(&outcome.response.body).into_owned(),
        source: outcome.source,
        route: outcome.route,
        revalidating: outcome.revalidation.is_some(),
    };

    json_result(&output)
}
