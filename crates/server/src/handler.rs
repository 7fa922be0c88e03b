//! MCP server handler implementation.
//!
//! Each tool is one host lifecycle event delivered to the shared
//! `ServiceWorker`.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swcache_core::ServiceWorker;

use crate::tools::{
    CacheListParams, NotificationClickParams, SwFetchParams, SwQueueParams, SwSyncParams, activate_impl, fetch_impl,
    install_impl, list_impl, notification_click_impl, queue_impl, status_impl, sync_impl,
};

/// The main MCP server handler for sw-cache.
#[derive(Clone)]
pub struct SwCacheServer {
    worker: Arc<ServiceWorker>,
    sync_tag: String,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SwCacheServer {
    /// Create a handler over `worker`. `sync_tag` is used when a queue or
    /// sync call does not name one.
    pub fn new(worker: Arc<ServiceWorker>, sync_tag: String) -> Self {
        Self { worker, sync_tag, tool_router: Self::tool_router() }
    }

    #[tool(description = "Install event: pre-cache the asset manifest into the versioned store. \
                          Fails without writing anything if any asset cannot be fetched.")]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker).await
    }

    #[tool(description = "Activate event: delete every cache store except the current version's.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    /// Fetch event.
    ///
    /// Routes the request through network-first, cache-first or
    /// stale-while-revalidate depending on its path; cross-origin and
    /// non-GET requests go straight to the network.
    #[tool(description = "Fetch event: answer a request from the cache and/or network according to its route. \
                          Returns status, headers, body, response source and route.")]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Park a form submission that failed offline for replay on the next sync.")]
    async fn sw_queue(&self, params: Parameters<SwQueueParams>) -> Result<CallToolResult, McpError> {
        queue_impl(&self.worker, &self.sync_tag, params.0).await
    }

    #[tool(description = "Background sync event: resubmit every parked request for the tag, oldest first. \
                          Successful submissions are removed; failures stay queued.")]
    async fn sw_sync(&self, params: Parameters<SwSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.worker, &self.sync_tag, params.0).await
    }

    #[tool(description = "Notification click event: resolve the same-origin window to focus or open.")]
    async fn sw_notification_click(
        &self, params: Parameters<NotificationClickParams>,
    ) -> Result<CallToolResult, McpError> {
        notification_click_impl(&self.worker, params.0).await
    }

    #[tool(description = "List cache stores and the URLs stored in each.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.worker, params.0).await
    }

    #[tool(description = "Report lifecycle state, current store, manifest and routing rules.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "sw-cache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
