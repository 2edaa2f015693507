//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::cache::{
    CacheFetchParams, CacheGetParams, CacheLifecycleParams, CachePurgeParams, fetch_impl, get_impl, lifecycle_impl,
    purge_impl,
};
use crate::tools::push::{PushNotifyParams, push_impl};
use crate::tools::replay::{ReplayEnqueueParams, ReplaySyncParams, enqueue_impl, sync_impl};

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
use std::sync::Arc;
use waystation_client::CacheCoordinator;

/// The main MCP server handler for waystation.
#[derive(Clone)]
pub struct WaystationServer {
    tool_router: ToolRouter<Self>,
    coordinator: Arc<CacheCoordinator>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl WaystationServer {
    /// Create a new server handler around a coordinator.
    pub fn new(coordinator: Arc<CacheCoordinator>) -> Self {
        Self { tool_router: Self::tool_router(), coordinator }
    }

    #[tool(
        description = "Send a request through the offline cache coordinator. Reports the route, which tier answered (network, cache, cached_copy, offline_document, synthetic), the status and the body."
    )]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.coordinator, params.0).await
    }

    #[tool(
        description = "Drive the worker lifecycle: install (precache the manifest), activate (drop stale partitions, start intercepting), install_and_activate, or status."
    )]
    async fn cache_lifecycle(&self, params: Parameters<CacheLifecycleParams>) -> Result<CallToolResult, McpError> {
        lifecycle_impl(&self.coordinator, params.0).await
    }

    #[tool(description = "Read a stored response from a cache partition, or list the partition's URLs when no url is given.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.coordinator, params.0).await
    }

    #[tool(description = "Trim a cache partition by age (older_than_days) or count (max_entries, oldest first).")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.coordinator, params.0).await
    }

    #[tool(description = "Queue a write made while offline for ordered background replay.")]
    async fn replay_enqueue(&self, params: Parameters<ReplayEnqueueParams>) -> Result<CallToolResult, McpError> {
        enqueue_impl(&self.coordinator, params.0).await
    }

    #[tool(
        description = "Fire a background sync event. Drains the replay queue when the tag matches and reports pending and dead-lettered actions."
    )]
    async fn replay_sync(&self, params: Parameters<ReplaySyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.coordinator, params.0).await
    }

    #[tool(description = "Translate a push message body into a notification, optionally resolving a click on it.")]
    async fn push_notify(&self, params: Parameters<PushNotifyParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.coordinator, params.0).await
    }
}

impl ServerHandler for WaystationServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "waystation".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::coordinator;

    #[tokio::test]
    async fn test_all_tools_listed() {
        let (coordinator, _) = coordinator().await;
        let server = WaystationServer::new(coordinator);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();

        assert_eq!(
            names,
            vec![
                "cache_fetch",
                "cache_get",
                "cache_lifecycle",
                "cache_purge",
                "push_notify",
                "replay_enqueue",
                "replay_sync"
            ]
        );
    }
}
