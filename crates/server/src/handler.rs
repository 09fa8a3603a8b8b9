//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use url::Url;

use crate::registration::Registration;
use crate::tools::cache::{CacheGetParams, get_impl, list_impl};
use crate::tools::{WorkerFetchParams, activate_impl, fetch_impl, install_impl};

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

/// The main MCP server handler for keepsake.
#[derive(Clone)]
pub struct KeepsakeServer {
    registration: Arc<Registration>,
    origin: Url,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl KeepsakeServer {
    /// Create a new server handler around a started registration.
    pub fn new(registration: Arc<Registration>, origin: Url) -> Self {
        Self { registration, origin, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Install the offline worker: pre-cache every manifest asset into the current cache generation, then activate. Returns stored and failed assets."
    )]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.registration).await
    }

    #[tool(description = "Activate the installed worker: delete every cache generation except the current one.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.registration).await
    }

    /// Route one page request through the worker.
    ///
    /// Paths containing /Videos/ or /Photos/ are served cache-first, everything else network-first.
    #[tool(
        description = "Fetch a URL the way the invitation page would. Media is served cache-first, everything else network-first with the cache as offline fallback. Relative URLs resolve against the page origin."
    )]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, &self.origin, params.0).await
    }

    #[tool(description = "List cache generations with their entry counts and the current worker state.")]
    async fn cache_list(&self) -> Result<CallToolResult, McpError> {
        list_impl(&self.registration).await
    }

    #[tool(description = "Get a stored response from the current cache generation by URL. Returns CACHE_MISS if absent.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.registration, &self.origin, params.0).await
    }
}

impl ServerHandler for KeepsakeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "keepsake".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Offline asset cache for the wedding invitation page. Call worker_install once, then worker_fetch to serve requests.".into(),
            ),
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
