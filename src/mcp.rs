//! MCP JSON-RPC protocol bridge.
//!
//! Adapts the [`ToolRegistry`] to the Model Context Protocol so MCP clients
//! (Claude Desktop, Cursor, and others) can discover and call the search
//! tools. The same [`McpBridge`] serves both transports:
//!
//! * **stdio**: [`serve_stdio`], for clients that spawn `wzs serve stdio`.
//! * **Streamable HTTP**: mounted at `/mcp` by [`crate::server`].
//!
//! Tool results are returned as a single pretty-printed JSON text block.
//! Failures come back as an error result whose text is
//! `{ "error": "<message>" }`.

use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, ServiceExt};

use crate::tools::{error_payload, ToolContext, ToolRegistry};

/// Bridges the tool registry to the MCP JSON-RPC protocol.
///
/// Each MCP session receives a clone of this struct (everything is behind
/// `Arc`), so all sessions share one tool set and one backend handle.
#[derive(Clone)]
pub struct McpBridge {
    ctx: ToolContext,
    tools: Arc<ToolRegistry>,
}

impl McpBridge {
    pub fn new(ctx: ToolContext, tools: Arc<ToolRegistry>) -> Self {
        Self { ctx, tools }
    }

    /// Convert a registry tool into an rmcp `Tool` descriptor.
    fn to_mcp_tool(tool: &dyn crate::tools::Tool) -> Tool {
        let schema_value = tool.parameters_schema();
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> = match schema_value {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Owned(tool.name().to_string()),
            title: None,
            description: Some(Cow::Owned(tool.description().to_string())),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(true)),
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "wazuh-opensearch".to_string(),
                title: Some("Wazuh Search".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Read-only search over Wazuh data in OpenSearch. Use search_raw_logs for \
                 archived events, search_alerts for alerts above a severity level, \
                 get_agent_data to look up one agent by id or name, and \
                 search_vulnerabilities for vulnerability-detector findings. \
                 Queries use OpenSearch query_string syntax; time ranges are relative \
                 (1h, 24h, 7d)."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = self
            .tools
            .tools()
            .iter()
            .map(|t| Self::to_mcp_tool(t.as_ref()))
            .collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        self.tools.find(name).map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool = self.tools.find(&request.name).ok_or_else(|| {
            McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            )
        })?;

        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        tracing::debug!(tool = %request.name, "mcp tool call");
        match tool.execute(params, &self.ctx).await {
            Ok(result) => {
                let text = serde_json::to_string_pretty(&result).unwrap_or_default();
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(
                error_payload(&e).to_string(),
            )])),
        }
    }
}

/// Serve MCP over stdin/stdout until the client disconnects.
///
/// Stdout carries the protocol, so logging must go to stderr.
pub async fn serve_stdio(bridge: McpBridge) -> anyhow::Result<()> {
    tracing::info!("MCP server ready on stdio");
    let service = bridge.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
