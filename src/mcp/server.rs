//! In-process MCP server hosting [`SdkMcpTool`]s

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use log::debug;

use super::ToolServer;
use super::protocol::{JsonRpcRequest, JsonRpcResponse, McpError};
use super::tool::SdkMcpTool;
use crate::error::Result;

/// MCP protocol revision reported from `initialize`
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Tool server answering `initialize`, `tools/list` and `tools/call`
///
/// # Example
///
/// ```rust
/// use kodegen_agent_protocol::mcp::{SdkMcpServer, SdkMcpTool, ToolResult};
/// use serde_json::json;
///
/// let server = SdkMcpServer::new("calculator").version("2.0.0").tool(SdkMcpTool::new(
///     "add",
///     "Add two numbers",
///     json!({"type": "object", "properties": {"a": {"type": "number"}, "b": {"type": "number"}}}),
///     |input| async move {
///         let sum = input["a"].as_f64().unwrap_or(0.0) + input["b"].as_f64().unwrap_or(0.0);
///         Ok(ToolResult::text(sum.to_string()))
///     },
/// ));
/// assert!(server.get_tool("add").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct SdkMcpServer {
    name: String,
    version: String,
    tools: BTreeMap<String, SdkMcpTool>,
}

impl SdkMcpServer {
    /// Create an empty server
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            tools: BTreeMap::new(),
        }
    }

    /// Set the version reported from `initialize`
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Register a tool, replacing any tool with the same name
    #[must_use]
    pub fn tool(mut self, tool: SdkMcpTool) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Register several tools
    #[must_use]
    pub fn tools(self, tools: impl IntoIterator<Item = SdkMcpTool>) -> Self {
        tools.into_iter().fold(self, Self::tool)
    }

    /// Server version
    #[must_use]
    pub fn server_version(&self) -> &str {
        &self.version
    }

    /// Look up a tool
    #[must_use]
    pub fn get_tool(&self, name: &str) -> Option<&SdkMcpTool> {
        self.tools.get(name)
    }

    /// Registered tools in name order
    pub fn list_tools(&self) -> impl Iterator<Item = &SdkMcpTool> {
        self.tools.values()
    }

    /// Answer one JSON-RPC request
    ///
    /// Protocol-level problems become JSON-RPC error responses; a failing tool
    /// becomes a successful response whose result is flagged `isError`.
    ///
    /// # Errors
    /// Never fails today; the `Result` matches [`ToolServer::handle`]
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let id = request.response_id();
        debug!("tool server '{}' handling {}", self.name, request.method);

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                serde_json::json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": self.name, "version": self.version },
                }),
            ),
            "notifications/initialized" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => {
                let tools: Vec<_> = self.tools.values().map(SdkMcpTool::descriptor).collect();
                JsonRpcResponse::success(id, serde_json::json!({ "tools": tools }))
            }
            "tools/call" => self.call_tool(id, request.params).await,
            other => JsonRpcResponse::error(id, McpError::method_not_found(other)),
        };
        Ok(response)
    }

    async fn call_tool(
        &self,
        id: serde_json::Value,
        params: Option<serde_json::Value>,
    ) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(id, McpError::invalid_params("Missing params"));
        };
        let Some(tool_name) = params.get("name").and_then(serde_json::Value::as_str) else {
            return JsonRpcResponse::error(id, McpError::invalid_params("Missing tool name"));
        };
        let Some(tool) = self.tools.get(tool_name) else {
            return JsonRpcResponse::error(id, McpError::tool_not_found(tool_name));
        };

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        match tool.invoke(arguments).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::error(
                    id,
                    McpError::internal_error(format!("Failed to serialize tool result: {e}")),
                ),
            },
            Err(e) => JsonRpcResponse::success(
                id,
                serde_json::json!({
                    "content": [{ "type": "text", "text": e.to_string() }],
                    "isError": true,
                }),
            ),
        }
    }
}

impl ToolServer for SdkMcpServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle<'a>(
        &'a self,
        request: JsonRpcRequest,
    ) -> Pin<Box<dyn Future<Output = Result<JsonRpcResponse>> + Send + 'a>> {
        Box::pin(self.handle_request(request))
    }
}
