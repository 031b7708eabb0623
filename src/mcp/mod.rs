//! In-process tool servers reachable through `mcp_message` control requests
//!
//! The agent addresses a server by name and sends it a JSON-RPC message; the
//! router forwards it to the matching [`ToolServer`] and writes the JSON-RPC
//! reply back inside the control response.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kodegen_agent_protocol::mcp::{SdkMcpServer, SdkMcpTool, ToolResult};
//! use kodegen_agent_protocol::types::AgentOptions;
//! use serde_json::json;
//!
//! let server = SdkMcpServer::new("greeter").tool(SdkMcpTool::new(
//!     "greet",
//!     "Greet someone",
//!     json!({"type": "object", "properties": {"name": {"type": "string"}}}),
//!     |input| async move {
//!         Ok(ToolResult::text(format!("Hello, {}!", input["name"].as_str().unwrap_or("world"))))
//!     },
//! ));
//!
//! let options = AgentOptions::builder()
//!     .tool_server("greeter", Arc::new(server))
//!     .build();
//! assert!(options.tool_servers.contains_key("greeter"));
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

pub mod protocol;
pub mod router;
pub mod server;
pub mod tool;

pub use protocol::{JsonRpcRequest, JsonRpcResponse, McpError};
pub use router::ToolServerRouter;
pub use server::SdkMcpServer;
pub use tool::{SdkMcpTool, ToolContent, ToolHandler, ToolResult};

/// A server answering JSON-RPC messages in process
///
/// Implementations report protocol problems as JSON-RPC error responses and
/// return `Err` only when they cannot produce a response at all; the router
/// turns such errors into an internal-error (-32603) reply.
pub trait ToolServer: Send + Sync {
    /// Server name announced to the agent
    fn name(&self) -> &str;

    /// Handle one JSON-RPC request or notification
    fn handle<'a>(
        &'a self,
        request: JsonRpcRequest,
    ) -> Pin<Box<dyn Future<Output = Result<JsonRpcResponse>> + Send + 'a>>;
}
