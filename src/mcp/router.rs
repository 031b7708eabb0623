//! Routes `mcp_message` payloads to named tool servers

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, warn};

use super::ToolServer;
use super::protocol::{JsonRpcRequest, JsonRpcResponse, McpError};

/// Static map from server name to tool server, fixed at construction
#[derive(Clone, Default)]
pub struct ToolServerRouter {
    servers: HashMap<String, Arc<dyn ToolServer>>,
}

impl ToolServerRouter {
    /// Build a router over the given servers
    #[must_use]
    pub fn new(servers: HashMap<String, Arc<dyn ToolServer>>) -> Self {
        Self { servers }
    }

    /// Whether a server is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.servers.contains_key(name)
    }

    /// Registered server names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.servers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether no servers are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Forward a JSON-RPC message and return the JSON-RPC reply
    ///
    /// Always produces a response carrying the message's original id. An
    /// unknown server yields -32601 and a failing or panicking server yields
    /// -32603.
    pub async fn route(&self, server_name: &str, message: serde_json::Value) -> serde_json::Value {
        let id = message
            .get("id")
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let Some(server) = self.servers.get(server_name) else {
            warn!("mcp_message for unknown tool server '{server_name}'");
            return JsonRpcResponse::error(id, McpError::server_not_found(server_name)).to_value();
        };

        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    McpError::invalid_request(format!("Invalid JSON-RPC message: {e}")),
                )
                .to_value();
            }
        };

        debug!("routing {} to tool server '{server_name}'", request.method);
        match AssertUnwindSafe(server.handle(request)).catch_unwind().await {
            Ok(Ok(response)) => response.to_value(),
            Ok(Err(e)) => {
                warn!("tool server '{server_name}' failed: {e}");
                JsonRpcResponse::error(id, McpError::internal_error(e.to_string())).to_value()
            }
            Err(_) => {
                warn!("tool server '{server_name}' panicked");
                JsonRpcResponse::error(
                    id,
                    McpError::internal_error(format!("Tool server '{server_name}' panicked")),
                )
                .to_value()
            }
        }
    }
}

impl std::fmt::Debug for ToolServerRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolServerRouter")
            .field("servers", &self.names())
            .finish()
    }
}
