//! Inbound control request dispatch
//!
//! Decodes `can_use_tool`, `hook_callback` and `mcp_message` requests, runs the
//! matching local handler, and turns the outcome into a `control_response`
//! document. Handler failures, including panics, become error responses; they
//! never reach the read loop.

use std::panic::AssertUnwindSafe;
use std::sync::OnceLock;

use futures::FutureExt;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::hooks::HookRegistry;
use crate::mcp::ToolServerRouter;
use crate::permissions::PermissionManager;
use crate::types::hooks::{HookContext, HookInput};

use super::protocol::{
    HookCallbackRequest, InboundRequest, McpMessageRequest, RawControlRequest, error_response,
    success_response,
};

/// Routes inbound control requests to local handlers
#[derive(Debug)]
pub struct InboundDispatcher {
    permissions: PermissionManager,
    hooks: OnceLock<HookRegistry>,
    tool_servers: ToolServerRouter,
}

impl InboundDispatcher {
    /// Create a dispatcher; hooks are installed later by [`install_hooks`](Self::install_hooks)
    #[must_use]
    pub fn new(permissions: PermissionManager, tool_servers: ToolServerRouter) -> Self {
        Self {
            permissions,
            hooks: OnceLock::new(),
            tool_servers,
        }
    }

    /// Install the hook registry built during initialization
    ///
    /// # Errors
    /// Returns `AgentError::InvalidState` if a registry is already installed
    pub fn install_hooks(&self, registry: HookRegistry) -> Result<()> {
        self.hooks
            .set(registry)
            .map_err(|_| AgentError::invalid_state("hook registry already installed"))
    }

    /// Installed hook registry, if initialization has happened
    #[must_use]
    pub fn hooks(&self) -> Option<&HookRegistry> {
        self.hooks.get()
    }

    /// Tool servers this dispatcher routes to
    #[must_use]
    pub const fn tool_servers(&self) -> &ToolServerRouter {
        &self.tool_servers
    }

    /// Handle one request and build the `control_response` document to write
    pub async fn respond(&self, request: &RawControlRequest, signal: CancellationToken) -> serde_json::Value {
        let outcome = AssertUnwindSafe(self.dispatch(request, signal))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(AgentError::control_protocol(format!(
                    "handler for {} panicked",
                    request.subtype().unwrap_or("unknown")
                )))
            });

        match outcome {
            Ok(response) => success_response(&request.request_id, response),
            Err(e) => {
                warn!(
                    "control request {} ({}) failed: {e}",
                    request.request_id,
                    request.subtype().unwrap_or("unknown")
                );
                error_response(&request.request_id, &e.to_string())
            }
        }
    }

    /// Run the handler for one request and return its response payload
    ///
    /// # Errors
    /// Returns an error for unknown subtypes, malformed bodies and handler failures
    pub async fn dispatch(
        &self,
        request: &RawControlRequest,
        signal: CancellationToken,
    ) -> Result<serde_json::Value> {
        let decoded = InboundRequest::decode(request).map_err(|e| {
            AgentError::control_protocol(format!(
                "Unsupported control request subtype {}: {e}",
                request.subtype().unwrap_or("<missing>")
            ))
        })?;
        debug!(
            "dispatching {} request {}",
            request.subtype().unwrap_or("unknown"),
            request.request_id
        );

        match decoded {
            InboundRequest::CanUseTool(permission) => {
                let result = self.permissions.decide(&permission, signal).await?;
                Ok(result.to_response(&permission.input))
            }
            InboundRequest::HookCallback(hook) => self.run_hook(hook, signal).await,
            InboundRequest::McpMessage(McpMessageRequest {
                server_name,
                message,
            }) => {
                let reply = self.tool_servers.route(&server_name, message).await;
                Ok(serde_json::json!({ "mcp_response": reply }))
            }
        }
    }

    async fn run_hook(
        &self,
        request: HookCallbackRequest,
        signal: CancellationToken,
    ) -> Result<serde_json::Value> {
        let Some(callback) = self.hooks.get().and_then(|r| r.get(&request.callback_id)) else {
            debug!("no hook registered under {}, continuing", request.callback_id);
            return Ok(serde_json::json!({ "continue": true }));
        };

        let input: HookInput = serde_json::from_value(request.input).map_err(|e| {
            AgentError::hook(format!(
                "Invalid input for hook {}: {e}",
                request.callback_id
            ))
        })?;
        let context = HookContext {
            callback_id: request.callback_id,
            signal,
        };
        let output = callback(input, request.tool_use_id, context).await?;
        Ok(output.to_response())
    }
}
