//! Tool permission decisions
//!
//! The agent asks before running a tool by sending a `can_use_tool` control
//! request. [`PermissionManager`] hands the request to the host's callback, or
//! allows it unchanged when no callback is configured.
//!
//! # Example
//!
//! ```rust
//! use kodegen_agent_protocol::permissions::PermissionManager;
//! use kodegen_agent_protocol::types::PermissionResult;
//!
//! let manager = PermissionManager::new(Some(PermissionManager::callback(
//!     |tool_name, _input, _context| async move {
//!         if tool_name.as_str() == "Bash" {
//!             Ok(PermissionResult::deny("shell access is disabled"))
//!         } else {
//!             Ok(PermissionResult::allow())
//!         }
//!     },
//! )));
//! assert!(manager.has_callback());
//! ```

use std::sync::Arc;

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::types::identifiers::ToolName;
use crate::types::permissions::{
    CanUseToolCallback, PermissionRequest, PermissionResult, ToolPermissionContext,
};

/// Decides `can_use_tool` requests
#[derive(Clone, Default)]
pub struct PermissionManager {
    callback: Option<CanUseToolCallback>,
}

impl PermissionManager {
    /// Create a manager around an optional callback
    #[must_use]
    pub fn new(callback: Option<CanUseToolCallback>) -> Self {
        Self { callback }
    }

    /// Whether a callback is configured
    #[must_use]
    pub const fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Decide one request
    ///
    /// `signal` is passed to the callback and fires when the agent withdraws
    /// the request or the router shuts down.
    ///
    /// # Errors
    /// Propagates the callback's error
    pub async fn decide(
        &self,
        request: &PermissionRequest,
        signal: CancellationToken,
    ) -> Result<PermissionResult> {
        let Some(callback) = &self.callback else {
            debug!("no permission callback, allowing {}", request.tool_name);
            return Ok(PermissionResult::allow());
        };

        let context = ToolPermissionContext {
            suggestions: request.permission_suggestions.clone(),
            blocked_path: request.blocked_path.clone(),
            signal,
        };
        let result = callback(request.tool_name.clone(), request.input.clone(), context).await?;
        debug!(
            "permission for {}: {}",
            request.tool_name,
            match result {
                PermissionResult::Allow(_) => "allow",
                PermissionResult::Deny(_) => "deny",
            }
        );
        Ok(result)
    }

    /// Create a permission callback from a closure
    pub fn callback<F, Fut>(f: F) -> CanUseToolCallback
    where
        F: Fn(ToolName, serde_json::Value, ToolPermissionContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<PermissionResult>> + Send + 'static,
    {
        Arc::new(move |tool_name, input, context| Box::pin(f(tool_name, input, context)))
    }
}

impl std::fmt::Debug for PermissionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionManager")
            .field("callback", &self.callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}
