//! Tool permission types
//!
//! Inbound `can_use_tool` requests decode into [`PermissionRequest`]; the
//! consumer's callback answers with a [`PermissionResult`], which
//! [`PermissionResult::to_response`] turns into the wire payload.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::identifiers::ToolName;
use crate::error::Result;

/// How the agent gates tool use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Ask before dangerous tools
    Default,
    /// File edits are accepted without asking
    AcceptEdits,
    /// Plan only, run nothing
    Plan,
    /// Every tool runs without asking
    BypassPermissions,
}

impl PermissionMode {
    /// Wire spelling used by CLI flags and `set_permission_mode`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

/// Settings scope a permission update is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionUpdateDestination {
    /// Per-user settings
    UserSettings,
    /// Checked-in project settings
    ProjectSettings,
    /// Uncommitted local project settings
    LocalSettings,
    /// Current session only
    Session,
}

/// What a rule does when it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionBehavior {
    /// Run the tool
    Allow,
    /// Refuse the tool
    Deny,
    /// Prompt
    Ask,
}

/// One rule: a tool name plus optional rule content such as a command prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRuleValue {
    /// Tool the rule covers
    pub tool_name: String,
    /// Rule body, tool specific
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_content: Option<String>,
}

/// Rule edit carried by the `addRules`, `replaceRules` and `removeRules` updates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleChange {
    /// Rules affected
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<PermissionRuleValue>,
    /// Behavior the rules grant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<PermissionBehavior>,
    /// Settings scope the edit applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PermissionUpdateDestination>,
}

/// Settings change suggested by the agent or returned from a permission callback
///
/// The router never applies these itself; they are relayed verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PermissionUpdate {
    /// Append rules
    AddRules(RuleChange),
    /// Replace the rules of a scope
    ReplaceRules(RuleChange),
    /// Drop rules
    RemoveRules(RuleChange),
    /// Switch the permission mode
    SetMode {
        /// Mode to switch to
        mode: PermissionMode,
        /// Settings scope
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Grant access to more directories
    AddDirectories {
        /// Directories granted
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        directories: Vec<String>,
        /// Settings scope
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Revoke directory access
    RemoveDirectories {
        /// Directories revoked
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        directories: Vec<String>,
        /// Settings scope
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
}

/// Inbound `can_use_tool` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    /// Tool the agent wants to run
    pub tool_name: ToolName,
    /// Requested input
    #[serde(default, alias = "tool_input")]
    pub input: serde_json::Value,
    /// Rule updates the agent suggests for "always allow" style answers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission_suggestions: Vec<PermissionUpdate>,
    /// Path outside the allowed directories that triggered the check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_path: Option<String>,
    /// Tool use the check belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
}

/// Context handed to a permission callback
#[derive(Debug, Clone)]
pub struct ToolPermissionContext {
    /// Rule changes the agent suggests
    pub suggestions: Vec<PermissionUpdate>,
    /// Path hint when the check was triggered by a blocked path
    pub blocked_path: Option<String>,
    /// Cancelled when the agent withdraws the request or the router is disposed
    pub signal: CancellationToken,
}

/// Allow answer, optionally rewriting the input or adding rules
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionResultAllow {
    /// Input to run with instead of the requested one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_input: Option<serde_json::Value>,
    /// Rule changes to relay with the answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_permissions: Option<Vec<PermissionUpdate>>,
}

/// Deny answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionResultDeny {
    /// Reason shown to the model
    pub message: String,
    /// Also stop the current turn
    #[serde(default)]
    pub interrupt: bool,
}

/// Answer of a permission callback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PermissionResult {
    /// Run the tool
    Allow(PermissionResultAllow),
    /// Refuse the tool
    Deny(PermissionResultDeny),
}

impl PermissionResult {
    /// Allow with the original input
    #[must_use]
    pub fn allow() -> Self {
        Self::Allow(PermissionResultAllow::default())
    }

    /// Deny without interrupting the session
    pub fn deny(message: impl Into<String>) -> Self {
        Self::Deny(PermissionResultDeny {
            message: message.into(),
            interrupt: false,
        })
    }

    /// Deny and interrupt the session
    pub fn deny_and_interrupt(message: impl Into<String>) -> Self {
        Self::Deny(PermissionResultDeny {
            message: message.into(),
            interrupt: true,
        })
    }

    /// Wire payload answering a `can_use_tool` request
    ///
    /// An allow without modified input echoes the original input back,
    /// because the agent treats `updatedInput` as the input to run with.
    #[must_use]
    pub fn to_response(&self, original_input: &serde_json::Value) -> serde_json::Value {
        match self {
            Self::Allow(allow) => {
                let mut response = serde_json::json!({
                    "behavior": "allow",
                    "updatedInput": allow
                        .updated_input
                        .clone()
                        .unwrap_or_else(|| original_input.clone()),
                });
                if let Some(ref updates) = allow.updated_permissions {
                    response["updatedPermissions"] =
                        serde_json::to_value(updates).unwrap_or_default();
                }
                response
            }
            Self::Deny(deny) => serde_json::json!({
                "behavior": "deny",
                "message": deny.message,
                "interrupt": deny.interrupt,
            }),
        }
    }
}

/// Consumer callback deciding `can_use_tool` requests
pub type CanUseToolCallback = Arc<
    dyn Fn(
            ToolName,
            serde_json::Value,
            ToolPermissionContext,
        ) -> Pin<Box<dyn Future<Output = Result<PermissionResult>> + Send>>
        + Send
        + Sync,
>;
