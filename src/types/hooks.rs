//! Hook-related type definitions
//!
//! This module contains types for managing hooks, including hook events,
//! the event-specific inputs the agent sends, hook outputs, and hook callbacks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::identifiers::HookCallbackId;
use crate::error::Result;

// ============================================================================
// Hook Events
// ============================================================================

/// Hook event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HookEvent {
    /// Before a tool is used
    PreToolUse,
    /// After a tool is used
    PostToolUse,
    /// After a tool call failed
    PostToolUseFailure,
    /// When user submits a prompt
    UserPromptSubmit,
    /// When conversation stops
    Stop,
    /// When a subagent starts
    SubagentStart,
    /// When a subagent stops
    SubagentStop,
    /// Before compacting the conversation
    PreCompact,
    /// When the agent emits a notification
    Notification,
    /// When a session starts or resumes
    SessionStart,
    /// When a session ends
    SessionEnd,
    /// When the agent is about to show a permission prompt
    PermissionRequest,
}

impl HookEvent {
    /// Event name as it appears on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::PostToolUseFailure => "PostToolUseFailure",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::Stop => "Stop",
            Self::SubagentStart => "SubagentStart",
            Self::SubagentStop => "SubagentStop",
            Self::PreCompact => "PreCompact",
            Self::Notification => "Notification",
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
            Self::PermissionRequest => "PermissionRequest",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Hook Inputs
// ============================================================================

/// Fields shared by every hook input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseHookInput {
    /// Session the event belongs to
    #[serde(default)]
    pub session_id: String,
    /// Path of the session transcript
    #[serde(default)]
    pub transcript_path: String,
    /// Working directory of the agent
    #[serde(default)]
    pub cwd: String,
    /// Active permission mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
}

/// Event-specific hook input, selected by `hook_event_name`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "hook_event_name")]
pub enum HookInput {
    /// Input for [`HookEvent::PreToolUse`]
    PreToolUse {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// Tool about to run
        tool_name: String,
        /// Tool input
        #[serde(default)]
        tool_input: serde_json::Value,
    },
    /// Input for [`HookEvent::PostToolUse`]
    PostToolUse {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// Tool that ran
        tool_name: String,
        /// Tool input
        #[serde(default)]
        tool_input: serde_json::Value,
        /// Tool output
        #[serde(default)]
        tool_response: serde_json::Value,
    },
    /// Input for [`HookEvent::PostToolUseFailure`]
    PostToolUseFailure {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// Tool that failed
        tool_name: String,
        /// Tool input
        #[serde(default)]
        tool_input: serde_json::Value,
        /// Failure description
        #[serde(default)]
        error: String,
        /// Whether the failure came from a user interrupt
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_interrupt: Option<bool>,
    },
    /// Input for [`HookEvent::UserPromptSubmit`]
    UserPromptSubmit {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// Submitted prompt
        prompt: String,
    },
    /// Input for [`HookEvent::Stop`]
    Stop {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// Whether a stop hook is already continuing the turn
        #[serde(default)]
        stop_hook_active: bool,
    },
    /// Input for [`HookEvent::SubagentStart`]
    SubagentStart {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// Subagent id
        #[serde(default)]
        agent_id: String,
        /// Subagent type
        #[serde(default)]
        agent_type: String,
    },
    /// Input for [`HookEvent::SubagentStop`]
    SubagentStop {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// Whether a stop hook is already continuing the turn
        #[serde(default)]
        stop_hook_active: bool,
        /// Subagent id
        #[serde(default, skip_serializing_if = "Option::is_none")]
        agent_id: Option<String>,
    },
    /// Input for [`HookEvent::PreCompact`]
    PreCompact {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// `manual` or `auto`
        trigger: String,
        /// Instructions supplied with a manual compaction
        #[serde(default, skip_serializing_if = "Option::is_none")]
        custom_instructions: Option<String>,
    },
    /// Input for [`HookEvent::Notification`]
    Notification {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// Notification text
        message: String,
        /// Notification title
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    /// Input for [`HookEvent::SessionStart`]
    SessionStart {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// `startup`, `resume`, `clear` or `compact`
        source: String,
    },
    /// Input for [`HookEvent::SessionEnd`]
    SessionEnd {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// Why the session ended
        reason: String,
    },
    /// Input for [`HookEvent::PermissionRequest`]
    PermissionRequest {
        /// Shared fields
        #[serde(flatten)]
        base: BaseHookInput,
        /// Tool awaiting permission
        tool_name: String,
        /// Tool input
        #[serde(default)]
        tool_input: serde_json::Value,
    },
}

impl HookInput {
    /// Event this input belongs to
    #[must_use]
    pub const fn event(&self) -> HookEvent {
        match self {
            Self::PreToolUse { .. } => HookEvent::PreToolUse,
            Self::PostToolUse { .. } => HookEvent::PostToolUse,
            Self::PostToolUseFailure { .. } => HookEvent::PostToolUseFailure,
            Self::UserPromptSubmit { .. } => HookEvent::UserPromptSubmit,
            Self::Stop { .. } => HookEvent::Stop,
            Self::SubagentStart { .. } => HookEvent::SubagentStart,
            Self::SubagentStop { .. } => HookEvent::SubagentStop,
            Self::PreCompact { .. } => HookEvent::PreCompact,
            Self::Notification { .. } => HookEvent::Notification,
            Self::SessionStart { .. } => HookEvent::SessionStart,
            Self::SessionEnd { .. } => HookEvent::SessionEnd,
            Self::PermissionRequest { .. } => HookEvent::PermissionRequest,
        }
    }

    /// Tool name for tool-scoped events
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::PreToolUse { tool_name, .. }
            | Self::PostToolUse { tool_name, .. }
            | Self::PostToolUseFailure { tool_name, .. }
            | Self::PermissionRequest { tool_name, .. } => Some(tool_name),
            _ => None,
        }
    }

    /// Shared fields
    #[must_use]
    pub const fn base(&self) -> &BaseHookInput {
        match self {
            Self::PreToolUse { base, .. }
            | Self::PostToolUse { base, .. }
            | Self::PostToolUseFailure { base, .. }
            | Self::UserPromptSubmit { base, .. }
            | Self::Stop { base, .. }
            | Self::SubagentStart { base, .. }
            | Self::SubagentStop { base, .. }
            | Self::PreCompact { base, .. }
            | Self::Notification { base, .. }
            | Self::SessionStart { base, .. }
            | Self::SessionEnd { base, .. }
            | Self::PermissionRequest { base, .. } => base,
        }
    }
}

// ============================================================================
// Hook Outputs
// ============================================================================

/// Hook decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookDecision {
    /// Approve the action
    Approve,
    /// Block the action
    Block,
}

/// Output of a hook that finished its work before returning
///
/// Every field is optional and omitted from the wire when unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncHookOutput {
    /// Whether the agent should continue after the hook
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_: Option<bool>,
    /// Hide the hook's stdout from the transcript
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppress_output: Option<bool>,
    /// Message shown when `continue` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// Decision to block or approve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<HookDecision>,
    /// System message to add
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    /// Reason attached to the decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Hook-specific output data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<serde_json::Value>,
}

/// Output of a hook that defers its result
#[derive(Debug, Clone, Default)]
pub struct AsyncHookOutput {
    /// How long the agent should wait for the deferred result
    pub async_timeout: Option<Duration>,
}

/// Hook output
#[derive(Debug, Clone)]
pub enum HookOutput {
    /// Finished output with continue/decision flags
    Sync(SyncHookOutput),
    /// Deferred output the agent polls later
    Async(AsyncHookOutput),
}

impl Default for HookOutput {
    fn default() -> Self {
        Self::Sync(SyncHookOutput::default())
    }
}

impl HookOutput {
    /// Plain "continue" output
    #[must_use]
    pub fn proceed() -> Self {
        Self::Sync(SyncHookOutput {
            continue_: Some(true),
            ..SyncHookOutput::default()
        })
    }

    /// Block the action with a reason
    pub fn block(reason: impl Into<String>) -> Self {
        Self::Sync(SyncHookOutput {
            decision: Some(HookDecision::Block),
            reason: Some(reason.into()),
            ..SyncHookOutput::default()
        })
    }

    /// Wire payload answering a `hook_callback` request
    #[must_use]
    pub fn to_response(&self) -> serde_json::Value {
        match self {
            Self::Sync(output) => serde_json::to_value(output).unwrap_or_default(),
            Self::Async(output) => {
                let mut response = serde_json::json!({ "async": true });
                if let Some(timeout) = output.async_timeout {
                    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    response["asyncTimeout"] = serde_json::json!(millis);
                }
                response
            }
        }
    }
}

// ============================================================================
// Hook Callbacks
// ============================================================================

/// Context for hook callbacks
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Registry id the agent used to address this callback
    pub callback_id: HookCallbackId,
    /// Cancelled when the agent withdraws the request or the router is disposed
    pub signal: CancellationToken,
}

/// Hook callback type
pub type HookCallback = Arc<
    dyn Fn(
            HookInput,
            Option<String>,
            HookContext,
        ) -> Pin<Box<dyn Future<Output = Result<HookOutput>> + Send>>
        + Send
        + Sync,
>;

/// Hook matcher configuration
#[derive(Clone)]
pub struct HookMatcher {
    /// Matcher pattern (e.g., tool name like "Bash" or pattern like "Write|Edit")
    pub matcher: Option<String>,
    /// List of hook callbacks
    pub hooks: Vec<HookCallback>,
    /// How long the agent waits for each callback of this matcher
    pub timeout: Option<Duration>,
}

impl fmt::Debug for HookMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookMatcher")
            .field("matcher", &self.matcher)
            .field("hooks", &format!("[{} callbacks]", self.hooks.len()))
            .field("timeout", &self.timeout)
            .finish()
    }
}
