//! Type definitions for the agent protocol router
//!
//! This module contains the type definitions shared across the crate,
//! organized into logical submodules:
//!
//! - [`identifiers`] - Type-safe ID wrappers (`RequestId`, `HookCallbackId`, `SessionId`, `ToolName`)
//! - [`permissions`] - Permission modes, rules, requests, results and callbacks
//! - [`hooks`] - Hook events, inputs, outputs and callbacks
//! - [`messages`] - Conversation message and content block types
//! - [`options`] - Router configuration

pub mod hooks;
pub mod identifiers;
pub mod messages;
pub mod options;
pub mod permissions;

// Re-export commonly used types
pub use hooks::{
    AsyncHookOutput, BaseHookInput, HookCallback, HookContext, HookDecision, HookEvent, HookInput,
    HookMatcher, HookOutput, SyncHookOutput,
};
pub use identifiers::{HookCallbackId, RequestId, SessionId, ToolName};
pub use messages::{
    AssistantPayload, ContentBlock, ContentValue, Message, UserContent, UserPayload,
};
pub use options::{AgentOptions, AgentOptionsBuilder, InboundDispatch};
pub use permissions::{
    CanUseToolCallback, PermissionBehavior, PermissionMode, PermissionRequest, PermissionResult,
    PermissionResultAllow, PermissionResultDeny, PermissionRuleValue, PermissionUpdate,
    PermissionUpdateDestination, RuleChange, ToolPermissionContext,
};
