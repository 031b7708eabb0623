//! Router options and configuration
//!
//! This module contains the configuration for a protocol router session,
//! including a builder pattern for easy configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::hooks::{HookEvent, HookMatcher};
use super::identifiers::ToolName;
use super::permissions::{CanUseToolCallback, PermissionMode};
use crate::error::{AgentError, Result};
use crate::mcp::ToolServer;

/// Default deadline for outbound control requests
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default capacity of the conversation output queue
pub const DEFAULT_MESSAGE_BUFFER_CAPACITY: usize = 100;

/// Default bounded wait for the read loop to stop during disposal
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How inbound control requests are scheduled relative to the read loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InboundDispatch {
    /// Await each handler inside the read loop before reading the next document
    ///
    /// A slow handler delays every message behind it, and a handler that issues
    /// its own control request will wait for its deadline, since the response
    /// can only be read once the handler returns.
    #[default]
    Sequential,
    /// Spawn each handler as its own task; responses may be written out of order
    Concurrent,
}

// ============================================================================
// Agent Options
// ============================================================================

/// Main options for a router session
#[derive(Clone)]
pub struct AgentOptions {
    /// Deadline for each outbound control request
    pub control_timeout: Duration,
    /// Capacity of the output queue; the read loop blocks when it is full
    pub message_buffer_capacity: usize,
    /// Bounded wait for the read loop during disposal
    pub shutdown_grace: Duration,
    /// Complete the output queue after the first non-partial result message
    pub complete_on_terminal_result: bool,
    /// Scheduling of inbound control requests
    pub inbound_dispatch: InboundDispatch,
    /// Callback for tool permission checks
    pub can_use_tool: Option<CanUseToolCallback>,
    /// Hook configurations, registered once at initialization
    pub hooks: HashMap<HookEvent, Vec<HookMatcher>>,
    /// In-process tool servers keyed by server name
    pub tool_servers: HashMap<String, Arc<dyn ToolServer>>,
    /// Path to the agent CLI (searched on PATH when unset)
    pub cli_path: Option<PathBuf>,
    /// Working directory for the CLI process
    pub cwd: Option<PathBuf>,
    /// Environment variables for the CLI process
    pub env: HashMap<String, String>,
    /// AI model to use
    pub model: Option<String>,
    /// Permission mode for tool execution
    pub permission_mode: Option<PermissionMode>,
    /// Maximum number of turns before stopping
    pub max_turns: Option<u32>,
    /// System prompt override
    pub system_prompt: Option<String>,
    /// Tools the agent may use without asking
    pub allowed_tools: Vec<ToolName>,
    /// Tools the agent may never use
    pub disallowed_tools: Vec<ToolName>,
    /// Extra CLI arguments to pass (allowlisted flags only)
    pub extra_args: HashMap<String, Option<String>>,
    /// Maximum buffer size for one JSON document (default: 1MB)
    pub max_buffer_size: Option<usize>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
            message_buffer_capacity: DEFAULT_MESSAGE_BUFFER_CAPACITY,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            complete_on_terminal_result: false,
            inbound_dispatch: InboundDispatch::default(),
            can_use_tool: None,
            hooks: HashMap::new(),
            tool_servers: HashMap::new(),
            cli_path: None,
            cwd: None,
            env: HashMap::new(),
            model: None,
            permission_mode: None,
            max_turns: None,
            system_prompt: None,
            allowed_tools: Vec::new(),
            disallowed_tools: Vec::new(),
            extra_args: HashMap::new(),
            max_buffer_size: None,
        }
    }
}

impl AgentOptions {
    /// Create a new builder for `AgentOptions`
    #[must_use]
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::default()
    }

    /// Reject values the router cannot run with
    ///
    /// # Errors
    /// Returns `AgentError::InvalidConfig` for a zero-capacity queue or zero deadlines
    pub fn validate(&self) -> Result<()> {
        if self.message_buffer_capacity == 0 {
            return Err(AgentError::invalid_config(
                "message_buffer_capacity must be at least 1",
            ));
        }
        if self.control_timeout.is_zero() {
            return Err(AgentError::invalid_config("control_timeout must be non-zero"));
        }
        if self.shutdown_grace.is_zero() {
            return Err(AgentError::invalid_config("shutdown_grace must be non-zero"));
        }
        if self.max_buffer_size == Some(0) {
            return Err(AgentError::invalid_config("max_buffer_size must be non-zero"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentOptions")
            .field("control_timeout", &self.control_timeout)
            .field("message_buffer_capacity", &self.message_buffer_capacity)
            .field("shutdown_grace", &self.shutdown_grace)
            .field(
                "complete_on_terminal_result",
                &self.complete_on_terminal_result,
            )
            .field("inbound_dispatch", &self.inbound_dispatch)
            .field(
                "can_use_tool",
                &self.can_use_tool.as_ref().map(|_| "<callback>"),
            )
            .field("hooks", &format!("[{} hook types]", self.hooks.len()))
            .field(
                "tool_servers",
                &self.tool_servers.keys().collect::<Vec<_>>(),
            )
            .field("cli_path", &self.cli_path)
            .field("cwd", &self.cwd)
            .field("env", &self.env)
            .field("model", &self.model)
            .field("permission_mode", &self.permission_mode)
            .field("max_turns", &self.max_turns)
            .field("system_prompt", &self.system_prompt)
            .field("allowed_tools", &self.allowed_tools)
            .field("disallowed_tools", &self.disallowed_tools)
            .field("extra_args", &self.extra_args)
            .field("max_buffer_size", &self.max_buffer_size)
            .finish()
    }
}

// ============================================================================
// Builder for AgentOptions
// ============================================================================

/// Builder for `AgentOptions`
#[derive(Debug, Default)]
pub struct AgentOptionsBuilder {
    options: AgentOptions,
}

impl AgentOptionsBuilder {
    /// Set the outbound control request deadline
    #[must_use]
    pub const fn control_timeout(mut self, timeout: Duration) -> Self {
        self.options.control_timeout = timeout;
        self
    }

    /// Set the output queue capacity
    #[must_use]
    pub const fn message_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.message_buffer_capacity = capacity;
        self
    }

    /// Set the disposal grace period
    #[must_use]
    pub const fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.options.shutdown_grace = grace;
        self
    }

    /// Complete the message stream after the first terminal result
    #[must_use]
    pub const fn complete_on_terminal_result(mut self, enabled: bool) -> Self {
        self.options.complete_on_terminal_result = enabled;
        self
    }

    /// Set inbound dispatch scheduling
    #[must_use]
    pub const fn inbound_dispatch(mut self, mode: InboundDispatch) -> Self {
        self.options.inbound_dispatch = mode;
        self
    }

    /// Set `can_use_tool` callback
    #[must_use]
    pub fn can_use_tool(mut self, callback: CanUseToolCallback) -> Self {
        self.options.can_use_tool = Some(callback);
        self
    }

    /// Set hooks
    #[must_use]
    pub fn hooks(mut self, hooks: HashMap<HookEvent, Vec<HookMatcher>>) -> Self {
        self.options.hooks = hooks;
        self
    }

    /// Add one hook matcher for an event
    #[must_use]
    pub fn add_hook(mut self, event: HookEvent, matcher: HookMatcher) -> Self {
        self.options.hooks.entry(event).or_default().push(matcher);
        self
    }

    /// Register an in-process tool server under `name`
    #[must_use]
    pub fn tool_server(mut self, name: impl Into<String>, server: Arc<dyn ToolServer>) -> Self {
        self.options.tool_servers.insert(name.into(), server);
        self
    }

    /// Set path to the agent CLI
    #[must_use]
    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cli_path = Some(path.into());
        self
    }

    /// Set working directory
    #[must_use]
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(path.into());
        self
    }

    /// Add an environment variable for the CLI process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Set model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    /// Set permission mode
    #[must_use]
    pub const fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.options.permission_mode = Some(mode);
        self
    }

    /// Set max turns
    ///
    /// # Panics
    /// Panics if turns exceeds 1000
    #[must_use]
    pub fn max_turns(mut self, turns: u32) -> Self {
        const MAX_ALLOWED_TURNS: u32 = 1000;
        assert!(
            turns <= MAX_ALLOWED_TURNS,
            "max_turns {turns} exceeds maximum allowed: {MAX_ALLOWED_TURNS}"
        );
        self.options.max_turns = Some(turns);
        self
    }

    /// Set system prompt
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.options.system_prompt = Some(prompt.into());
        self
    }

    /// Set allowed tools
    #[must_use]
    pub fn allowed_tools(mut self, tools: Vec<impl Into<ToolName>>) -> Self {
        self.options.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set disallowed tools
    #[must_use]
    pub fn disallowed_tools(mut self, tools: Vec<impl Into<ToolName>>) -> Self {
        self.options.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Add an extra CLI flag
    #[must_use]
    pub fn extra_arg(mut self, flag: impl Into<String>, value: Option<String>) -> Self {
        self.options.extra_args.insert(flag.into(), value);
        self
    }

    /// Set maximum JSON document size
    #[must_use]
    pub const fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.options.max_buffer_size = Some(bytes);
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> AgentOptions {
        self.options
    }
}
