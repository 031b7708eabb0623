//! Error types for the agent protocol router

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Main error type for the agent protocol router
#[derive(Error, Debug)]
pub enum AgentError {
    /// Agent CLI not found or not installed
    #[error("Agent CLI not found: {0}")]
    CliNotFound(String),

    /// Connection error when communicating with the agent process
    #[error("Connection error: {0}")]
    Connection(String),

    /// Process execution error with exit code and stderr
    #[error("Process error (exit code {exit_code}): {message}")]
    Process {
        /// Error message
        message: String,
        /// Process exit code
        exit_code: i32,
        /// Standard error output
        stderr: Option<String>,
    },

    /// JSON decode error when parsing agent output
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// Message parse error with optional raw data
    #[error("Message parse error: {message}")]
    MessageParse {
        /// Error message
        message: String,
        /// Raw message data that failed to parse
        data: Option<serde_json::Value>,
    },

    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Control protocol error
    #[error("Control protocol error: {0}")]
    ControlProtocol(String),

    /// The remote process answered a control request with an error
    #[error("Control request {request_id} failed: {message}")]
    ControlRequestFailed {
        /// Id of the outbound request
        request_id: String,
        /// Error text reported by the remote process
        message: String,
    },

    /// No control response arrived before the deadline
    #[error("Control request {request_id} timed out after {elapsed:?}")]
    ControlTimeout {
        /// Id of the outbound request
        request_id: String,
        /// Deadline that elapsed
        elapsed: Duration,
    },

    /// Operation cancelled by the caller or by router disposal
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// The session's read loop ended with a fault
    #[error("Session terminated: {0}")]
    SessionTerminated(Arc<AgentError>),

    /// Hook execution error
    #[error("Hook error: {0}")]
    Hook(String),

    /// MCP (Model Context Protocol) error
    #[error("MCP error: {0}")]
    Mcp(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not valid in the router's current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Create a CLI not found error
    #[must_use]
    pub fn cli_not_found() -> Self {
        Self::CliNotFound(
            "Claude Code not found. Install with:\n\
             npm install -g @anthropic-ai/claude-code\n\
             \n\
             Or set `cli_path` in AgentOptions"
                .to_string(),
        )
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a process error
    pub fn process(msg: impl Into<String>, exit_code: i32, stderr: Option<String>) -> Self {
        Self::Process {
            message: msg.into(),
            exit_code,
            stderr,
        }
    }

    /// Create a message parse error
    pub fn message_parse(msg: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::MessageParse {
            message: msg.into(),
            data,
        }
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a control protocol error
    pub fn control_protocol(msg: impl Into<String>) -> Self {
        Self::ControlProtocol(msg.into())
    }

    /// Create a control request failure reported by the remote side
    pub fn control_failed(request_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ControlRequestFailed {
            request_id: request_id.into(),
            message: msg.into(),
        }
    }

    /// Create a control timeout error
    pub fn control_timeout(request_id: impl Into<String>, elapsed: Duration) -> Self {
        Self::ControlTimeout {
            request_id: request_id.into(),
            elapsed,
        }
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a hook error
    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }

    /// Create an MCP error
    pub fn mcp(msg: impl Into<String>) -> Self {
        Self::Mcp(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid lifecycle state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Whether this error is the normal cancellation path rather than a fault
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Whether this error is a control-request timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ControlTimeout { .. } | Self::Timeout(_))
    }

    /// Request id carried by correlated-call errors
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::ControlTimeout { request_id, .. }
            | Self::ControlRequestFailed { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}
