//! # Agent Protocol Router
//!
//! A bidirectional control-protocol engine for agent CLIs. One JSON-lines
//! duplex stream carries two kinds of traffic, and the router keeps them apart:
//!
//! - **Conversation messages** (`user`, `assistant`, `system`, `result`,
//!   `stream_event`) flow to the consumer, in order, through a bounded stream
//! - **Control RPC** flows both ways: outbound requests (`initialize`,
//!   `interrupt`, `set_permission_mode`, ...) are correlated with their
//!   responses by request id, and inbound requests (`can_use_tool`,
//!   `hook_callback`, `mcp_message`) are answered by local handlers
//!
//! ## Quick Start
//!
//! The simplest way to use this crate is the [`query()`] function:
//!
//! ```no_run
//! use kodegen_agent_protocol::query;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = query("What is 2 + 2?", None).await?;
//!     let mut stream = Box::pin(stream);
//!
//!     while let Some(message) = stream.next().await {
//!         if let kodegen_agent_protocol::Message::Assistant { message, .. } = message? {
//!             log::info!("Agent: {:?}", message);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Core Pieces
//!
//! - [`router::ProtocolRouter`]: the engine, generic over any [`Transport`]
//! - [`AgentClient`]: interactive sessions with the handshake done for you
//! - [`hooks`]: hook callbacks addressed by registry id
//! - [`permissions`]: `can_use_tool` decisions
//! - [`mcp`]: in-process tool servers answering JSON-RPC
//! - [`transport`]: the CLI subprocess and an in-memory channel pair
//!
//! ## Hooks and Permissions
//!
//! ```no_run
//! use kodegen_agent_protocol::{AgentClient, AgentOptions, HookEvent, HookOutput, PermissionResult};
//! use kodegen_agent_protocol::hooks::{HookMatcherBuilder, HookRegistry};
//! use kodegen_agent_protocol::permissions::PermissionManager;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = AgentOptions::builder()
//!     .add_hook(
//!         HookEvent::PreToolUse,
//!         HookMatcherBuilder::new(Some("Bash"))
//!             .add_hook(HookRegistry::callback(|input, _tool_use_id, _ctx| async move {
//!                 log::info!("about to run {:?}", input.tool_name());
//!                 Ok(HookOutput::proceed())
//!             }))
//!             .build(),
//!     )
//!     .can_use_tool(PermissionManager::callback(|tool, _input, _ctx| async move {
//!         if tool.as_str() == "Write" {
//!             Ok(PermissionResult::deny("read-only session"))
//!         } else {
//!             Ok(PermissionResult::allow())
//!         }
//!     }))
//!     .build();
//!
//! let mut client = AgentClient::connect(options).await?;
//! client.send_message("List the files here").await?;
//! while let Some(message) = client.next_message().await {
//!     log::info!("{:?}", message?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, AgentError>`](Result):
//!
//! ```no_run
//! # use kodegen_agent_protocol::{query, AgentError};
//! # async fn example() {
//! match query("Hello", None).await {
//!     Ok(stream) => { /* ... */ }
//!     Err(AgentError::CliNotFound(msg)) => {
//!         log::error!("agent CLI not installed: {}", msg);
//!     }
//!     Err(e) => {
//!         log::error!("Error: {}", e);
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod control;
pub mod error;
pub mod hooks;
pub mod mcp;
pub mod message;
pub mod permissions;
pub mod query;
mod queue;
pub mod router;
pub mod transport;
pub mod types;

// Re-export commonly used types for external API
pub use client::AgentClient;
pub use error::{AgentError, Result};
pub use hooks::{HookMatcherBuilder, HookRegistry};
pub use mcp::{SdkMcpServer, SdkMcpTool, ToolResult, ToolServer};
pub use message::{Envelope, classify, parse_message};
pub use permissions::PermissionManager;
pub use query::{query, query_with_transport};
pub use queue::MessageStream;
pub use router::{ProtocolRouter, RouterState};
pub use transport::{ChannelTransport, RemoteEnd, SubprocessTransport, Transport};

pub use types::hooks::{
    HookCallback, HookContext, HookDecision, HookEvent, HookInput, HookMatcher, HookOutput,
};
pub use types::identifiers::{HookCallbackId, RequestId, SessionId, ToolName};
pub use types::messages::{ContentBlock, ContentValue, Message, UserContent};
pub use types::options::{AgentOptions, AgentOptionsBuilder, InboundDispatch};
pub use types::permissions::{
    CanUseToolCallback, PermissionBehavior, PermissionMode, PermissionRequest, PermissionResult,
    PermissionResultAllow, PermissionResultDeny, PermissionRuleValue, PermissionUpdate,
    PermissionUpdateDestination, RuleChange, ToolPermissionContext,
};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
