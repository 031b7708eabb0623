//! `AgentClient` for interactive sessions
//!
//! The client wraps a [`ProtocolRouter`], runs the `initialize` handshake on
//! connect, and owns the message stream. Hooks, permission checks and tool
//! server calls configured in [`AgentOptions`](crate::types::AgentOptions)
//! are answered automatically by the router while the session runs.
//!
//! # Example: Basic Usage
//!
//! ```no_run
//! use kodegen_agent_protocol::{AgentClient, AgentOptions, Message};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = AgentClient::connect(AgentOptions::default()).await?;
//!
//! client.send_message("Hello!").await?;
//!
//! while let Some(message) = client.next_message().await {
//!     match message? {
//!         Message::Assistant { message, .. } => {
//!             log::info!("Response: {:?}", message.content);
//!         }
//!         Message::Result { .. } => break,
//!         _ => {}
//!     }
//! }
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Interrupt
//!
//! ```no_run
//! use kodegen_agent_protocol::{AgentClient, AgentOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AgentClient::connect(AgentOptions::default()).await?;
//!
//! client.send_message("Write a long essay").await?;
//! tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//! client.interrupt().await?;
//! # Ok(())
//! # }
//! ```

mod client_impl;

use crate::queue::MessageStream;
use crate::router::ProtocolRouter;
use crate::transport::{SubprocessTransport, Transport};

/// Client for interactive sessions with the agent
///
/// Generic over the transport so the same client drives the CLI subprocess
/// or an in-memory [`ChannelTransport`](crate::transport::ChannelTransport).
pub struct AgentClient<T: Transport = SubprocessTransport> {
    /// Router carrying the session
    router: ProtocolRouter<T>,
    /// Conversation messages, `None` once taken
    messages: Option<MessageStream>,
}
