//! `ProtocolRouter`: conversation and control traffic over one duplex stream
//!
//! The router owns a [`Transport`] and multiplexes two kinds of traffic over
//! it: conversation messages, which flow to the consumer through a bounded
//! [`MessageStream`], and control-protocol RPC in both directions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ProtocolRouter                         │
//! │                                                              │
//! │  ┌──────────────────┐            ┌───────────────────────┐   │
//! │  │    Read loop     │──messages─→│  Output queue (bounded)│──→ consumer
//! │  │  (one task)      │            └───────────────────────┘   │
//! │  │                  │──responses─→ ProtocolHandler (pending) │
//! │  │                  │──requests──→ InboundDispatcher         │
//! │  └────────┬─────────┘                      │                 │
//! │           │ receiver taken once            │ responses       │
//! │           │         ┌──────────────┐       │                 │
//! │           └─────────│  Transport   │←──────┘                 │
//! │                     │   (Mutex)    │←── outbound writes       │
//! │                     └──────────────┘                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - Exactly one task reads from the transport
//! - Writers lock the transport for one document at a time
//! - The read loop runs under a lifetime token that only disposal cancels;
//!   a startup token passed to [`ProtocolRouter::start`] bounds startup alone
//!
//! # Example
//!
//! ```rust
//! use kodegen_agent_protocol::router::ProtocolRouter;
//! use kodegen_agent_protocol::transport::ChannelTransport;
//! use kodegen_agent_protocol::types::AgentOptions;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, remote) = ChannelTransport::pair(16);
//! let router = ProtocolRouter::new(transport, AgentOptions::default())?;
//! router.start(None).await?;
//! let mut messages = router.messages().expect("stream taken once");
//!
//! remote.send(json!({"type": "system", "subtype": "init"})).await?;
//! let first = messages.next_message().await.expect("one message")?;
//! assert!(matches!(first, kodegen_agent_protocol::Message::System { .. }));
//!
//! router.dispose().await?;
//! assert!(messages.next_message().await.is_none());
//! # drop(remote);
//! # Ok(())
//! # }
//! ```

mod router_impl;
mod tasks;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::control::{InboundDispatcher, ProtocolHandler};
use crate::queue::{MessageStream, QueueHandle, QueueWriter};
use crate::transport::Transport;
use crate::types::hooks::{HookEvent, HookMatcher};
use crate::types::identifiers::RequestId;
use crate::types::options::InboundDispatch;

/// Router lifecycle
///
/// `Created → Started → Initialized → Active → Disposed`; disposal is
/// reachable from every state. `Initialized` covers the window between
/// sending the hook configuration and receiving the handshake response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// Constructed, transport not yet connected
    Created,
    /// Read loop running, handshake not sent
    Started,
    /// Handshake sent, response outstanding
    Initialized,
    /// Handshake answered
    Active,
    /// Torn down; every operation fails
    Disposed,
}

/// Settings the read loop and request paths consult
#[derive(Debug, Clone, Copy)]
pub(crate) struct RouterSettings {
    pub(crate) control_timeout: Duration,
    pub(crate) shutdown_grace: Duration,
    pub(crate) complete_on_terminal_result: bool,
    pub(crate) inbound_dispatch: InboundDispatch,
}

/// State shared between the router handle, the read loop and handler tasks
pub(crate) struct RouterShared<T: Transport> {
    /// Transport, locked per write
    pub(crate) transport: tokio::sync::Mutex<T>,
    /// Outbound request correlation
    pub(crate) protocol: ProtocolHandler,
    /// Inbound request handlers
    pub(crate) dispatcher: InboundDispatcher,
    /// Forced completion and terminal error of the output queue
    pub(crate) queue: QueueHandle,
    /// Cancelled only by disposal
    pub(crate) lifetime: CancellationToken,
    /// Lifecycle state
    pub(crate) state: Mutex<RouterState>,
    /// Timing and scheduling settings
    pub(crate) settings: RouterSettings,
    /// Tokens of inbound handlers still running, keyed by request id
    pub(crate) inflight: Mutex<HashMap<RequestId, CancellationToken>>,
    /// Handshake response
    pub(crate) initialization: Mutex<Option<serde_json::Value>>,
    /// Set once by `dispose` or `Drop`
    pub(crate) disposed: AtomicBool,
}

/// Bidirectional control-protocol router over a [`Transport`]
pub struct ProtocolRouter<T: Transport> {
    /// State shared with background tasks
    shared: Arc<RouterShared<T>>,
    /// Read loop task
    reader: Mutex<Option<JoinHandle<()>>>,
    /// Producer end, moved into the read loop at start
    writer: Mutex<Option<QueueWriter>>,
    /// Consumer end, handed out once
    messages: Mutex<Option<MessageStream>>,
    /// Hook configuration, consumed by `initialize`
    hook_config: Mutex<Option<HashMap<HookEvent, Vec<HookMatcher>>>>,
}
