//! `ProtocolRouter` construction, lifecycle and public API

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::control::{InboundDispatcher, OutboundRequest, ProtocolHandler};
use crate::error::{AgentError, Result};
use crate::hooks::HookRegistry;
use crate::mcp::ToolServerRouter;
use crate::permissions::PermissionManager;
use crate::queue::{MessageStream, output_queue};
use crate::transport::Transport;
use crate::types::options::AgentOptions;
use crate::types::permissions::PermissionMode;

use super::{ProtocolRouter, RouterSettings, RouterShared, RouterState};

impl<T: Transport> ProtocolRouter<T> {
    /// Create a router over `transport`
    ///
    /// Nothing is read or written until [`start`](Self::start).
    ///
    /// # Errors
    /// Returns `AgentError::InvalidConfig` if the options fail validation
    pub fn new(transport: T, options: AgentOptions) -> Result<Self> {
        options.validate()?;

        let (writer, queue, messages) = output_queue(options.message_buffer_capacity);
        let dispatcher = InboundDispatcher::new(
            PermissionManager::new(options.can_use_tool.clone()),
            ToolServerRouter::new(options.tool_servers.clone()),
        );

        let shared = Arc::new(RouterShared {
            transport: tokio::sync::Mutex::new(transport),
            protocol: ProtocolHandler::new(),
            dispatcher,
            queue,
            lifetime: CancellationToken::new(),
            state: Mutex::new(RouterState::Created),
            settings: RouterSettings {
                control_timeout: options.control_timeout,
                shutdown_grace: options.shutdown_grace,
                complete_on_terminal_result: options.complete_on_terminal_result,
                inbound_dispatch: options.inbound_dispatch,
            },
            inflight: Mutex::new(HashMap::new()),
            initialization: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        Ok(Self {
            shared,
            reader: Mutex::new(None),
            writer: Mutex::new(Some(writer)),
            messages: Mutex::new(Some(messages)),
            hook_config: Mutex::new(Some(options.hooks)),
        })
    }

    /// Connect the transport and start the read loop
    ///
    /// `startup` bounds connecting only. Once this returns, the read loop runs
    /// until the stream ends or the router is disposed, whatever happens to
    /// `startup`.
    ///
    /// # Errors
    /// - `AgentError::InvalidState` if the router was already started or disposed
    /// - `AgentError::Cancelled` if `startup` fires before the transport connects
    /// - the transport's error if connecting fails
    pub async fn start(&self, startup: Option<&CancellationToken>) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if *state != RouterState::Created {
                return Err(AgentError::invalid_state(format!(
                    "cannot start a router in state {:?}",
                    *state
                )));
            }
            *state = RouterState::Started;
        }

        let connected = match self.connect(startup).await {
            Ok(inbound) => inbound,
            Err(e) => {
                let mut state = self.shared.state.lock();
                if *state == RouterState::Started {
                    *state = RouterState::Created;
                }
                return Err(e);
            }
        };

        let writer = self
            .writer
            .lock()
            .take()
            .ok_or_else(|| AgentError::invalid_state("message queue already attached"))?;
        let handle = tokio::spawn(RouterShared::read_loop(
            Arc::clone(&self.shared),
            connected,
            writer,
        ));
        *self.reader.lock() = Some(handle);

        info!("protocol router started");
        Ok(())
    }

    async fn connect(
        &self,
        startup: Option<&CancellationToken>,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<serde_json::Value>>> {
        let connect = async {
            let mut transport = self.shared.transport.lock().await;
            transport.connect().await?;
            transport.read_messages()
        };
        let startup_cancelled = async {
            match startup {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            result = connect => result,
            () = startup_cancelled => Err(AgentError::cancelled("router startup cancelled")),
            () = self.shared.lifetime.cancelled() => Err(AgentError::cancelled("router disposed during startup")),
        }
    }

    /// Send the `initialize` handshake
    ///
    /// Assigns hook callback ids, sends the hook configuration and tool server
    /// names, and stores the response for [`initialization_result`](Self::initialization_result).
    /// Runs once per router.
    ///
    /// # Errors
    /// - `AgentError::InvalidState` before `start`, after disposal or on a second call
    /// - any error of [`send_control_request`](Self::send_control_request)
    pub async fn initialize(&self) -> Result<serde_json::Value> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                RouterState::Started => *state = RouterState::Initialized,
                RouterState::Initialized | RouterState::Active => {
                    return Err(AgentError::invalid_state("router already initialized"));
                }
                other => {
                    return Err(AgentError::invalid_state(format!(
                        "cannot initialize a router in state {other:?}"
                    )));
                }
            }
        }

        let hooks = self.hook_config.lock().take().unwrap_or_default();
        let registry = HookRegistry::build(&hooks);
        let request = OutboundRequest::Initialize {
            hooks: registry.initialize_config(),
            sdk_mcp_servers: self
                .shared
                .dispatcher
                .tool_servers()
                .names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        };
        self.shared.dispatcher.install_hooks(registry)?;

        let response = self.send_request(request).await?;
        *self.shared.initialization.lock() = Some(response.clone());
        {
            let mut state = self.shared.state.lock();
            if *state == RouterState::Initialized {
                *state = RouterState::Active;
            }
        }
        debug!("router initialized");
        Ok(response)
    }

    /// Send a control request and wait for its response payload
    ///
    /// `body` must carry a `subtype`. The request is registered before it is
    /// written, and completes exactly once.
    ///
    /// # Errors
    /// - `AgentError::ControlRequestFailed` when the peer answers with an error
    /// - `AgentError::ControlTimeout` naming the request id after the control timeout
    /// - `AgentError::Cancelled` on disposal
    /// - `AgentError::InvalidState` before `start` or after disposal
    pub async fn send_control_request(&self, body: serde_json::Value) -> Result<serde_json::Value> {
        self.send_control_request_with_cancel(body, None).await
    }

    /// [`send_control_request`](Self::send_control_request) that also gives up when `cancel` fires
    ///
    /// # Errors
    /// As `send_control_request`, plus `AgentError::Cancelled` when `cancel` fires
    pub async fn send_control_request_with_cancel(
        &self,
        body: serde_json::Value,
        cancel: Option<&CancellationToken>,
    ) -> Result<serde_json::Value> {
        self.ensure_running()?;

        let (envelope, pending) = self.shared.protocol.register(body)?;
        let request_id = envelope.request_id.clone();
        if let Err(e) = self.shared.write_document(&envelope).await {
            self.shared.protocol.forget(&request_id);
            return Err(e);
        }

        self.shared
            .protocol
            .wait(pending, self.shared.settings.control_timeout, cancel)
            .await
    }

    /// Send a typed control request
    ///
    /// # Errors
    /// As [`send_control_request`](Self::send_control_request)
    pub async fn send_request(&self, request: OutboundRequest) -> Result<serde_json::Value> {
        self.send_control_request(request.to_body()).await
    }

    /// Interrupt the current turn
    ///
    /// # Errors
    /// As [`send_control_request`](Self::send_control_request)
    pub async fn interrupt(&self) -> Result<()> {
        self.send_request(OutboundRequest::Interrupt).await.map(drop)
    }

    /// Change the permission mode
    ///
    /// # Errors
    /// As [`send_control_request`](Self::send_control_request)
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.send_request(OutboundRequest::SetPermissionMode { mode })
            .await
            .map(drop)
    }

    /// Change the model, or restore the default with `None`
    ///
    /// # Errors
    /// As [`send_control_request`](Self::send_control_request)
    pub async fn set_model(&self, model: Option<String>) -> Result<()> {
        self.send_request(OutboundRequest::SetModel { model })
            .await
            .map(drop)
    }

    /// Status of the agent's MCP servers
    ///
    /// # Errors
    /// As [`send_control_request`](Self::send_control_request)
    pub async fn mcp_status(&self) -> Result<serde_json::Value> {
        self.send_request(OutboundRequest::McpStatus).await
    }

    /// Send a user message
    ///
    /// # Errors
    /// Returns error if the router is not running or the write fails
    pub async fn send_message(&self, content: impl Into<String>) -> Result<()> {
        self.send_document(&serde_json::json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": content.into(),
            },
            "parent_tool_use_id": null,
            "session_id": "default",
        }))
        .await
    }

    /// Write an arbitrary document, such as a pre-built conversation message
    ///
    /// # Errors
    /// Returns error if the router is not running or the write fails
    pub async fn send_document(&self, document: &serde_json::Value) -> Result<()> {
        self.ensure_running()?;
        self.shared.write_document(document).await
    }

    /// Close the transport's input side
    ///
    /// # Errors
    /// Returns the transport's error
    pub async fn end_input(&self) -> Result<()> {
        self.ensure_running()?;
        self.shared.transport.lock().await.end_input().await
    }

    /// Take the conversation message stream; `None` after the first call
    pub fn messages(&self) -> Option<MessageStream> {
        self.messages.lock().take()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> RouterState {
        *self.shared.state.lock()
    }

    /// Response to the `initialize` handshake, once received
    #[must_use]
    pub fn initialization_result(&self) -> Option<serde_json::Value> {
        self.shared.initialization.lock().clone()
    }

    /// Fault that ended the session, visible once the message stream completed
    #[must_use]
    pub fn terminal_error(&self) -> Option<Arc<AgentError>> {
        self.shared.queue.terminal_error()
    }

    /// Whether the message stream completes after the first terminal result
    #[must_use]
    pub fn is_one_shot(&self) -> bool {
        self.shared.settings.complete_on_terminal_result
    }

    /// Outbound requests still awaiting a response
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.shared.protocol.pending_count()
    }

    /// Inbound requests whose handlers are still running
    #[must_use]
    pub fn inflight_requests(&self) -> usize {
        self.shared.inflight.lock().len()
    }

    /// Tear the router down
    ///
    /// Cancels the lifetime token, ends the message stream at once, waits up
    /// to the shutdown grace for the read loop (aborting it afterwards), closes
    /// the transport and fails every pending outbound request. Calling it again
    /// is a no-op.
    ///
    /// # Errors
    /// Returns the transport's close error; teardown completes regardless
    pub async fn dispose(&self) -> Result<()> {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        *self.shared.state.lock() = RouterState::Disposed;
        info!("disposing protocol router");

        self.shared.lifetime.cancel();
        self.shared.queue.force_complete();

        let grace = self.shared.settings.shutdown_grace;
        let reader = self.reader.lock().take();
        if let Some(mut handle) = reader
            && tokio::time::timeout(grace, &mut handle).await.is_err()
        {
            warn!("read loop did not stop within {grace:?}, aborting it");
            handle.abort();
        }

        let closed = match tokio::time::timeout(grace, self.shared.transport.lock()).await {
            Ok(mut transport) => transport.close().await,
            Err(_) => {
                warn!("transport busy for {grace:?} during disposal, skipping close");
                Ok(())
            }
        };

        let failed = self.shared.protocol.close("router disposed");
        if failed > 0 {
            debug!("failed {failed} pending control requests on disposal");
        }
        closed
    }

    fn ensure_running(&self) -> Result<()> {
        match *self.shared.state.lock() {
            RouterState::Started | RouterState::Initialized | RouterState::Active => Ok(()),
            RouterState::Created => Err(AgentError::invalid_state("router not started")),
            RouterState::Disposed => Err(AgentError::invalid_state("router disposed")),
        }
    }
}

impl<T: Transport> Drop for ProtocolRouter<T> {
    fn drop(&mut self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.shared.state.lock() = RouterState::Disposed;
        self.shared.lifetime.cancel();
        self.shared.queue.force_complete();
        self.shared.protocol.close("router dropped");
        if let Some(handle) = self.reader.lock().take() {
            handle.abort();
        }
    }
}
