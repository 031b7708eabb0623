//! `AgentClient` implementation

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::queue::MessageStream;
use crate::router::ProtocolRouter;
use crate::transport::{SubprocessTransport, Transport};
use crate::types::messages::Message;
use crate::types::options::AgentOptions;
use crate::types::permissions::PermissionMode;

use super::AgentClient;

impl AgentClient<SubprocessTransport> {
    /// Spawn the agent CLI and complete the handshake
    ///
    /// # Errors
    /// Returns error if the CLI cannot be found, fails to start, or does not
    /// answer `initialize`
    pub async fn connect(options: AgentOptions) -> Result<Self> {
        let transport = SubprocessTransport::new(&options)?;
        Self::with_transport(transport, options, None).await
    }
}

impl<T: Transport> AgentClient<T> {
    /// Start a session over an existing transport
    ///
    /// `startup` bounds connecting the transport; the session outlives it.
    ///
    /// # Errors
    /// Returns error if the options are invalid, connecting fails or is
    /// cancelled, or the handshake fails. The router is disposed on failure.
    pub async fn with_transport(
        transport: T,
        options: AgentOptions,
        startup: Option<&CancellationToken>,
    ) -> Result<Self> {
        let router = ProtocolRouter::new(transport, options)?;

        if let Err(e) = Self::bring_up(&router, startup).await {
            if let Err(close_err) = router.dispose().await {
                debug!("dispose after failed startup: {close_err}");
            }
            return Err(e);
        }

        let messages = router.messages();
        Ok(Self { router, messages })
    }

    async fn bring_up(router: &ProtocolRouter<T>, startup: Option<&CancellationToken>) -> Result<()> {
        router.start(startup).await?;
        router.initialize().await?;
        Ok(())
    }

    /// Send a user message
    ///
    /// # Errors
    /// Returns error if the message cannot be written
    pub async fn send_message(&self, content: impl Into<String>) -> Result<()> {
        self.router.send_message(content).await
    }

    /// Next conversation message; `None` when the stream has ended
    pub async fn next_message(&mut self) -> Option<Result<Message>> {
        self.messages.as_mut()?.next_message().await
    }

    /// Take the message stream to consume it elsewhere
    pub const fn take_messages(&mut self) -> Option<MessageStream> {
        self.messages.take()
    }

    /// Interrupt the current turn
    ///
    /// # Errors
    /// Returns error if the agent rejects the request or does not answer in time
    pub async fn interrupt(&self) -> Result<()> {
        self.router.interrupt().await
    }

    /// Change the permission mode
    ///
    /// # Errors
    /// Returns error if the agent rejects the request or does not answer in time
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.router.set_permission_mode(mode).await
    }

    /// Change the model
    ///
    /// # Errors
    /// Returns error if the agent rejects the request or does not answer in time
    pub async fn set_model(&self, model: Option<String>) -> Result<()> {
        self.router.set_model(model).await
    }

    /// Handshake response from the agent
    #[must_use]
    pub fn server_info(&self) -> Option<serde_json::Value> {
        self.router.initialization_result()
    }

    /// Underlying router
    #[must_use]
    pub const fn router(&self) -> &ProtocolRouter<T> {
        &self.router
    }

    /// Close the session and release the transport
    ///
    /// # Errors
    /// Returns the transport's close error
    pub async fn close(&mut self) -> Result<()> {
        self.router.dispose().await
    }

    /// Fault that ended the session, if any
    #[must_use]
    pub fn terminal_error(&self) -> Option<AgentError> {
        self.router
            .terminal_error()
            .map(AgentError::SessionTerminated)
    }
}
