//! In-memory transport pair
//!
//! [`ChannelTransport::pair`] returns the router-side transport and a
//! [`RemoteEnd`] that plays the agent: it feeds documents to the router and
//! receives whatever the router writes.

use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;

use super::Transport;
use crate::error::{AgentError, Result};

/// Router side of an in-memory transport
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: Option<mpsc::Receiver<Result<serde_json::Value>>>,
    outbound: mpsc::UnboundedSender<String>,
    connected: bool,
    input_ended: bool,
}

/// Remote side of an in-memory transport
#[derive(Debug)]
pub struct RemoteEnd {
    inbound: Option<mpsc::Sender<Result<serde_json::Value>>>,
    outbound: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    /// Create a connected pair whose inbound side buffers `capacity` documents
    #[must_use]
    pub fn pair(capacity: usize) -> (Self, RemoteEnd) {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity.max(1));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                inbound: Some(inbound_rx),
                outbound: outbound_tx,
                connected: false,
                input_ended: false,
            },
            RemoteEnd {
                inbound: Some(inbound_tx),
                outbound: outbound_rx,
            },
        )
    }
}

impl Transport for ChannelTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(AgentError::transport("Transport is not ready for writing"));
        }
        if self.input_ended {
            return Err(AgentError::transport("Input stream already ended"));
        }
        self.outbound
            .send(data.to_string())
            .map_err(|_| AgentError::transport("Remote end dropped"))
    }

    async fn end_input(&mut self) -> Result<()> {
        self.input_ended = true;
        Ok(())
    }

    fn read_messages(&mut self) -> Result<mpsc::Receiver<Result<serde_json::Value>>> {
        if !self.connected {
            return Err(AgentError::connection("Not connected"));
        }
        self.inbound
            .take()
            .ok_or_else(|| AgentError::transport("Inbound stream already taken"))
    }

    fn is_ready(&self) -> bool {
        self.connected
    }

    async fn close(&mut self) -> Result<()> {
        debug!("closing channel transport");
        self.connected = false;
        self.inbound = None;
        Ok(())
    }
}

impl RemoteEnd {
    /// Deliver a document to the router, waiting while its buffer is full
    ///
    /// # Errors
    /// Returns error once the router stopped reading or [`finish`](Self::finish) was called
    pub async fn send(&self, value: serde_json::Value) -> Result<()> {
        let tx = self
            .inbound
            .as_ref()
            .ok_or_else(|| AgentError::transport("Remote input already finished"))?;
        tx.send(Ok(value))
            .await
            .map_err(|_| AgentError::transport("Router stopped reading"))
    }

    /// Deliver a transport fault to the router
    ///
    /// # Errors
    /// Returns error once the router stopped reading
    pub async fn fail(&self, error: AgentError) -> Result<()> {
        let tx = self
            .inbound
            .as_ref()
            .ok_or_else(|| AgentError::transport("Remote input already finished"))?;
        tx.send(Err(error))
            .await
            .map_err(|_| AgentError::transport("Router stopped reading"))
    }

    /// End the router's inbound stream normally
    pub fn finish(&mut self) {
        self.inbound = None;
    }

    /// Next document the router wrote, `None` once the router side is gone
    pub async fn recv(&mut self) -> Option<serde_json::Value> {
        loop {
            let line = self.outbound.recv().await?;
            match serde_json::from_str(line.trim_end()) {
                Ok(value) => return Some(value),
                Err(e) => debug!("remote end skipping non-JSON line: {e}"),
            }
        }
    }

    /// Like [`recv`](Self::recv) with a deadline
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<serde_json::Value> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }

    /// Next written document whose `type` is `kind`, skipping others
    pub async fn recv_kind(&mut self, kind: &str) -> Option<serde_json::Value> {
        loop {
            let value = self.recv().await?;
            if value.get("type").and_then(serde_json::Value::as_str) == Some(kind) {
                return Some(value);
            }
        }
    }

    /// Raw line the router wrote, newline included
    pub async fn recv_line(&mut self) -> Option<String> {
        self.outbound.recv().await
    }
}
