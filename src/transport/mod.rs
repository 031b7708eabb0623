//! Transport layer: the duplex line stream the router runs over
//!
//! A transport carries newline-delimited JSON in both directions. The router
//! writes serialized documents through [`Transport::write`] and reads decoded
//! documents from the bounded receiver returned by
//! [`Transport::read_messages`]. An `Err` item on that receiver is a fault
//! that ends the session; the receiver closing is a normal end of stream.
//!
//! Two implementations ship with the crate:
//!
//! - [`SubprocessTransport`] spawns the agent CLI and talks over its stdio
//! - [`ChannelTransport`] is an in-memory pair for tests and embedding

pub mod channel;
pub mod subprocess;

use tokio::sync::mpsc;

use crate::error::Result;

/// Transport trait for communicating with the agent
pub trait Transport: Send + 'static {
    /// Connect to the transport
    ///
    /// # Errors
    /// Returns error if connection fails
    fn connect(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Write one serialized document, including its trailing newline
    ///
    /// # Errors
    /// Returns error if write fails or transport is not ready
    fn write(&mut self, data: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// End the input stream (close stdin)
    ///
    /// # Errors
    /// Returns error if closing fails
    fn end_input(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Take the inbound document receiver
    ///
    /// The receiver is bounded: when the router stops draining it, the
    /// transport stops reading. It can be taken once per connection.
    ///
    /// # Errors
    /// Returns error if not connected or the receiver was already taken
    fn read_messages(&mut self) -> Result<mpsc::Receiver<Result<serde_json::Value>>>;

    /// Check if transport is ready for communication
    fn is_ready(&self) -> bool;

    /// Close the transport and clean up resources
    ///
    /// # Errors
    /// Returns error if cleanup fails
    fn close(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub use channel::{ChannelTransport, RemoteEnd};
pub use subprocess::SubprocessTransport;
