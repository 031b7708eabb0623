//! Classified wire documents

use crate::control::protocol::{ControlCancelRequest, ControlResponsePayload, RawControlRequest};
use crate::types::messages::Message;

/// One document read off the wire, classified by its discriminator
#[derive(Debug, Clone)]
pub enum Envelope {
    /// Conversation message for the consumer
    Message(Message),
    /// Response to one of our outbound requests
    ControlResponse(ControlResponsePayload),
    /// Request the agent wants answered
    ControlRequest(RawControlRequest),
    /// The agent withdrew an inbound request
    ControlCancelRequest(ControlCancelRequest),
    /// Unknown or missing discriminator
    Unrecognized(Option<String>),
}

impl Envelope {
    /// Short name for logging
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::ControlResponse(_) => "control_response",
            Self::ControlRequest(_) => "control_request",
            Self::ControlCancelRequest(_) => "control_cancel_request",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}
