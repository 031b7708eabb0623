//! Control protocol wire types and outbound request correlation
//!
//! # Example
//!
//! ```rust
//! use kodegen_agent_protocol::control::{OutboundRequest, ProtocolHandler};
//!
//! let handler = ProtocolHandler::new();
//! let (envelope, pending) = handler
//!     .register(OutboundRequest::Interrupt.to_body())
//!     .expect("handler is open");
//!
//! assert_eq!(envelope.kind, "control_request");
//! assert_eq!(pending.request_id(), &envelope.request_id);
//! assert_eq!(handler.pending_count(), 1);
//! ```

mod handler;
mod messages;

pub use handler::{PendingResponse, ProtocolHandler};
pub use messages::{
    CONTROL_CANCEL_REQUEST, CONTROL_REQUEST, CONTROL_RESPONSE, ControlCancelRequest,
    ControlRequestEnvelope, ControlResponseEnvelope, ControlResponsePayload, HookCallbackRequest,
    InboundRequest, McpMessageRequest, OutboundRequest, RawControlRequest, error_response,
    success_response,
};
