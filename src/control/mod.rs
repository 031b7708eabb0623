//! Control protocol: wire types, outbound correlation and inbound dispatch

pub mod dispatcher;
pub mod protocol;

pub use dispatcher::InboundDispatcher;
pub use protocol::{
    ControlCancelRequest, ControlRequestEnvelope, ControlResponsePayload, InboundRequest,
    OutboundRequest, PendingResponse, ProtocolHandler, RawControlRequest,
};
