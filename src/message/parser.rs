//! Decoding of documents read off the wire

use serde::Deserialize;

use crate::control::protocol::{
    CONTROL_CANCEL_REQUEST, CONTROL_REQUEST, CONTROL_RESPONSE, ControlCancelRequest,
    ControlResponseEnvelope, RawControlRequest,
};
use crate::error::{AgentError, Result};
use crate::types::messages::Message;

use super::envelope::Envelope;

/// Conversation message `type` tags
const MESSAGE_TAGS: [&str; 5] = ["user", "assistant", "system", "result", "stream_event"];

/// Parse a JSON value into a typed Message
///
/// # Errors
/// Returns `AgentError::MessageParse` if the JSON cannot be parsed into a valid Message
pub fn parse_message(data: serde_json::Value) -> Result<Message> {
    Message::deserialize(&data).map_err(|e| {
        AgentError::message_parse(format!("Failed to parse message: {e}"), Some(data))
    })
}

/// Discriminator of a document
///
/// Uses the `type` field when present. Untagged documents are recognized by
/// shape: a `response` object carrying a `request_id` is a control response,
/// and a `request` object next to a `request_id` is a control request.
#[must_use]
pub fn discriminator(data: &serde_json::Value) -> Option<&str> {
    if let Some(tag) = data.get("type").and_then(serde_json::Value::as_str) {
        return Some(tag);
    }
    if data
        .get("response")
        .and_then(|r| r.get("request_id"))
        .is_some()
    {
        return Some(CONTROL_RESPONSE);
    }
    if data.get("request").is_some() && data.get("request_id").is_some() {
        return Some(CONTROL_REQUEST);
    }
    None
}

/// Classify one document read off the wire
///
/// Unknown discriminators yield [`Envelope::Unrecognized`].
///
/// # Errors
/// Returns `AgentError::MessageParse` when a recognized document is malformed
pub fn classify(data: serde_json::Value) -> Result<Envelope> {
    let Some(tag) = discriminator(&data).map(str::to_owned) else {
        return Ok(Envelope::Unrecognized(None));
    };

    match tag.as_str() {
        CONTROL_RESPONSE => decode::<ControlResponseEnvelope>(data, &tag)
            .map(|envelope| Envelope::ControlResponse(envelope.response)),
        CONTROL_REQUEST => decode::<RawControlRequest>(data, &tag).map(Envelope::ControlRequest),
        CONTROL_CANCEL_REQUEST => {
            decode::<ControlCancelRequest>(data, &tag).map(Envelope::ControlCancelRequest)
        }
        t if MESSAGE_TAGS.contains(&t) => parse_message(data).map(Envelope::Message),
        _ => Ok(Envelope::Unrecognized(Some(tag))),
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: serde_json::Value, tag: &str) -> Result<T> {
    serde_json::from_value(data.clone()).map_err(|e| {
        AgentError::message_parse(format!("Malformed {tag} document: {e}"), Some(data))
    })
}
