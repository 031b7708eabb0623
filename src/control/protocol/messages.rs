//! Control protocol wire types
//!
//! Every control document is one JSON object on its own line:
//!
//! - `control_request`: `{"type","request_id","request":{"subtype",...}}`, sent
//!   by either side
//! - `control_response`: `{"type","response":{"subtype","request_id",...}}`
//!   answering a request
//! - `control_cancel_request`: `{"type","request_id"}`, withdrawing an inbound
//!   request

use serde::{Deserialize, Serialize};

use crate::types::identifiers::{HookCallbackId, RequestId};
use crate::types::permissions::{PermissionMode, PermissionRequest};

/// `type` tag of control requests
pub const CONTROL_REQUEST: &str = "control_request";
/// `type` tag of control responses
pub const CONTROL_RESPONSE: &str = "control_response";
/// `type` tag of cancellation notices
pub const CONTROL_CANCEL_REQUEST: &str = "control_cancel_request";

// ============================================================================
// Outbound requests
// ============================================================================

/// Control requests this side issues, tagged by `subtype`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum OutboundRequest {
    /// Handshake carrying hook registrations and tool server names
    Initialize {
        /// Hook configuration keyed by event name, `null` when none are registered
        hooks: Option<serde_json::Value>,
        /// Names of in-process tool servers
        #[serde(rename = "sdkMcpServers", default, skip_serializing_if = "Vec::is_empty")]
        sdk_mcp_servers: Vec<String>,
    },
    /// Interrupt the current turn
    Interrupt,
    /// Change the permission mode
    SetPermissionMode {
        /// New mode
        mode: PermissionMode,
    },
    /// Change the model; `None` restores the default
    SetModel {
        /// Model name
        model: Option<String>,
    },
    /// Ask for the status of configured MCP servers
    McpStatus,
}

impl OutboundRequest {
    /// Wire subtype string
    #[must_use]
    pub const fn subtype(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::Interrupt => "interrupt",
            Self::SetPermissionMode { .. } => "set_permission_mode",
            Self::SetModel { .. } => "set_model",
            Self::McpStatus => "mcp_status",
        }
    }

    /// Request body as sent inside the envelope
    #[must_use]
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "subtype": self.subtype() }))
    }
}

/// Outbound request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlRequestEnvelope {
    /// Always `control_request`
    #[serde(rename = "type")]
    pub kind: String,
    /// Correlation id
    pub request_id: RequestId,
    /// Body with at least a `subtype` field
    pub request: serde_json::Value,
}

impl ControlRequestEnvelope {
    /// Wrap a body under a request id
    #[must_use]
    pub fn new(request_id: RequestId, request: serde_json::Value) -> Self {
        Self {
            kind: CONTROL_REQUEST.to_string(),
            request_id,
            request,
        }
    }
}

// ============================================================================
// Inbound requests
// ============================================================================

/// Inbound control request with its body still undecoded
///
/// Decoding the body separately keeps the request id available for an error
/// response when the subtype is unknown or the body is malformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawControlRequest {
    /// Correlation id to echo in the response
    pub request_id: RequestId,
    /// Body with a `subtype` field
    pub request: serde_json::Value,
}

impl RawControlRequest {
    /// Body subtype, if present
    #[must_use]
    pub fn subtype(&self) -> Option<&str> {
        self.request.get("subtype").and_then(serde_json::Value::as_str)
    }
}

/// Decoded inbound request bodies
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum InboundRequest {
    /// Permission check for a tool invocation
    CanUseTool(PermissionRequest),
    /// Invoke a registered hook callback
    HookCallback(HookCallbackRequest),
    /// JSON-RPC message for an in-process tool server
    McpMessage(McpMessageRequest),
}

impl InboundRequest {
    /// Decode the body of a raw request
    ///
    /// # Errors
    /// Returns the deserialization error for unknown subtypes or malformed bodies
    pub fn decode(raw: &RawControlRequest) -> serde_json::Result<Self> {
        Self::deserialize(&raw.request)
    }
}

/// `hook_callback` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookCallbackRequest {
    /// Registry id assigned at initialization
    pub callback_id: HookCallbackId,
    /// Hook input, decoded only once the callback is found
    #[serde(default)]
    pub input: serde_json::Value,
    /// Tool use the hook fired for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
}

/// `mcp_message` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpMessageRequest {
    /// Addressed tool server
    pub server_name: String,
    /// JSON-RPC message
    pub message: serde_json::Value,
}

/// `control_cancel_request` document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlCancelRequest {
    /// Inbound request being withdrawn
    pub request_id: RequestId,
}

// ============================================================================
// Responses
// ============================================================================

/// Body of an inbound `control_response`
///
/// Accepted with or without `subtype`. The payload may arrive as `response`
/// or `response_data`, and the presence of `error` marks a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponsePayload {
    /// `success` or `error` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Id of the request being answered
    pub request_id: RequestId,
    /// Success payload
    #[serde(default, alias = "response_data", skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponsePayload {
    /// Split into the success payload or the error message
    ///
    /// # Errors
    /// Returns the error message when the response reports a failure
    pub fn into_result(self) -> std::result::Result<serde_json::Value, String> {
        match (self.error, self.subtype.as_deref()) {
            (Some(error), _) => Err(error),
            (None, Some("error")) => Err("control request failed".to_string()),
            (None, _) => Ok(self.response.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// Inbound `control_response` document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponseEnvelope {
    /// Response body
    pub response: ControlResponsePayload,
}

/// Build a success `control_response` document
#[must_use]
pub fn success_response(request_id: &RequestId, response: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "type": CONTROL_RESPONSE,
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": response,
        }
    })
}

/// Build an error `control_response` document
#[must_use]
pub fn error_response(request_id: &RequestId, error: &str) -> serde_json::Value {
    serde_json::json!({
        "type": CONTROL_RESPONSE,
        "response": {
            "subtype": "error",
            "request_id": request_id,
            "error": error,
        }
    })
}
