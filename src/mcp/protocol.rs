//! JSON-RPC 2.0 envelopes carried inside `mcp_message` control requests

use serde::{Deserialize, Serialize};

/// JSON-RPC protocol version string
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard and server-defined JSON-RPC error codes
pub mod codes {
    /// Request was not a valid JSON-RPC object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method (or addressed server) does not exist
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Parameters were missing or malformed
    pub const INVALID_PARAMS: i32 = -32602;
    /// The server failed while handling the request
    pub const INTERNAL_ERROR: i32 = -32603;
    /// `tools/call` named a tool the server does not host
    pub const TOOL_NOT_FOUND: i32 = -32001;
}

/// JSON-RPC request or notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always `"2.0"`
    pub jsonrpc: String,
    /// Correlation id; absent for notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Build a request with an id
    pub fn new(
        id: impl Into<serde_json::Value>,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
    ) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Whether the sender expects no reply
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Correlation id to echo back, `null` for notifications
    #[must_use]
    pub fn response_id(&self) -> serde_json::Value {
        self.id.clone().unwrap_or(serde_json::Value::Null)
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always `"2.0"`
    pub jsonrpc: String,
    /// Id of the request this answers
    pub id: serde_json::Value,
    /// Success payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl JsonRpcResponse {
    /// Successful response
    #[must_use]
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response
    #[must_use]
    pub fn error(id: serde_json::Value, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Whether this response carries an error
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize to a JSON value for embedding in a control response
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": self.id,
                "error": { "code": codes::INTERNAL_ERROR, "message": "unserializable response" },
            })
        })
    }
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpError {
    /// Error code
    pub code: i32,
    /// Human-readable message
    pub message: String,
    /// Extra error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl McpError {
    fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Malformed request (-32600)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_code(codes::INVALID_REQUEST, message)
    }

    /// Unknown method (-32601)
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::with_code(codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    /// Addressed server is not registered (-32601)
    #[must_use]
    pub fn server_not_found(server_name: &str) -> Self {
        Self::with_code(
            codes::METHOD_NOT_FOUND,
            format!("Server '{server_name}' not found"),
        )
    }

    /// Bad parameters (-32602)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::with_code(codes::INVALID_PARAMS, message)
    }

    /// Server failure (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_code(codes::INTERNAL_ERROR, message)
    }

    /// Unknown tool (-32001)
    #[must_use]
    pub fn tool_not_found(tool_name: &str) -> Self {
        Self::with_code(codes::TOOL_NOT_FOUND, format!("Tool not found: {tool_name}"))
    }
}
