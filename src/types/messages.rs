//! Conversation message types
//!
//! Every document the router reads whose `type` is one of `user`,
//! `assistant`, `system`, `result` or `stream_event` becomes a [`Message`] and
//! is forwarded to the consumer in wire order. Fields the router does not
//! interpret default when absent, so older and newer agents both decode.

use super::identifiers::SessionId;
use serde::{Deserialize, Serialize};

/// Result subtype marking an intermediate update rather than the end of a turn
pub const PARTIAL_RESULT_SUBTYPE: &str = "partial";

// ============================================================================
// Content blocks
// ============================================================================

/// Body of a tool result block: plain text or nested blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    /// Text body
    String(String),
    /// Nested blocks, kept raw
    Blocks(Vec<serde_json::Value>),
}

/// One block of user or assistant content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text
    Text {
        /// Text content
        text: String,
    },
    /// Extended thinking
    Thinking {
        /// Thinking content
        thinking: String,
        /// Signature over the thinking content
        #[serde(default)]
        signature: String,
    },
    /// The assistant asks to run a tool
    ToolUse {
        /// Tool use id, echoed by the matching result block
        id: String,
        /// Tool name
        name: String,
        /// Tool input
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Output of a tool run
    ToolResult {
        /// Id of the tool use this answers
        tool_use_id: String,
        /// Result body
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<ContentValue>,
        /// Whether the tool failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl ContentBlock {
    /// Text of a text block
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// User content is either a bare string or a list of blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    /// Plain text
    String(String),
    /// Structured blocks, typically tool results
    Blocks(Vec<ContentBlock>),
}

/// Inner `message` object of a user envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPayload {
    /// Always `user`
    pub role: String,
    /// Message content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<UserContent>,
}

/// Inner `message` object of an assistant envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantPayload {
    /// Model that produced the turn
    #[serde(default)]
    pub model: String,
    /// Content blocks in generation order
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Why generation stopped, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

// ============================================================================
// Messages
// ============================================================================

/// Conversation messages delivered to the consumer, in wire order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Echo of a user turn, or tool results fed back to the model
    User {
        /// Tool use this message is nested under
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
        /// Message body
        message: UserPayload,
        /// Session id
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    /// Assistant turn
    Assistant {
        /// Tool use this message is nested under
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
        /// Message body
        message: AssistantPayload,
        /// Session id
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    /// Status and metadata from the agent (`init`, `compact_boundary`, ...)
    System {
        /// System message subtype
        subtype: String,
        /// Every other field of the document
        #[serde(flatten)]
        data: serde_json::Value,
    },
    /// End of a turn with its metrics, or a `partial` progress update
    Result {
        /// `success`, `error_max_turns`, `error_during_execution` or `partial`
        subtype: String,
        /// Wall time of the turn in milliseconds
        #[serde(default)]
        duration_ms: u64,
        /// Time spent in model calls in milliseconds
        #[serde(default)]
        duration_api_ms: u64,
        /// Whether the turn failed
        #[serde(default)]
        is_error: bool,
        /// Turns taken
        #[serde(default)]
        num_turns: u32,
        /// Session id
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        /// Cost of the turn in USD
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_cost_usd: Option<f64>,
        /// Token usage, as reported
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<serde_json::Value>,
        /// Final text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    /// Raw model stream event, sent when partial messages are enabled
    StreamEvent {
        /// Event id
        #[serde(default)]
        uuid: String,
        /// Session id
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        /// Event payload
        event: serde_json::Value,
        /// Tool use this event is nested under
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },
}

impl Message {
    /// Wire `type` of the message
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::System { .. } => "system",
            Self::Result { .. } => "result",
            Self::StreamEvent { .. } => "stream_event",
        }
    }

    /// Whether this message ends a logical turn
    ///
    /// Only result messages qualify, and `partial` results never do.
    #[must_use]
    pub fn is_terminal_result(&self) -> bool {
        matches!(self, Self::Result { subtype, .. } if subtype != PARTIAL_RESULT_SUBTYPE)
    }

    /// Session the message belongs to, when the envelope names one
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::User { session_id, .. }
            | Self::Assistant { session_id, .. }
            | Self::Result { session_id, .. }
            | Self::StreamEvent { session_id, .. } => session_id.as_ref(),
            Self::System { .. } => None,
        }
    }

    /// Concatenated text blocks of an assistant message
    #[must_use]
    pub fn assistant_text(&self) -> Option<String> {
        let Self::Assistant { message, .. } = self else {
            return None;
        };
        let text: String = message
            .content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect();
        Some(text)
    }
}
