//! Tools hosted by an in-process tool server

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;

/// Async tool handler
pub type ToolHandler = Arc<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = Result<ToolResult>> + Send>>
        + Send
        + Sync,
>;

/// A tool the agent can invoke through `tools/call`
///
/// # Example
///
/// ```rust
/// use kodegen_agent_protocol::mcp::{SdkMcpTool, ToolResult};
/// use serde_json::json;
///
/// let echo = SdkMcpTool::new(
///     "echo",
///     "Echo back the input text",
///     json!({"type": "object", "properties": {"text": {"type": "string"}}}),
///     |input| async move {
///         Ok(ToolResult::text(input["text"].as_str().unwrap_or_default()))
///     },
/// );
/// assert_eq!(echo.name(), "echo");
/// ```
#[derive(Clone)]
pub struct SdkMcpTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
    handler: ToolHandler,
}

impl SdkMcpTool {
    /// Create a tool from a name, description, input schema and async handler
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
        handler: F,
    ) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(move |input| Box::pin(handler(input))),
        }
    }

    /// Tool name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// JSON schema of the tool input
    #[must_use]
    pub const fn input_schema(&self) -> &serde_json::Value {
        &self.input_schema
    }

    /// Run the tool
    ///
    /// # Errors
    /// Propagates the handler's error
    pub async fn invoke(&self, input: serde_json::Value) -> Result<ToolResult> {
        (self.handler)(input).await
    }

    /// Entry for a `tools/list` result
    pub(crate) fn descriptor(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

impl std::fmt::Debug for SdkMcpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkMcpTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Output of a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Content blocks
    pub content: Vec<ToolContent>,
    /// Set when the tool reports a failure to the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    /// Single text block
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// Single text block flagged as an error
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: Some(true),
        }
    }
}

/// Content block of a tool result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text
    Text {
        /// Text content
        text: String,
    },
    /// Base64 image
    Image {
        /// Base64 payload
        data: String,
        /// MIME type such as `image/png`
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}
