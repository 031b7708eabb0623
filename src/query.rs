//! One-shot queries
//!
//! [`query`] sends a single prompt and yields the conversation until the first
//! terminal result. Control traffic (hooks, permission checks, tool server
//! calls) is still answered while the stream is consumed.

use futures::Stream;
use log::debug;

use crate::error::{AgentError, Result};
use crate::router::ProtocolRouter;
use crate::transport::{SubprocessTransport, Transport};
use crate::types::messages::Message;
use crate::types::options::AgentOptions;

/// Ask the agent one question and stream the answer
///
/// The stream ends after the first non-partial result message. The router is
/// disposed when the stream ends, or when it is dropped early.
///
/// # Errors
/// Returns error if the CLI is not found, fails to start, or does not answer
/// the handshake
///
/// # Examples
///
/// ```no_run
/// use kodegen_agent_protocol::{query, AgentOptions};
/// use futures::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let options = AgentOptions::builder()
///         .system_prompt("You are a helpful coding assistant")
///         .max_turns(1)
///         .build();
///
///     let stream = query("Write a hello world in Rust", Some(options)).await?;
///     let mut stream = Box::pin(stream);
///
///     while let Some(message) = stream.next().await {
///         log::info!("{:?}", message?);
///     }
///     Ok(())
/// }
/// ```
pub async fn query(
    prompt: impl Into<String>,
    options: Option<AgentOptions>,
) -> Result<impl Stream<Item = Result<Message>> + Send> {
    let options = options.unwrap_or_default();
    let transport = SubprocessTransport::new(&options)?;
    query_with_transport(transport, prompt, options).await
}

/// [`query`] over a caller-supplied transport
///
/// # Errors
/// Returns error if starting the router, the handshake, or sending the prompt fails
pub async fn query_with_transport<T: Transport>(
    transport: T,
    prompt: impl Into<String>,
    mut options: AgentOptions,
) -> Result<impl Stream<Item = Result<Message>> + Send> {
    options.complete_on_terminal_result = true;
    let router = ProtocolRouter::new(transport, options)?;

    if let Err(e) = start_session(&router, prompt.into()).await {
        if let Err(close_err) = router.dispose().await {
            debug!("dispose after failed query startup: {close_err}");
        }
        return Err(e);
    }

    let mut messages = router
        .messages()
        .ok_or_else(|| AgentError::invalid_state("message stream already taken"))?;

    Ok(async_stream::stream! {
        while let Some(item) = messages.next_message().await {
            yield item;
        }
        if let Err(e) = router.dispose().await {
            debug!("dispose after query: {e}");
        }
    })
}

async fn start_session<T: Transport>(router: &ProtocolRouter<T>, prompt: String) -> Result<()> {
    router.start(None).await?;
    router.initialize().await?;
    router.send_message(prompt).await
}
