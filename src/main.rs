// One-shot demo: sends the prompt given on the command line to the agent CLI
// and logs every conversation message until the turn's result arrives.
//
// RUST_LOG=debug also shows control traffic and the CLI's stderr.

use anyhow::{Context, Result};
use futures::StreamExt;
use kodegen_agent_protocol::{AgentOptions, Message, PermissionManager, PermissionResult, query};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.is_empty() {
        anyhow::bail!("usage: kodegen-agent-protocol <prompt>");
    }

    let options = AgentOptions::builder()
        .max_turns(1)
        .can_use_tool(PermissionManager::callback(|tool, _input, _ctx| async move {
            log::info!("permission check for {tool}: allowing");
            Ok(PermissionResult::allow())
        }))
        .build();

    let stream = query(prompt, Some(options))
        .await
        .context("failed to start agent session")?;
    let mut stream = Box::pin(stream);

    while let Some(message) = stream.next().await {
        match message.context("session ended with an error")? {
            Message::Assistant { message, .. } => log::info!("assistant: {:?}", message.content),
            Message::Result {
                subtype,
                num_turns,
                total_cost_usd,
                ..
            } => log::info!("result: {subtype} after {num_turns} turn(s), cost {total_cost_usd:?}"),
            other => log::debug!("{other:?}"),
        }
    }

    Ok(())
}
