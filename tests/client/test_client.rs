//! Unit tests for `AgentClient`
//!
//! Drives the client over a channel transport whose remote end plays the agent

use std::time::Duration;

use kodegen_agent_protocol::{
    AgentClient, AgentError, AgentOptions, ChannelTransport, Message, PermissionMode, RemoteEnd,
    RouterState,
};
use serde_json::{Value, json};

const WAIT: Duration = Duration::from_secs(5);

async fn answer_next_request(remote: &mut RemoteEnd, response: Value) -> Value {
    let request = remote.recv_kind("control_request").await.unwrap();
    remote
        .send(json!({
            "type": "control_response",
            "response": {
                "subtype": "success",
                "request_id": request["request_id"],
                "response": response
            }
        }))
        .await
        .unwrap();
    request
}

async fn connected() -> (AgentClient<ChannelTransport>, RemoteEnd) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (transport, mut remote) = ChannelTransport::pair(16);
    let (client, _) = tokio::join!(
        AgentClient::with_transport(transport, AgentOptions::default(), None),
        answer_next_request(&mut remote, json!({"version": "2.0.0"}))
    );
    (client.unwrap(), remote)
}

#[tokio::test]
async fn test_client_creation() {
    let options = AgentOptions::builder().cli_path("/nonexistent/agent-cli").build();
    let result = AgentClient::connect(options).await;
    assert!(matches!(result, Err(AgentError::Connection(_))));
}

#[tokio::test]
async fn test_handshake_result_is_kept() {
    let (mut client, _remote) = connected().await;
    assert_eq!(client.server_info(), Some(json!({"version": "2.0.0"})));
    assert_eq!(client.router().state(), RouterState::Active);
    client.close().await.unwrap();
    assert_eq!(client.router().state(), RouterState::Disposed);
}

#[tokio::test]
async fn test_conversation_round_trip() {
    let (mut client, mut remote) = connected().await;

    client.send_message("What is 2 + 2?").await.unwrap();
    let sent = remote.recv_kind("user").await.unwrap();
    assert_eq!(sent["message"]["content"], "What is 2 + 2?");

    remote
        .send(json!({
            "type": "assistant",
            "message": {"model": "test", "content": [{"type": "text", "text": "4"}]}
        }))
        .await
        .unwrap();
    remote
        .send(json!({"type": "result", "subtype": "success", "result": "4"}))
        .await
        .unwrap();

    let first = tokio::time::timeout(WAIT, client.next_message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(first, Message::Assistant { .. }));
    let second = client.next_message().await.unwrap().unwrap();
    assert!(second.is_terminal_result());

    // Interactive sessions stay open after a result
    remote
        .send(json!({"type": "system", "subtype": "status"}))
        .await
        .unwrap();
    let third = tokio::time::timeout(WAIT, client.next_message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(third, Message::System { .. }));
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_control_methods() {
    let (mut client, mut remote) = connected().await;

    let (interrupted, request) =
        tokio::join!(client.interrupt(), answer_next_request(&mut remote, json!({})));
    interrupted.unwrap();
    assert_eq!(request["request"]["subtype"], "interrupt");

    let (changed, request) = tokio::join!(
        client.set_permission_mode(PermissionMode::Plan),
        answer_next_request(&mut remote, json!({}))
    );
    changed.unwrap();
    assert_eq!(
        request["request"],
        json!({"subtype": "set_permission_mode", "mode": "plan"})
    );

    let (changed, request) = tokio::join!(
        client.set_model(None),
        answer_next_request(&mut remote, json!({}))
    );
    changed.unwrap();
    assert_eq!(request["request"], json!({"subtype": "set_model", "model": null}));
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_take_messages() {
    let (mut client, remote) = connected().await;
    let mut messages = client.take_messages().unwrap();
    assert!(client.take_messages().is_none());
    assert!(client.next_message().await.is_none());

    remote
        .send(json!({"type": "system", "subtype": "init"}))
        .await
        .unwrap();
    let message = tokio::time::timeout(WAIT, messages.next_message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(matches!(message, Message::System { ref subtype, .. } if subtype == "init"));
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_terminal_error_after_fault() {
    let (mut client, remote) = connected().await;
    assert!(client.terminal_error().is_none());

    remote.fail(AgentError::transport("broken pipe")).await.unwrap();
    let item = tokio::time::timeout(WAIT, client.next_message())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(item, Err(AgentError::SessionTerminated(_))));
    assert!(matches!(
        client.terminal_error(),
        Some(AgentError::SessionTerminated(_))
    ));
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_handshake_disposes() {
    let (transport, mut remote) = ChannelTransport::pair(4);
    let options = AgentOptions::builder()
        .control_timeout(Duration::from_millis(100))
        .build();

    let (client, request) = tokio::join!(
        AgentClient::with_transport(transport, options, None),
        remote.recv_kind("control_request")
    );
    assert_eq!(request.unwrap()["request"]["subtype"], "initialize");
    let err = client.err().unwrap();
    assert!(err.is_timeout());

    // The router side was released
    assert!(remote.recv().await.is_none());
}
