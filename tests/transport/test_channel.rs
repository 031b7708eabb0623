//! Unit tests for `ChannelTransport`

use std::time::Duration;

use kodegen_agent_protocol::{AgentError, ChannelTransport, Transport};
use serde_json::json;

#[tokio::test]
async fn test_requires_connect() {
    let (mut transport, _remote) = ChannelTransport::pair(4);
    assert!(!transport.is_ready());
    assert!(transport.write("{}\n").await.is_err());
    assert!(matches!(
        transport.read_messages(),
        Err(AgentError::Connection(_))
    ));

    transport.connect().await.unwrap();
    assert!(transport.is_ready());
    assert!(transport.read_messages().is_ok());
    assert!(transport.read_messages().is_err());
}

#[tokio::test]
async fn test_documents_flow_both_ways() {
    let (mut transport, mut remote) = ChannelTransport::pair(4);
    transport.connect().await.unwrap();
    let mut inbound = transport.read_messages().unwrap();

    remote.send(json!({"type": "system", "subtype": "init"})).await.unwrap();
    let received = inbound.recv().await.unwrap().unwrap();
    assert_eq!(received["subtype"], "init");

    transport
        .write("{\"type\":\"user\",\"message\":{\"role\":\"user\",\"content\":\"hi\"}}\n")
        .await
        .unwrap();
    let written = remote.recv().await.unwrap();
    assert_eq!(written["message"]["content"], "hi");

    remote.finish();
    assert!(inbound.recv().await.is_none());
    assert!(remote.send(json!({})).await.is_err());
}

#[tokio::test]
async fn test_faults_are_delivered() {
    let (mut transport, remote) = ChannelTransport::pair(4);
    transport.connect().await.unwrap();
    let mut inbound = transport.read_messages().unwrap();

    remote.fail(AgentError::transport("reset")).await.unwrap();
    assert!(matches!(
        inbound.recv().await.unwrap(),
        Err(AgentError::Transport(_))
    ));
}

#[tokio::test]
async fn test_end_input_refuses_writes() {
    let (mut transport, mut remote) = ChannelTransport::pair(4);
    transport.connect().await.unwrap();
    transport.end_input().await.unwrap();
    assert!(transport.write("{}\n").await.is_err());
    assert!(
        remote
            .recv_timeout(Duration::from_millis(50))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_recv_kind_skips_other_documents() {
    let (mut transport, mut remote) = ChannelTransport::pair(4);
    transport.connect().await.unwrap();
    transport.write("{\"type\":\"user\"}\n").await.unwrap();
    transport.write("not json\n").await.unwrap();
    transport
        .write("{\"type\":\"control_request\",\"request_id\":\"req_1\"}\n")
        .await
        .unwrap();

    let request = remote.recv_kind("control_request").await.unwrap();
    assert_eq!(request["request_id"], "req_1");
}
