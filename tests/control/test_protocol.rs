//! Unit tests for `ProtocolHandler`
//!
//! Tests outbound request correlation: registration, completion, deadlines
//! and disposal

use std::time::Duration;

use kodegen_agent_protocol::AgentError;
use kodegen_agent_protocol::control::protocol::{
    ControlResponsePayload, OutboundRequest, ProtocolHandler, error_response, success_response,
};
use kodegen_agent_protocol::RequestId;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn answer(request_id: &RequestId, response: serde_json::Value) -> ControlResponsePayload {
    serde_json::from_value(success_response(request_id, response)["response"].clone()).unwrap()
}

#[test]
fn test_request_id_generation() {
    let handler = ProtocolHandler::new();
    let id1 = handler.next_id();
    let id2 = handler.next_id();
    assert_ne!(id1, id2);
    assert!(id1.as_str().starts_with("req_1_"));
    assert!(id2.as_str().starts_with("req_2_"));
}

#[test]
fn test_register_builds_envelope() {
    let handler = ProtocolHandler::new();
    let (envelope, pending) = handler
        .register(OutboundRequest::Interrupt.to_body())
        .unwrap();

    assert_eq!(pending.request_id(), &envelope.request_id);
    assert_eq!(handler.pending_count(), 1);

    let wire = serde_json::to_value(&envelope).unwrap();
    assert_eq!(wire["type"], "control_request");
    assert_eq!(wire["request"]["subtype"], "interrupt");
    assert_eq!(wire["request_id"], envelope.request_id.as_str());
}

#[tokio::test]
async fn test_response_completes_matching_request() {
    let handler = ProtocolHandler::new();
    let (first, first_pending) = handler.register(json!({"subtype": "a"})).unwrap();
    let (second, second_pending) = handler.register(json!({"subtype": "b"})).unwrap();

    // Answer out of order
    assert!(handler.handle_response(answer(&second.request_id, json!({"for": "b"}))));
    assert!(handler.handle_response(answer(&first.request_id, json!({"for": "a"}))));

    let timeout = Duration::from_secs(1);
    let a = handler.wait(first_pending, timeout, None).await.unwrap();
    let b = handler.wait(second_pending, timeout, None).await.unwrap();
    assert_eq!(a, json!({"for": "a"}));
    assert_eq!(b, json!({"for": "b"}));
    assert_eq!(handler.pending_count(), 0);
}

#[tokio::test]
async fn test_error_response_fails_request() {
    let handler = ProtocolHandler::new();
    let (envelope, pending) = handler.register(json!({"subtype": "set_model"})).unwrap();

    let payload: ControlResponsePayload = serde_json::from_value(
        error_response(&envelope.request_id, "unknown model")["response"].clone(),
    )
    .unwrap();
    handler.handle_response(payload);

    let err = handler
        .wait(pending, Duration::from_secs(1), None)
        .await
        .unwrap_err();
    match err {
        AgentError::ControlRequestFailed {
            request_id,
            message,
        } => {
            assert_eq!(request_id, envelope.request_id.as_str());
            assert_eq!(message, "unknown model");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_unknown_response_is_dropped() {
    let handler = ProtocolHandler::new();
    let (_envelope, _pending) = handler.register(json!({"subtype": "interrupt"})).unwrap();

    assert!(!handler.handle_response(answer(&RequestId::new("req_99_deadbeef"), json!({}))));
    assert_eq!(handler.pending_count(), 1);
}

#[tokio::test]
async fn test_timeout_names_request_and_clears_entry() {
    let handler = ProtocolHandler::new();
    let (envelope, pending) = handler.register(json!({"subtype": "interrupt"})).unwrap();

    let err = handler
        .wait(pending, Duration::from_millis(50), None)
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.request_id(), Some(envelope.request_id.as_str()));
    assert_eq!(handler.pending_count(), 0);

    // A late response finds nothing to complete
    assert!(!handler.handle_response(answer(&envelope.request_id, json!({}))));
}

#[tokio::test]
async fn test_caller_cancellation_clears_entry() {
    let handler = ProtocolHandler::new();
    let (_envelope, pending) = handler.register(json!({"subtype": "interrupt"})).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = handler
        .wait(pending, Duration::from_secs(5), Some(&cancel))
        .await
        .unwrap_err();
    assert!(err.is_cancellation());
    assert_eq!(handler.pending_count(), 0);
}

#[tokio::test]
async fn test_close_fails_pending_and_refuses_new() {
    let handler = ProtocolHandler::new();
    let (_a, pending_a) = handler.register(json!({"subtype": "a"})).unwrap();
    let (_b, pending_b) = handler.register(json!({"subtype": "b"})).unwrap();

    assert_eq!(handler.close("router disposed"), 2);
    assert!(handler.is_closed());
    assert_eq!(handler.pending_count(), 0);

    for pending in [pending_a, pending_b] {
        let err = handler
            .wait(pending, Duration::from_secs(5), None)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    let refused = handler.register(json!({"subtype": "interrupt"}));
    assert!(matches!(refused, Err(AgentError::Cancelled(_))));
}

#[test]
fn test_response_data_alias() {
    let payload: ControlResponsePayload = serde_json::from_value(json!({
        "subtype": "success",
        "request_id": "req_1_00000000",
        "response_data": {"commands": []}
    }))
    .unwrap();
    assert_eq!(payload.into_result().unwrap(), json!({"commands": []}));
}

#[test]
fn test_error_subtype_without_message() {
    let payload: ControlResponsePayload = serde_json::from_value(json!({
        "subtype": "error",
        "request_id": "req_1_00000000"
    }))
    .unwrap();
    assert!(payload.into_result().is_err());
}

#[test]
fn test_initialize_body() {
    let body = OutboundRequest::Initialize {
        hooks: Some(json!({"PreToolUse": []})),
        sdk_mcp_servers: vec!["calc".to_string()],
    }
    .to_body();
    assert_eq!(
        body,
        json!({
            "subtype": "initialize",
            "hooks": {"PreToolUse": []},
            "sdkMcpServers": ["calc"]
        })
    );
}
