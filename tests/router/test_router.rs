//! Integration tests for `ProtocolRouter`
//!
//! The remote end of a channel transport plays the agent process.

use std::sync::Arc;
use std::time::Duration;

use kodegen_agent_protocol::hooks::{HookMatcherBuilder, HookRegistry};
use kodegen_agent_protocol::{
    AgentError, AgentOptions, ChannelTransport, HookEvent, HookOutput, InboundDispatch, Message,
    PermissionManager, PermissionResult, ProtocolRouter, RemoteEnd, Result, RouterState,
    SdkMcpServer, SdkMcpTool, ToolResult, Transport,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

fn reply(request: &Value, response: Value) -> Value {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request["request_id"],
            "response": response
        }
    })
}

fn assistant(text: &str) -> Value {
    json!({
        "type": "assistant",
        "message": {"model": "test", "content": [{"type": "text", "text": text}]}
    })
}

fn result(subtype: &str) -> Value {
    json!({"type": "result", "subtype": subtype, "num_turns": 1})
}

fn assistant_text(message: &Message) -> Option<String> {
    match message {
        Message::Assistant { message, .. } => message.content.iter().find_map(|block| match block {
            kodegen_agent_protocol::ContentBlock::Text { text } => Some(text.clone()),
            _ => None,
        }),
        _ => None,
    }
}

/// Start a router and answer its handshake; returns the handshake request
async fn initialized(options: AgentOptions) -> (ProtocolRouter<ChannelTransport>, RemoteEnd, Value) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (transport, mut remote) = ChannelTransport::pair(16);
    let router = ProtocolRouter::new(transport, options).unwrap();
    router.start(None).await.unwrap();

    let (init, request) = tokio::join!(router.initialize(), async {
        let request = remote.recv_kind("control_request").await.unwrap();
        remote
            .send(reply(&request, json!({"commands": []})))
            .await
            .unwrap();
        request
    });
    init.unwrap();
    (router, remote, request)
}

/// Transport whose connect never finishes
struct StallingTransport;

impl Transport for StallingTransport {
    async fn connect(&mut self) -> Result<()> {
        std::future::pending().await
    }

    async fn write(&mut self, _data: &str) -> Result<()> {
        Ok(())
    }

    async fn end_input(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_messages(&mut self) -> Result<mpsc::Receiver<Result<Value>>> {
        Err(AgentError::connection("never connects"))
    }

    fn is_ready(&self) -> bool {
        false
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_lifecycle_and_handshake() {
    let (transport, mut remote) = ChannelTransport::pair(16);
    let router = ProtocolRouter::new(transport, AgentOptions::default()).unwrap();
    assert_eq!(router.state(), RouterState::Created);

    let err = router.send_message("too early").await.unwrap_err();
    assert!(matches!(err, AgentError::InvalidState(_)));

    router.start(None).await.unwrap();
    assert_eq!(router.state(), RouterState::Started);
    assert!(matches!(
        router.start(None).await,
        Err(AgentError::InvalidState(_))
    ));

    let (init, request) = tokio::join!(router.initialize(), async {
        let request = remote.recv_kind("control_request").await.unwrap();
        remote
            .send(reply(&request, json!({"commands": ["/help"]})))
            .await
            .unwrap();
        request
    });
    assert_eq!(init.unwrap(), json!({"commands": ["/help"]}));
    assert_eq!(
        request["request"],
        json!({"subtype": "initialize", "hooks": null})
    );
    assert!(
        request["request_id"]
            .as_str()
            .unwrap()
            .starts_with("req_1_")
    );
    assert_eq!(router.state(), RouterState::Active);
    assert_eq!(
        router.initialization_result(),
        Some(json!({"commands": ["/help"]}))
    );

    let again = router.initialize().await.unwrap_err();
    assert!(matches!(again, AgentError::InvalidState(_)));

    router.dispose().await.unwrap();
    assert_eq!(router.state(), RouterState::Disposed);
    router.dispose().await.unwrap();
    assert!(matches!(
        router.send_control_request(json!({"subtype": "interrupt"})).await,
        Err(AgentError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_initialize_announces_hooks_and_tool_servers() {
    let options = AgentOptions::builder()
        .add_hook(
            HookEvent::PreToolUse,
            HookMatcherBuilder::new(Some("Bash"))
                .add_hook(HookRegistry::callback(|_, _, _| async {
                    Ok(HookOutput::proceed())
                }))
                .build(),
        )
        .tool_server("zeta", Arc::new(SdkMcpServer::new("zeta")))
        .tool_server("alpha", Arc::new(SdkMcpServer::new("alpha")))
        .build();

    let (router, _remote, request) = initialized(options).await;
    assert_eq!(
        request["request"]["hooks"],
        json!({"PreToolUse": [{"matcher": "Bash", "hookCallbackIds": ["hook_0"]}]})
    );
    assert_eq!(request["request"]["sdkMcpServers"], json!(["alpha", "zeta"]));
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_requests_do_not_cross_resolve() {
    let (router, mut remote, _) = initialized(AgentOptions::default()).await;

    let (a, b, ()) = tokio::join!(
        router.send_control_request(json!({"subtype": "mcp_status"})),
        router.send_control_request(json!({"subtype": "interrupt"})),
        async {
            let first = remote.recv_kind("control_request").await.unwrap();
            let second = remote.recv_kind("control_request").await.unwrap();
            assert_ne!(first["request_id"], second["request_id"]);
            // Answer in reverse order
            for request in [&second, &first] {
                remote
                    .send(reply(request, json!({"echo": request["request"]["subtype"]})))
                    .await
                    .unwrap();
            }
        }
    );

    assert_eq!(a.unwrap(), json!({"echo": "mcp_status"}));
    assert_eq!(b.unwrap(), json!({"echo": "interrupt"}));
    assert_eq!(router.pending_requests(), 0);
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_timeout_names_request_id() {
    let options = AgentOptions::builder()
        .control_timeout(Duration::from_millis(100))
        .build();
    let (router, mut remote, _) = initialized(options).await;

    let (outcome, request) = tokio::join!(
        router.send_control_request(json!({"subtype": "interrupt"})),
        remote.recv_kind("control_request")
    );
    let err = outcome.unwrap_err();
    let request = request.unwrap();

    assert!(err.is_timeout());
    assert_eq!(err.request_id(), request["request_id"].as_str());
    assert_eq!(router.pending_requests(), 0);

    // A late answer is ignored and the router keeps working
    remote.send(reply(&request, json!({}))).await.unwrap();
    remote.send(assistant("still here")).await.unwrap();
    let mut messages = router.messages().unwrap();
    let next = tokio::time::timeout(WAIT, messages.next_message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(assistant_text(&next).as_deref(), Some("still here"));
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_error_response_fails_request() {
    let (router, mut remote, _) = initialized(AgentOptions::default()).await;

    let (outcome, ()) = tokio::join!(router.set_model(Some("nope".to_string())), async {
        let request = remote.recv_kind("control_request").await.unwrap();
        assert_eq!(
            request["request"],
            json!({"subtype": "set_model", "model": "nope"})
        );
        remote
            .send(json!({
                "type": "control_response",
                "response": {
                    "subtype": "error",
                    "request_id": request["request_id"],
                    "error": "unknown model"
                }
            }))
            .await
            .unwrap();
    });

    match outcome.unwrap_err() {
        AgentError::ControlRequestFailed { message, .. } => assert_eq!(message, "unknown model"),
        other => panic!("unexpected error: {other:?}"),
    }
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_messages_in_order_without_control_traffic() {
    let (router, mut remote, _) = initialized(AgentOptions::default()).await;
    let mut messages = router.messages().unwrap();
    assert!(router.messages().is_none());

    remote.send(assistant("one")).await.unwrap();
    remote
        .send(json!({"type": "control_response", "response": {"request_id": "req_77_00000000"}}))
        .await
        .unwrap();
    remote.send(json!({"type": "keep_alive"})).await.unwrap();
    // Malformed message is skipped
    remote.send(json!({"type": "user"})).await.unwrap();
    remote.send(assistant("two")).await.unwrap();
    remote.send(result("success")).await.unwrap();
    remote.finish();

    let mut seen = Vec::new();
    while let Some(message) = tokio::time::timeout(WAIT, messages.next_message()).await.unwrap() {
        seen.push(message.unwrap());
    }
    assert_eq!(seen.len(), 3);
    assert_eq!(assistant_text(&seen[0]).as_deref(), Some("one"));
    assert_eq!(assistant_text(&seen[1]).as_deref(), Some("two"));
    assert!(seen[2].is_terminal_result());
    assert!(router.terminal_error().is_none());
    router.dispose().await.unwrap();
}

async fn order_survives_inbound_requests(mode: InboundDispatch) {
    let options = AgentOptions::builder()
        .inbound_dispatch(mode)
        .can_use_tool(PermissionManager::callback(|_tool, _input, _ctx| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(PermissionResult::allow())
        }))
        .build();
    let (router, mut remote, _) = initialized(options).await;
    let mut messages = router.messages().unwrap();

    remote.send(assistant("one")).await.unwrap();
    remote
        .send(json!({
            "type": "control_request",
            "request_id": "cli_perm",
            "request": {"subtype": "can_use_tool", "tool_name": "Bash", "input": {}}
        }))
        .await
        .unwrap();
    remote.send(assistant("two")).await.unwrap();
    remote
        .send(json!({
            "type": "control_request",
            "request_id": "cli_hook",
            "request": {"subtype": "hook_callback", "callback_id": "hook_9", "input": {}}
        }))
        .await
        .unwrap();
    remote.send(assistant("three")).await.unwrap();
    remote.send(result("success")).await.unwrap();

    let mut texts = Vec::new();
    for _ in 0..4 {
        let message = tokio::time::timeout(WAIT, messages.next_message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        texts.push(assistant_text(&message).unwrap_or_else(|| "result".to_string()));
    }
    assert_eq!(texts, ["one", "two", "three", "result"]);

    let mut answered = Vec::new();
    for _ in 0..2 {
        let response = tokio::time::timeout(WAIT, remote.recv_kind("control_response"))
            .await
            .unwrap()
            .unwrap();
        answered.push(response["response"]["request_id"].as_str().unwrap().to_string());
    }
    answered.sort();
    assert_eq!(answered, ["cli_hook", "cli_perm"]);
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_order_with_inbound_requests_sequential() {
    order_survives_inbound_requests(InboundDispatch::Sequential).await;
}

#[tokio::test]
async fn test_order_with_inbound_requests_concurrent() {
    order_survives_inbound_requests(InboundDispatch::Concurrent).await;
}

#[tokio::test]
async fn test_user_message_wire_shape() {
    let (router, mut remote, _) = initialized(AgentOptions::default()).await;
    router.send_message("hi there").await.unwrap();

    let line = remote.recv_line().await.unwrap();
    assert!(line.ends_with('\n'));
    assert_eq!(line.matches('\n').count(), 1);
    let value: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(
        value,
        json!({
            "type": "user",
            "message": {"role": "user", "content": "hi there"},
            "parent_tool_use_id": null,
            "session_id": "default"
        })
    );
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_inbound_permission_request_answered() {
    let options = AgentOptions::builder()
        .can_use_tool(PermissionManager::callback(|tool, _input, _ctx| async move {
            if tool.as_str() == "Bash" {
                Ok(PermissionResult::deny("no shell"))
            } else {
                Ok(PermissionResult::allow())
            }
        }))
        .build();
    let (router, mut remote, _) = initialized(options).await;

    remote
        .send(json!({
            "type": "control_request",
            "request_id": "cli_1",
            "request": {"subtype": "can_use_tool", "tool_name": "Bash", "input": {"command": "ls"}}
        }))
        .await
        .unwrap();
    remote
        .send(json!({
            "type": "control_request",
            "request_id": "cli_2",
            "request": {"subtype": "can_use_tool", "tool_name": "Read", "input": {"path": "a"}}
        }))
        .await
        .unwrap();

    let first = remote.recv_kind("control_response").await.unwrap();
    assert_eq!(first["response"]["request_id"], "cli_1");
    assert_eq!(first["response"]["response"]["behavior"], "deny");

    let second = remote.recv_kind("control_response").await.unwrap();
    assert_eq!(second["response"]["request_id"], "cli_2");
    assert_eq!(
        second["response"]["response"],
        json!({"behavior": "allow", "updatedInput": {"path": "a"}})
    );
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_hook_callback_round_trip() {
    let seen: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let options = AgentOptions::builder()
        .add_hook(
            HookEvent::PreToolUse,
            HookMatcherBuilder::new(Some("Bash"))
                .add_hook(HookRegistry::callback(move |input, _tool_use_id, _ctx| {
                    let recorder = Arc::clone(&recorder);
                    async move {
                        recorder.lock().push(serde_json::to_value(&input).unwrap());
                        Ok(HookOutput::block("blocked by policy"))
                    }
                }))
                .build(),
        )
        .build();
    let (router, mut remote, init) = initialized(options).await;
    let callback_id = init["request"]["hooks"]["PreToolUse"][0]["hookCallbackIds"][0].clone();

    remote
        .send(json!({
            "type": "control_request",
            "request_id": "cli_hook_1",
            "request": {
                "subtype": "hook_callback",
                "callback_id": callback_id,
                "tool_use_id": "toolu_9",
                "input": {
                    "hook_event_name": "PreToolUse",
                    "session_id": "s1",
                    "transcript_path": "/tmp/t",
                    "cwd": "/work",
                    "tool_name": "Bash",
                    "tool_input": {"command": "rm -rf /"}
                }
            }
        }))
        .await
        .unwrap();
    let answer = remote.recv_kind("control_response").await.unwrap();
    assert_eq!(answer["response"]["request_id"], "cli_hook_1");
    assert_eq!(
        answer["response"]["response"],
        json!({"decision": "block", "reason": "blocked by policy"})
    );

    let inputs = seen.lock().clone();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0]["hook_event_name"], "PreToolUse");
    assert_eq!(inputs[0]["tool_input"]["command"], "rm -rf /");

    // Unknown ids let the agent continue
    remote
        .send(json!({
            "type": "control_request",
            "request_id": "cli_hook_2",
            "request": {"subtype": "hook_callback", "callback_id": "hook_404", "input": {}}
        }))
        .await
        .unwrap();
    let answer = remote.recv_kind("control_response").await.unwrap();
    assert_eq!(answer["response"]["response"], json!({"continue": true}));
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_mcp_message_round_trip() {
    let server = SdkMcpServer::new("calc").tool(SdkMcpTool::new(
        "double",
        "Double a number",
        json!({"type": "object", "properties": {"n": {"type": "number"}}}),
        |input| async move { Ok(ToolResult::text((input["n"].as_i64().unwrap_or(0) * 2).to_string())) },
    ));
    let options = AgentOptions::builder()
        .tool_server("calc", Arc::new(server))
        .build();
    let (router, mut remote, _) = initialized(options).await;

    remote
        .send(json!({
            "type": "control_request",
            "request_id": "cli_mcp_1",
            "request": {
                "subtype": "mcp_message",
                "server_name": "calc",
                "message": {"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                            "params": {"name": "double", "arguments": {"n": 21}}}
            }
        }))
        .await
        .unwrap();
    let answer = remote.recv_kind("control_response").await.unwrap();
    let reply = &answer["response"]["response"]["mcp_response"];
    assert_eq!(reply["id"], 3);
    assert_eq!(reply["result"]["content"][0]["text"], "42");

    remote
        .send(json!({
            "type": "control_request",
            "request_id": "cli_mcp_2",
            "request": {
                "subtype": "mcp_message",
                "server_name": "nope",
                "message": {"jsonrpc": "2.0", "id": 4, "method": "tools/list"}
            }
        }))
        .await
        .unwrap();
    let answer = remote.recv_kind("control_response").await.unwrap();
    assert_eq!(answer["response"]["response"]["mcp_response"]["error"]["code"], -32601);
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_cancel_request_stops_handler_without_answer() {
    let observed = CancellationToken::new();
    let witness = observed.clone();
    let options = AgentOptions::builder()
        .inbound_dispatch(InboundDispatch::Concurrent)
        .can_use_tool(PermissionManager::callback(move |_tool, _input, ctx| {
            let witness = witness.clone();
            async move {
                ctx.signal.cancelled().await;
                witness.cancel();
                Err(AgentError::cancelled("permission prompt withdrawn"))
            }
        }))
        .build();
    let (router, mut remote, _) = initialized(options).await;

    remote
        .send(json!({
            "type": "control_request",
            "request_id": "cli_slow",
            "request": {"subtype": "can_use_tool", "tool_name": "Bash", "input": {}}
        }))
        .await
        .unwrap();
    remote
        .send(json!({"type": "control_cancel_request", "request_id": "cli_slow"}))
        .await
        .unwrap();

    tokio::time::timeout(WAIT, observed.cancelled()).await.unwrap();
    assert!(
        remote
            .recv_timeout(Duration::from_millis(200))
            .await
            .is_none()
    );
    assert_eq!(router.inflight_requests(), 0);
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_dispose_unblocks_consumer_and_pending_requests() {
    let (router, mut remote, _) = initialized(AgentOptions::default()).await;
    let mut messages = router.messages().unwrap();
    let consumer = tokio::spawn(async move { messages.next_message().await.is_none() });

    let (outcome, disposed) = tokio::join!(
        router.send_control_request(json!({"subtype": "interrupt"})),
        async {
            remote.recv_kind("control_request").await.unwrap();
            router.dispose().await
        }
    );
    disposed.unwrap();
    assert!(outcome.unwrap_err().is_cancellation());
    assert!(tokio::time::timeout(WAIT, consumer).await.unwrap().unwrap());
    assert_eq!(router.pending_requests(), 0);
    assert_eq!(router.state(), RouterState::Disposed);
}

#[tokio::test]
async fn test_dispose_discards_buffered_messages() {
    let (router, remote, _) = initialized(AgentOptions::default()).await;
    let mut messages = router.messages().unwrap();
    remote.send(assistant("buffered")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    router.dispose().await.unwrap();
    assert!(messages.next_message().await.is_none());
}

#[tokio::test]
async fn test_transport_fault_delivered_after_drain() {
    let (router, remote, _) = initialized(AgentOptions::default()).await;
    let mut messages = router.messages().unwrap();

    remote.send(assistant("before the fault")).await.unwrap();
    remote
        .fail(AgentError::transport("pipe closed unexpectedly"))
        .await
        .unwrap();

    let first = tokio::time::timeout(WAIT, messages.next_message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(assistant_text(&first).as_deref(), Some("before the fault"));

    let fault = messages.next_message().await.unwrap().unwrap_err();
    match fault {
        AgentError::SessionTerminated(inner) => {
            assert!(matches!(*inner, AgentError::Transport(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(messages.next_message().await.is_none());
    assert!(router.terminal_error().is_some());

    // No response can arrive any more
    let err = router
        .send_control_request(json!({"subtype": "interrupt"}))
        .await
        .unwrap_err();
    assert!(err.is_cancellation());
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_stream_end_fails_pending_request() {
    let (router, mut remote, _) = initialized(AgentOptions::default()).await;

    let (outcome, ()) = tokio::join!(router.interrupt(), async {
        remote.recv_kind("control_request").await.unwrap();
        remote.finish();
    });
    assert!(outcome.unwrap_err().is_cancellation());
    assert_eq!(router.pending_requests(), 0);
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_one_shot_completes_on_terminal_result() {
    let options = AgentOptions::builder()
        .complete_on_terminal_result(true)
        .build();
    let (router, mut remote, _) = initialized(options).await;
    assert!(router.is_one_shot());
    let mut messages = router.messages().unwrap();

    remote.send(assistant("thinking")).await.unwrap();
    remote.send(result("partial")).await.unwrap();
    remote.send(result("success")).await.unwrap();
    remote.send(assistant("after the end")).await.unwrap();

    let mut seen = Vec::new();
    while let Some(message) = tokio::time::timeout(WAIT, messages.next_message()).await.unwrap() {
        seen.push(message.unwrap());
    }
    assert_eq!(seen.len(), 3);
    assert!(!seen[1].is_terminal_result());
    assert!(seen[2].is_terminal_result());
    assert!(router.terminal_error().is_none());

    // Control traffic is still served after the stream completed
    remote
        .send(json!({
            "type": "control_request",
            "request_id": "cli_late",
            "request": {"subtype": "can_use_tool", "tool_name": "Read", "input": {}}
        }))
        .await
        .unwrap();
    let answer = remote.recv_kind("control_response").await.unwrap();
    assert_eq!(answer["response"]["request_id"], "cli_late");
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_backpressure_stops_reading() {
    let (transport, remote) = ChannelTransport::pair(1);
    let options = AgentOptions::builder().message_buffer_capacity(1).build();
    let router = ProtocolRouter::new(transport, options).unwrap();
    router.start(None).await.unwrap();
    let mut messages = router.messages().unwrap();

    // One queued, one held by the read loop, one in the transport buffer
    for n in 0..3 {
        tokio::time::timeout(WAIT, remote.send(assistant(&n.to_string())))
            .await
            .unwrap()
            .unwrap();
    }
    let blocked = tokio::time::timeout(Duration::from_millis(200), remote.send(assistant("3"))).await;
    assert!(blocked.is_err(), "reading should stop while the queue is full");

    for n in 0..3 {
        let message = tokio::time::timeout(WAIT, messages.next_message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(assistant_text(&message), Some(n.to_string()));
    }
    tokio::time::timeout(WAIT, remote.send(assistant("3")))
        .await
        .unwrap()
        .unwrap();
    router.dispose().await.unwrap();
}

#[tokio::test]
async fn test_startup_cancellation() {
    let router = ProtocolRouter::new(StallingTransport, AgentOptions::default()).unwrap();
    let startup = CancellationToken::new();
    startup.cancel();

    let err = router.start(Some(&startup)).await.unwrap_err();
    assert!(err.is_cancellation());
    assert_eq!(router.state(), RouterState::Created);
    router.dispose().await.unwrap();
}

#[test]
fn test_invalid_options_rejected() {
    let (transport, _remote) = ChannelTransport::pair(1);
    let options = AgentOptions::builder().message_buffer_capacity(0).build();
    assert!(matches!(
        ProtocolRouter::new(transport, options),
        Err(AgentError::InvalidConfig(_))
    ));
}
