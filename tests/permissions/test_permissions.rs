//! Unit tests for `PermissionManager`
//!
//! Tests permission decisions and their wire payloads

use kodegen_agent_protocol::{
    PermissionManager, PermissionRequest, PermissionResult, PermissionResultAllow,
    PermissionUpdate,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn bash_request() -> PermissionRequest {
    serde_json::from_value(json!({
        "tool_name": "Bash",
        "input": {"command": "rm -rf build"},
        "permission_suggestions": [
            {"type": "setMode", "mode": "acceptEdits", "destination": "session"}
        ],
        "blocked_path": "/etc"
    }))
    .unwrap()
}

#[test]
fn test_request_accepts_tool_input_alias() {
    let request: PermissionRequest = serde_json::from_value(json!({
        "tool_name": "Write",
        "tool_input": {"path": "x"}
    }))
    .unwrap();
    assert_eq!(request.tool_name.as_str(), "Write");
    assert_eq!(request.input, json!({"path": "x"}));
    assert!(request.permission_suggestions.is_empty());
}

#[tokio::test]
async fn test_no_callback_allows() {
    let manager = PermissionManager::default();
    assert!(!manager.has_callback());

    let request = bash_request();
    let result = manager
        .decide(&request, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        result.to_response(&request.input),
        json!({"behavior": "allow", "updatedInput": {"command": "rm -rf build"}})
    );
}

#[tokio::test]
async fn test_callback_sees_context() {
    let manager = PermissionManager::new(Some(PermissionManager::callback(
        |tool, input, ctx| async move {
            assert_eq!(tool.as_str(), "Bash");
            assert_eq!(input["command"], "rm -rf build");
            assert_eq!(ctx.blocked_path.as_deref(), Some("/etc"));
            assert!(matches!(
                ctx.suggestions.as_slice(),
                [PermissionUpdate::SetMode { .. }]
            ));
            Ok(PermissionResult::deny_and_interrupt("destructive command"))
        },
    )));

    let request = bash_request();
    let result = manager
        .decide(&request, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        result.to_response(&request.input),
        json!({"behavior": "deny", "message": "destructive command", "interrupt": true})
    );
}

#[tokio::test]
async fn test_callback_error_propagates() {
    let manager = PermissionManager::new(Some(PermissionManager::callback(
        |_tool, _input, _ctx| async move {
            Err(kodegen_agent_protocol::AgentError::hook("policy store offline"))
        },
    )));
    let result = manager.decide(&bash_request(), CancellationToken::new()).await;
    assert!(result.is_err());
}

#[test]
fn test_allow_with_updated_input() {
    let result = PermissionResult::Allow(PermissionResultAllow {
        updated_input: Some(json!({"command": "ls"})),
        updated_permissions: Some(vec![PermissionUpdate::AddDirectories {
            directories: vec!["/work".to_string()],
            destination: None,
        }]),
    });
    let response = result.to_response(&json!({"command": "rm -rf /"}));
    assert_eq!(response["behavior"], "allow");
    assert_eq!(response["updatedInput"], json!({"command": "ls"}));
    assert_eq!(
        response["updatedPermissions"],
        json!([{"type": "addDirectories", "directories": ["/work"]}])
    );
}

#[test]
fn test_plain_deny() {
    let response = PermissionResult::deny("nope").to_response(&json!({}));
    assert_eq!(
        response,
        json!({"behavior": "deny", "message": "nope", "interrupt": false})
    );
}
