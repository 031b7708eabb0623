//! Unit tests for `HookRegistry`
//!
//! Tests callback id assignment, the initialize configuration and matcher
//! patterns

use std::collections::HashMap;
use std::time::Duration;

use kodegen_agent_protocol::hooks::{HookMatcherBuilder, HookRegistry};
use kodegen_agent_protocol::{HookCallback, HookCallbackId, HookEvent, HookOutput};
use serde_json::json;

fn noop() -> HookCallback {
    HookRegistry::callback(|_input, _tool_use_id, _context| async { Ok(HookOutput::proceed()) })
}

#[test]
fn test_empty_registry_sends_no_hooks() {
    let registry = HookRegistry::build(&HashMap::new());
    assert!(registry.is_empty());
    assert_eq!(registry.initialize_config(), None);
}

#[test]
fn test_ids_follow_event_then_matcher_order() {
    let config = HashMap::from([
        (
            HookEvent::PostToolUse,
            vec![HookMatcherBuilder::new(Some("Write")).add_hook(noop()).build()],
        ),
        (
            HookEvent::PreToolUse,
            vec![
                HookMatcherBuilder::new(Some("Bash"))
                    .add_hook(noop())
                    .add_hook(noop())
                    .build(),
                HookMatcherBuilder::new(None::<&str>)
                    .add_hook(noop())
                    .timeout(Duration::from_millis(1500))
                    .build(),
            ],
        ),
    ]);

    let registry = HookRegistry::build(&config);
    assert_eq!(registry.len(), 4);

    let sent = registry.initialize_config().unwrap();
    assert_eq!(
        sent,
        json!({
            "PreToolUse": [
                {"matcher": "Bash", "hookCallbackIds": ["hook_0", "hook_1"]},
                {"matcher": null, "hookCallbackIds": ["hook_2"], "timeout": 1.5}
            ],
            "PostToolUse": [
                {"matcher": "Write", "hookCallbackIds": ["hook_3"]}
            ]
        })
    );

    for index in 0..4 {
        assert!(registry.get(&HookCallbackId::from_index(index)).is_some());
    }
    assert!(registry.get(&HookCallbackId::from_index(4)).is_none());
}

#[test]
fn test_matching_ids() {
    let config = HashMap::from([(
        HookEvent::PreToolUse,
        vec![
            HookMatcherBuilder::new(Some("Bash|Write")).add_hook(noop()).build(),
            HookMatcherBuilder::new(Some("*")).add_hook(noop()).build(),
        ],
    )]);
    let registry = HookRegistry::build(&config);

    let ids: Vec<String> = registry
        .matching_ids(HookEvent::PreToolUse, Some("Write"))
        .into_iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(ids, vec!["hook_0", "hook_1"]);

    let ids = registry.matching_ids(HookEvent::PreToolUse, Some("Read"));
    assert_eq!(ids.len(), 1);

    assert!(registry.matching_ids(HookEvent::Stop, None).is_empty());
}

#[test]
fn test_matcher_wildcard() {
    assert!(HookRegistry::matches(Some("*"), Some("any_tool")));
    assert!(HookRegistry::matches(None, Some("any_tool")));
    assert!(HookRegistry::matches(None, None));
}

#[test]
fn test_matcher_specific() {
    assert!(HookRegistry::matches(Some("Bash"), Some("Bash")));
    assert!(!HookRegistry::matches(Some("Bash"), Some("Write")));
    assert!(!HookRegistry::matches(Some("Bash"), None));
}

#[test]
fn test_matcher_alternatives() {
    assert!(HookRegistry::matches(Some("Write|Edit"), Some("Edit")));
    assert!(!HookRegistry::matches(Some("Write|Edit"), Some("Ed")));
}

#[test]
fn test_hook_output_wire_shape() {
    assert_eq!(HookOutput::proceed().to_response(), json!({"continue": true}));
    assert_eq!(
        HookOutput::block("dangerous").to_response(),
        json!({"decision": "block", "reason": "dangerous"})
    );
    assert_eq!(HookOutput::default().to_response(), json!({}));
}

#[test]
fn test_async_hook_output_timeout() {
    use kodegen_agent_protocol::types::AsyncHookOutput;

    let deferred = HookOutput::Async(AsyncHookOutput {
        async_timeout: Some(Duration::from_millis(1500)),
    });
    assert_eq!(
        deferred.to_response(),
        json!({"async": true, "asyncTimeout": 1500})
    );

    // Millisecond counts beyond u64 saturate instead of wrapping
    let forever = HookOutput::Async(AsyncHookOutput {
        async_timeout: Some(Duration::MAX),
    });
    assert_eq!(forever.to_response()["asyncTimeout"], json!(u64::MAX));
}
