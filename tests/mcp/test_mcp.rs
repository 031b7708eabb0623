//! Unit tests for in-process tool servers and their routing

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use kodegen_agent_protocol::mcp::{
    JsonRpcRequest, JsonRpcResponse, McpError, SdkMcpServer, SdkMcpTool, ToolResult, ToolServer,
    ToolServerRouter,
};
use kodegen_agent_protocol::{AgentError, Result};
use serde_json::json;

fn calculator() -> SdkMcpServer {
    SdkMcpServer::new("calc")
        .version("1.2.0")
        .tool(SdkMcpTool::new(
            "add",
            "Add two numbers",
            json!({
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }),
            |input| async move {
                let a = input["a"].as_f64().unwrap_or_default();
                let b = input["b"].as_f64().unwrap_or_default();
                Ok(ToolResult::text(format!("{}", a + b)))
            },
        ))
        .tool(SdkMcpTool::new(
            "divide",
            "Divide a by b",
            json!({"type": "object"}),
            |input| async move {
                let b = input["b"].as_f64().unwrap_or_default();
                if b == 0.0 {
                    return Err(AgentError::mcp("division by zero"));
                }
                Ok(ToolResult::text(format!("{}", input["a"].as_f64().unwrap_or_default() / b)))
            },
        ))
}

/// Server whose handler fails or panics, depending on the method
struct FaultyServer;

impl ToolServer for FaultyServer {
    fn name(&self) -> &str {
        "faulty"
    }

    fn handle<'a>(
        &'a self,
        request: JsonRpcRequest,
    ) -> Pin<Box<dyn Future<Output = Result<JsonRpcResponse>> + Send + 'a>> {
        Box::pin(async move {
            if request.method == "explode" {
                panic!("tool server bug");
            }
            Err(AgentError::mcp("backend unavailable"))
        })
    }
}

fn router() -> ToolServerRouter {
    let servers: HashMap<String, Arc<dyn ToolServer>> = HashMap::from([
        ("calc".to_string(), Arc::new(calculator()) as Arc<dyn ToolServer>),
        ("faulty".to_string(), Arc::new(FaultyServer) as Arc<dyn ToolServer>),
    ]);
    ToolServerRouter::new(servers)
}

#[tokio::test]
async fn test_initialize() {
    let response = calculator()
        .handle_request(JsonRpcRequest::new(json!(1), "initialize", None))
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"], json!({"name": "calc", "version": "1.2.0"}));
    assert!(result["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_tools_list() {
    let response = calculator()
        .handle_request(JsonRpcRequest::new(json!("list"), "tools/list", None))
        .await
        .unwrap();
    assert_eq!(response.id, json!("list"));
    let tools = response.result.unwrap()["tools"].clone();
    let names: Vec<&str> = tools
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["add", "divide"]);
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["a", "b"]));
}

#[tokio::test]
async fn test_tools_call() {
    let response = calculator()
        .handle_request(JsonRpcRequest::new(
            json!(2),
            "tools/call",
            Some(json!({"name": "add", "arguments": {"a": 2, "b": 3}})),
        ))
        .await
        .unwrap();
    assert!(!response.is_error());
    assert_eq!(
        response.result.unwrap(),
        json!({"content": [{"type": "text", "text": "5"}]})
    );
}

#[tokio::test]
async fn test_failing_tool_is_flagged() {
    let response = calculator()
        .handle_request(JsonRpcRequest::new(
            json!(3),
            "tools/call",
            Some(json!({"name": "divide", "arguments": {"a": 1, "b": 0}})),
        ))
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["isError"], true);
    assert!(
        result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("division by zero")
    );
}

#[tokio::test]
async fn test_call_errors() {
    let server = calculator();

    let missing_params = server
        .handle_request(JsonRpcRequest::new(json!(4), "tools/call", None))
        .await
        .unwrap();
    assert_eq!(missing_params.error.unwrap().code, -32602);

    let unknown_tool = server
        .handle_request(JsonRpcRequest::new(
            json!(5),
            "tools/call",
            Some(json!({"name": "sqrt"})),
        ))
        .await
        .unwrap();
    assert_eq!(unknown_tool.error.unwrap(), McpError::tool_not_found("sqrt"));

    let unknown_method = server
        .handle_request(JsonRpcRequest::new(json!(6), "resources/list", None))
        .await
        .unwrap();
    assert_eq!(unknown_method.error.unwrap().code, -32601);
}

#[tokio::test]
async fn test_router_preserves_id() {
    let reply = router()
        .route(
            "calc",
            json!({"jsonrpc": "2.0", "id": "abc", "method": "tools/list"}),
        )
        .await;
    assert_eq!(reply["jsonrpc"], "2.0");
    assert_eq!(reply["id"], "abc");
    assert!(reply.get("error").is_none());
}

#[tokio::test]
async fn test_router_unknown_server() {
    let reply = router()
        .route("weather", json!({"jsonrpc": "2.0", "id": 9, "method": "tools/list"}))
        .await;
    assert_eq!(reply["id"], 9);
    assert_eq!(reply["error"]["code"], -32601);
    assert_eq!(reply["error"]["message"], "Server 'weather' not found");
}

#[tokio::test]
async fn test_router_server_error_and_panic() {
    let router = router();

    let failed = router
        .route("faulty", json!({"jsonrpc": "2.0", "id": 10, "method": "tools/list"}))
        .await;
    assert_eq!(failed["id"], 10);
    assert_eq!(failed["error"]["code"], -32603);

    let panicked = router
        .route("faulty", json!({"jsonrpc": "2.0", "id": 11, "method": "explode"}))
        .await;
    assert_eq!(panicked["id"], 11);
    assert_eq!(panicked["error"]["code"], -32603);
}

#[tokio::test]
async fn test_router_invalid_message() {
    let reply = router().route("calc", json!({"id": 12, "params": 5})).await;
    assert_eq!(reply["id"], 12);
    assert_eq!(reply["error"]["code"], -32600);
}

#[test]
fn test_router_names_sorted() {
    let router = router();
    assert_eq!(router.names(), vec!["calc", "faulty"]);
    assert!(router.contains("calc"));
    assert!(!router.contains("weather"));
    assert!(!router.is_empty());
}
