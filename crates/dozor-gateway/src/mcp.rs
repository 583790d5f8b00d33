//! Tool-protocol request/response shapes and dispatch (§6 Tool protocol).

use crate::state::GatewayState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum McpRequest {
    ListTools,
    CallTool {
        name: String,
        #[serde(default)]
        arguments: Value,
    },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum McpResponse {
    Tools { tools: Vec<dozor_proto::ToolDefinition> },
    Result { result: String },
    Error { error: String },
}

/// Executes one tool-protocol request against the shared registry and tool
/// context. Errors are returned as a distinct `McpResponse::Error` variant,
/// never folded into `result` text (§6 return convention).
pub async fn handle(state: &Arc<GatewayState>, request: McpRequest) -> McpResponse {
    match request {
        McpRequest::ListTools => McpResponse::Tools { tools: state.registry.definitions().await },
        McpRequest::CallTool { name, arguments } => {
            let cancel = CancellationToken::new();
            match state.registry.dispatch(&state.tool_ctx, &cancel, &name, arguments).await {
                Ok(result) => McpResponse::Result { result },
                Err(err) => McpResponse::Error { error: err.to_string() },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_tools_request_parses_without_a_body() {
        let parsed: McpRequest = serde_json::from_value(serde_json::json!({"action": "list_tools"})).unwrap();
        assert!(matches!(parsed, McpRequest::ListTools));
    }

    #[test]
    fn call_tool_request_defaults_arguments_to_null() {
        let parsed: McpRequest = serde_json::from_value(serde_json::json!({"action": "call_tool", "name": "server_inspect"})).unwrap();
        match parsed {
            McpRequest::CallTool { name, arguments } => {
                assert_eq!(name, "server_inspect");
                assert!(arguments.is_null());
            }
            _ => panic!("expected CallTool"),
        }
    }
}
