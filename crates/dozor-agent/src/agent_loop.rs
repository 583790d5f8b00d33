//! Bounded tool-calling loop (§4.7).

use dozor_llm::{ChatMessage, LlmClient, LlmError, WireFunctionCall, WireToolCall};
use dozor_tools::{ToolContext, ToolRegistry};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const MAX_TOOL_RESULT_CHARS: usize = 30_000;
const MAX_REPEAT_FAILS: u32 = 2;
const ESCALATION_WARNING_LOOKAHEAD: u32 = 5;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("max tool iterations reached")]
    MaxIterations,
    #[error("{0}")]
    RepeatedFailure(String),
    #[error("request canceled")]
    Cancelled,
    #[error(transparent)]
    Llm(#[from] LlmError),
}

fn truncate_tool_result(text: &str) -> String {
    if text.chars().count() <= MAX_TOOL_RESULT_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_TOOL_RESULT_CHARS).collect();
        format!("{head}... (truncated)")
    }
}

fn assistant_message(content: Option<String>, tool_calls: &[dozor_proto::ToolCallRequest]) -> ChatMessage {
    let wire_calls = tool_calls
        .iter()
        .map(|call| WireToolCall {
            id: call.id.clone(),
            kind: "function".to_string(),
            function: WireFunctionCall { name: call.name.clone(), arguments: call.arguments.to_string() },
        })
        .collect();
    ChatMessage { role: "assistant".to_string(), content, tool_call_id: None, tool_calls: Some(wire_calls) }
}

/// Drives `llm` through bounded tool calls dispatched via `registry`
/// against `ctx`, returning the final textual answer.
pub struct AgentLoop<'a> {
    pub registry: &'a ToolRegistry,
    pub llm: &'a LlmClient,
    pub ctx: &'a ToolContext,
    pub max_iters: u32,
}

impl<'a> AgentLoop<'a> {
    pub fn new(registry: &'a ToolRegistry, llm: &'a LlmClient, ctx: &'a ToolContext, max_iters: u32) -> Self {
        Self { registry, llm, ctx, max_iters }
    }

    pub async fn run(&self, cancel: &CancellationToken, system_prompt: String, request: String) -> Result<String, AgentError> {
        let tools = self.registry.definitions().await;
        let mut messages = vec![ChatMessage::system(system_prompt), ChatMessage::user(request)];

        let mut last_failure: Option<(String, String)> = None;
        let mut consecutive_fails: u32 = 0;

        for iter in 0..self.max_iters {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if self.max_iters >= ESCALATION_WARNING_LOOKAHEAD && iter == self.max_iters - ESCALATION_WARNING_LOOKAHEAD {
                messages.push(ChatMessage::user(
                    "You are running low on tool-call iterations. Wrap up now: summarize what you've found, \
                     or escalate to the operator if you cannot finish the task in the remaining turns.",
                ));
            }

            let reply = self.llm.chat(&messages, &tools).await?;

            if reply.tool_calls.is_empty() {
                match reply.content {
                    Some(content) if !content.trim().is_empty() => return Ok(content),
                    _ => {
                        warn!(iter, "LLM returned empty content with no tool calls, continuing");
                        continue;
                    }
                }
            }

            messages.push(assistant_message(reply.content.clone(), &reply.tool_calls));

            for call in &reply.tool_calls {
                if cancel.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }

                let outcome = self.registry.dispatch(self.ctx, cancel, &call.name, call.arguments.clone()).await;
                let (result_text, failure) = match outcome {
                    Ok(output) => (output, None),
                    Err(err) => {
                        let message = err.to_string();
                        (message.clone(), Some(message))
                    }
                };
                messages.push(ChatMessage::tool_result(call.id.clone(), truncate_tool_result(&result_text)));

                match failure {
                    None => {
                        last_failure = None;
                        consecutive_fails = 0;
                    }
                    Some(err_msg) => {
                        let key = (call.name.clone(), err_msg);
                        if last_failure.as_ref() == Some(&key) {
                            consecutive_fails += 1;
                        } else {
                            consecutive_fails = 1;
                        }
                        last_failure = Some(key.clone());
                        if consecutive_fails > MAX_REPEAT_FAILS {
                            return Err(AgentError::RepeatedFailure(format!(
                                "tool '{}' failed {} consecutive times with the same error: {}",
                                key.0, consecutive_fails, key.1
                            )));
                        }
                    }
                }
            }
        }

        Err(AgentError::MaxIterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_results_pass_through_untouched() {
        assert_eq!(truncate_tool_result("hello"), "hello");
    }

    #[test]
    fn long_results_are_truncated_with_marker() {
        let long = "a".repeat(MAX_TOOL_RESULT_CHARS + 100);
        let truncated = truncate_tool_result(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert_eq!(truncated.chars().count(), MAX_TOOL_RESULT_CHARS + "... (truncated)".len());
    }
}
