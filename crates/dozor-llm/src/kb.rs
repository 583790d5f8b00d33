//! Knowledge-base client: two opaque remote tools (`search`, `save`)
//! invoked over HTTP and guarded by a circuit breaker (§6 collaborator
//! contracts, §4.5).

use crate::error::LlmError;
use dozor_breaker::{BreakerError, CircuitBreaker};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Text surfaced in place of a real KB answer once the breaker trips, so
/// callers (triage, the agent loop) can fold it into a report or reply
/// without special-casing the circuit-open condition.
pub const CIRCUIT_OPEN_MESSAGE: &str = "KB temporarily unavailable (circuit breaker open)";

const NO_RESULTS_MESSAGE: &str = "No relevant knowledge found.";

/// Wiring for a remote knowledge-base server: two tool names plus the
/// user/cube scope every call is made under.
#[derive(Debug, Clone)]
pub struct KbConfig {
    pub server: String,
    pub user: String,
    pub cube: String,
    pub search_tool: String,
    pub save_tool: String,
}

#[derive(Debug, Deserialize)]
struct RemoteToolResponse {
    result: Value,
}

#[derive(Debug, Deserialize, Default)]
struct MemoryEntry {
    memory: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MemoryGroup {
    #[serde(default)]
    memories: Vec<MemoryEntry>,
}

#[derive(Debug, Deserialize, Default)]
struct KbData {
    #[serde(default)]
    text_mem: Vec<MemoryGroup>,
    #[serde(default)]
    act_mem: Vec<MemoryEntry>,
    #[serde(default)]
    skill_mem: Vec<MemoryGroup>,
}

#[derive(Debug, Deserialize, Default)]
struct KbDocument {
    #[serde(default)]
    data: KbData,
}

/// Flattens the KB's nested memory document into one newline-joined string,
/// per the `result.data.{text_mem[].memories[].memory, act_mem[].memory,
/// skill_mem[].memories[].memory}` traversal.
fn extract_memories(document: &KbDocument) -> String {
    let mut lines = Vec::new();
    for group in &document.data.text_mem {
        lines.extend(group.memories.iter().filter_map(|m| m.memory.clone()));
    }
    lines.extend(document.data.act_mem.iter().filter_map(|m| m.memory.clone()));
    for group in &document.data.skill_mem {
        lines.extend(group.memories.iter().filter_map(|m| m.memory.clone()));
    }

    if lines.is_empty() { NO_RESULTS_MESSAGE.to_string() } else { lines.join("\n") }
}

/// Calls the remote knowledge base's `search`/`save` tools, wrapping both
/// behind one circuit breaker (threshold 3, reset 5 min by default — §4.5).
pub struct KbClient {
    http: reqwest::Client,
    config: KbConfig,
    breaker: CircuitBreaker,
}

impl KbClient {
    pub fn new(config: KbConfig, breaker_threshold: u32, breaker_reset: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            breaker: CircuitBreaker::new("kb", breaker_threshold, breaker_reset),
        }
    }

    /// Searches the knowledge base for `query`, returning extracted memory
    /// text. Never propagates the breaker-open condition as an error —
    /// callers get [`CIRCUIT_OPEN_MESSAGE`] back instead, matching how a
    /// stale KB degrades triage output rather than failing it.
    pub async fn search(&self, query: &str) -> String {
        match self.call_guarded(&self.config.search_tool.clone(), serde_json::json!({ "query": query })).await {
            Ok(document) => extract_memories(&document),
            Err(BreakerError::Open(_)) => CIRCUIT_OPEN_MESSAGE.to_string(),
            Err(BreakerError::Inner(err)) => format!("KB search failed: {err}"),
        }
    }

    /// Saves `memory` to the knowledge base. Surfaces the breaker's open
    /// state distinctly so callers can skip retrying a known-down KB.
    pub async fn save(&self, memory: &str) -> Result<(), LlmError> {
        match self.call_guarded(&self.config.save_tool.clone(), serde_json::json!({ "memory": memory })).await {
            Ok(_) => Ok(()),
            Err(BreakerError::Open(_)) => Err(LlmError::CircuitOpen),
            Err(BreakerError::Inner(err)) => Err(err),
        }
    }

    async fn call_guarded(&self, tool: &str, arguments: Value) -> Result<KbDocument, BreakerError<LlmError>> {
        self.breaker.execute(|| self.call_once(tool, arguments.clone())).await
    }

    async fn call_once(&self, tool: &str, arguments: Value) -> Result<KbDocument, LlmError> {
        let body = serde_json::json!({
            "tool": tool,
            "user": self.config.user,
            "cube": self.config.cube,
            "arguments": arguments,
        });
        let response = self.http.post(&self.config.server).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::ServerError { status: status.as_u16() });
        }
        let parsed: RemoteToolResponse = response.json().await?;
        Ok(serde_json::from_value(parsed.result).unwrap_or_default())
    }

    pub fn breaker_state(&self) -> dozor_breaker::BreakerState {
        self.breaker.state()
    }
}
