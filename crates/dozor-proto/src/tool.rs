//! Tool-protocol wire shapes shared between the registry and the LLM client (§4.6).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tool's advertised shape: `{name, description, parameters}` where
/// `parameters` is a JSON-schema object, projected into the OpenAI
/// `{type:"function", function:{...}}` envelope by `dozor-llm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A single tool invocation requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}
