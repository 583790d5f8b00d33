//! `Tool` trait, OpenAI-schema projection, and name→tool dispatch (§4.6).

use crate::context::ToolContext;
use crate::error::ToolError;
use async_trait::async_trait;
use dozor_proto::ToolDefinition;
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, ctx: &ToolContext, cancel: &CancellationToken, args: Value) -> Result<String, ToolError>;
}

pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Box<dyn Tool>>>,
}

impl ToolRegistry {
    /// Builds a registry from a fixed set of tools, panicking (a startup
    /// invariant, not a request-path error) if any name repeats.
    pub fn from_tools(tools: Vec<Box<dyn Tool>>) -> Self {
        let mut map = HashMap::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name().to_string();
            if map.insert(name.clone(), tool).is_some() {
                panic!("tool registered twice: {name}");
            }
        }
        Self { tools: RwLock::new(map) }
    }

    pub async fn register(&self, tool: Box<dyn Tool>) {
        let mut tools = self.tools.write().await;
        let name = tool.name().to_string();
        if tools.insert(name.clone(), tool).is_some() {
            panic!("tool registered twice: {name}");
        }
    }

    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .read()
            .await
            .values()
            .map(|t| ToolDefinition { name: t.name().to_string(), description: t.description().to_string(), parameters: t.parameters() })
            .collect()
    }

    /// Projects every registered tool into the OpenAI `{type:"function", function:{...}}` envelope.
    pub async fn openai_schema(&self) -> Vec<Value> {
        self.definitions()
            .await
            .into_iter()
            .map(|d| json!({"type": "function", "function": {"name": d.name, "description": d.description, "parameters": d.parameters}}))
            .collect()
    }

    pub async fn dispatch(&self, ctx: &ToolContext, cancel: &CancellationToken, name: &str, args: Value) -> Result<String, ToolError> {
        let tools = self.tools.read().await;
        let tool = tools.get(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(ctx, cancel, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "returns its input"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _ctx: &ToolContext, _cancel: &CancellationToken, _args: Value) -> Result<String, ToolError> {
            unimplemented!("not exercised by these tests")
        }
    }

    #[test]
    #[should_panic(expected = "tool registered twice")]
    fn from_tools_panics_on_duplicate_name() {
        ToolRegistry::from_tools(vec![Box::new(Echo), Box::new(Echo)]);
    }

    #[tokio::test]
    async fn definitions_list_every_registered_tool() {
        let registry = ToolRegistry::from_tools(vec![Box::new(Echo)]);
        let defs = registry.definitions().await;
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn openai_schema_wraps_each_definition_in_a_function_envelope() {
        let registry = ToolRegistry::from_tools(vec![Box::new(Echo)]);
        let schema = registry.openai_schema().await;
        assert_eq!(schema[0]["type"], "function");
        assert_eq!(schema[0]["function"]["name"], "echo");
    }
}
