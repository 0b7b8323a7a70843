//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what let the model act on the connected account: run an AWS CLI
//! command, persist classified findings, or record a remediation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content fed back to the model
    pub output: String,

    /// The tool finished the mission; the agent loop must stop after this call
    #[serde(default)]
    pub completes_mission: bool,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            completes_mission: false,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            completes_mission: false,
        }
    }

    /// Mark this result as the mission's completion signal.
    pub fn completing(mut self) -> Self {
        self.completes_mission = true;
        self
    }
}

/// The core Tool trait.
///
/// Handlers own deep validation of their arguments. The registry only
/// guarantees that the fields the schema lists as required are present.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "aws_cli").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, keyed by name.
///
/// Each mission builds its own registry, so the catalogue the model sees is
/// exactly the set of tools that mission may dispatch.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Builder-style `register`.
    pub fn with(mut self, tool: Box<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the model), ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Dispatch a tool call.
    ///
    /// Returns `ToolError::NotFound` for an unregistered name and
    /// `ToolError::InvalidArguments` when a required field is absent.
    pub async fn dispatch(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let definition = tool.to_definition();
        let missing: Vec<&str> = definition
            .required_fields()
            .into_iter()
            .filter(|field| call.arguments.get(field).is_none_or(|v| v.is_null()))
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::InvalidArguments(format!(
                "{} is missing required field(s): {}",
                call.name,
                missing.join(", ")
            )));
        }

        tool.execute(call.arguments.clone()).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolResult::ok(text))
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = ToolRegistry::new().with(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_definitions() {
        let registry = ToolRegistry::new().with(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn dispatch_runs_tool() {
        let registry = ToolRegistry::new().with(Box::new(EchoTool));
        let result = registry
            .dispatch(&call("echo", serde_json::json!({"text": "hello world"})))
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.completes_mission);
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .dispatch(&call("nonexistent", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "nonexistent"));
    }

    #[tokio::test]
    async fn dispatch_rejects_missing_required_field() {
        let registry = ToolRegistry::new().with(Box::new(EchoTool));
        let err = registry
            .dispatch(&call("echo", serde_json::json!({"other": 1})))
            .await
            .unwrap_err();
        match err {
            ToolError::InvalidArguments(msg) => assert!(msg.contains("text")),
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_treats_null_as_missing() {
        let registry = ToolRegistry::new().with(Box::new(EchoTool));
        let err = registry
            .dispatch(&call("echo", serde_json::json!({"text": null})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
