//! Tool system exposed through the MCP front-end
//!
//! A tool describes itself with JSON schemas for its input and output. The registry
//! compiles each input schema once at registration and validates every call
//! against it before the tool runs.

use crate::error::AgentError;
use async_trait::async_trait;
use jsonschema::Validator;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::Instrument;

/// A callable tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and schemas of this tool
    fn describe(&self) -> ToolDescription;

    /// Run with parameters that already passed schema validation
    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError>;
}

#[derive(Debug, Clone)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub output_schema: Option<Value>,
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    description: ToolDescription,
    validator: Validator,
}

/// Ordered registry of tools with compiled input validators
#[derive(Default)]
pub struct ToolSystem {
    tools: Vec<RegisteredTool>,
}

impl ToolSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool; names must be unique
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let description = tool.describe();
        if self.find(&description.name).is_some() {
            return Err(ToolError::DuplicateTool(description.name));
        }

        let validator = jsonschema::validator_for(&description.parameters)
            .map_err(|e| ToolError::SchemaError(format!("Schema compilation error: {e}")))?;

        self.tools.push(RegisteredTool {
            tool,
            description,
            validator,
        });
        Ok(())
    }

    fn find(&self, tool_name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.description.name == tool_name)
    }

    /// Get tool description
    pub fn describe_tool(&self, tool_name: &str) -> Option<&ToolDescription> {
        self.find(tool_name).map(|t| &t.description)
    }

    /// Descriptions in registration order
    pub fn descriptions(&self) -> impl Iterator<Item = &ToolDescription> {
        self.tools.iter().map(|t| &t.description)
    }

    /// Execute tool with validated parameters
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        parameters: &Value,
    ) -> Result<Value, ToolError> {
        let registered = self
            .find(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        registered.validator.validate(parameters).map_err(|errors| {
            let error_messages: Vec<String> = errors
                .map(|e| format!("At '{}': {}", e.instance_path, e))
                .collect();
            ToolError::ValidationError(error_messages.join("; "))
        })?;

        registered
            .tool
            .execute(parameters)
            .instrument(crate::tool_span!(tool = tool_name))
            .await
    }

    pub fn list_tools(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| t.description.name.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),
    #[error("Parameter validation failed: {0}")]
    ValidationError(String),
    #[error("Schema error: {0}")]
    SchemaError(String),
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn describe(&self) -> ToolDescription {
            ToolDescription {
                name: "echo".to_string(),
                description: "Echo the message back".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {"message": {"type": "string", "minLength": 1}},
                    "required": ["message"]
                }),
                output_schema: None,
            }
        }

        async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
            Ok(json!({"echo": parameters["message"]}))
        }
    }

    #[tokio::test]
    async fn test_execute_valid_parameters() {
        let mut tools = ToolSystem::new();
        tools.register(Arc::new(EchoTool)).unwrap();

        let result = tools
            .execute_tool("echo", &json!({"message": "hi"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"echo": "hi"}));
    }

    #[tokio::test]
    async fn test_invalid_parameters_are_rejected() {
        let mut tools = ToolSystem::new();
        tools.register(Arc::new(EchoTool)).unwrap();

        let result = tools.execute_tool("echo", &json!({"message": ""})).await;
        assert!(matches!(result, Err(ToolError::ValidationError(_))));

        let result = tools.execute_tool("echo", &json!({})).await;
        assert!(matches!(result, Err(ToolError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let tools = ToolSystem::new();
        let result = tools.execute_tool("unknown", &json!({})).await;
        assert!(matches!(result, Err(ToolError::UnknownTool(_))));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut tools = ToolSystem::new();
        tools.register(Arc::new(EchoTool)).unwrap();
        assert!(matches!(
            tools.register(Arc::new(EchoTool)),
            Err(ToolError::DuplicateTool(_))
        ));
        assert_eq!(tools.list_tools(), vec!["echo".to_string()]);
    }
}
