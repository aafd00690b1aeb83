//! Tool registry for managing and executing tools.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::ToolHandler;
use crate::chat::{ToolCall, ToolResult};
use crate::provider::ToolDefinition;

/// A registry of tool handlers, indexed by name.
///
/// Validates tool call arguments against their schemas before
/// dispatching. Cloning is cheap: handlers are shared through `Arc`.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool handler.
    ///
    /// If a handler with the same name already exists, it is replaced.
    pub fn register(&mut self, handler: impl ToolHandler + 'static) -> &mut Self {
        let name = handler.definition().name;
        self.handlers.insert(name, Arc::new(handler));
        self
    }

    /// Returns the definitions of all registered tools, sorted by name so
    /// requests built from them are stable.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.handlers.values().map(|h| h.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Checks that `call` names a registered tool and that its arguments
    /// satisfy the tool's parameter schema.
    ///
    /// The error is the message reported back to the model.
    pub fn validate(&self, call: &ToolCall) -> Result<(), String> {
        let Some(handler) = self.handlers.get(&call.name) else {
            return Err(format!("Unknown tool: {}", call.name));
        };

        #[cfg(feature = "schema")]
        handler
            .definition()
            .parameters
            .validate(&call.arguments)
            .map_err(|e| format!("Invalid arguments for tool '{}': {e}", call.name))?;

        #[cfg(not(feature = "schema"))]
        let _ = handler;

        Ok(())
    }

    /// Executes a single tool call.
    ///
    /// 1. Looks up the handler by [`ToolCall::name`]
    /// 2. Validates arguments against the tool's parameter schema
    /// 3. Invokes the handler once
    ///
    /// Always returns a [`ToolResult`]; unknown tools, invalid arguments
    /// and handler failures are reported through `is_error`.
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        if let Err(message) = self.validate(call) {
            return ToolResult::error(&call.id, message);
        }
        let Some(handler) = self.handlers.get(&call.name) else {
            return ToolResult::error(&call.id, format!("Unknown tool: {}", call.name));
        };

        debug!(tool = %call.name, call_id = %call.id, "dispatching tool call");
        match handler.execute(call.arguments.clone()).await {
            Ok(output) => ToolResult::success(&call.id, output.content),
            Err(e) => ToolResult::error(&call.id, e.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::JsonSchema;
    use crate::tool::{ToolError, tool_fn};
    use serde_json::{Value, json};

    fn query_def(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: format!("{name} tool"),
            parameters: JsonSchema::new(json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"]
            })),
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry
            .register(tool_fn(query_def("echo"), |input: Value| async move {
                Ok(json!({ "echo": input["query"] }))
            }))
            .register(tool_fn(query_def("fail"), |_input: Value| async move {
                Err::<Value, _>(ToolError::new("upstream unavailable"))
            }));
        registry
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn test_definitions_sorted() {
        let names: Vec<_> = registry()
            .definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["echo", "fail"]);
    }

    #[tokio::test]
    async fn test_register_replaces_same_name() {
        let mut registry = registry();
        registry.register(tool_fn(query_def("echo"), |_input: Value| async move {
            Ok("replaced")
        }));
        assert_eq!(registry.definitions().len(), 2);
        let result = registry
            .execute(&call("echo", json!({"query": "x"})))
            .await;
        assert_eq!(result.content, json!("replaced"));
    }

    #[tokio::test]
    async fn test_execute_success() {
        let result = registry()
            .execute(&call("echo", json!({"query": "Jewel"})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.tool_call_id, "call_1");
        assert_eq!(result.content, json!({"echo": "Jewel"}));
    }

    #[tokio::test]
    async fn test_execute_unknown_tool() {
        let result = registry().execute(&call("nope", json!({}))).await;
        assert!(result.is_error);
        assert_eq!(result.content_text(), "Unknown tool: nope");
    }

    #[tokio::test]
    async fn test_execute_invalid_arguments() {
        let result = registry()
            .execute(&call("echo", json!({"query": 7})))
            .await;
        assert!(result.is_error);
        assert!(result.content_text().starts_with("Invalid arguments for tool 'echo'"));
    }

    #[test]
    fn test_validate() {
        let registry = registry();
        assert!(registry.validate(&call("echo", json!({"query": "x"}))).is_ok());
        assert_eq!(
            registry.validate(&call("nope", json!({}))).unwrap_err(),
            "Unknown tool: nope"
        );
        assert!(registry.validate(&call("echo", json!({}))).is_err());
    }

    #[tokio::test]
    async fn test_execute_handler_error() {
        let result = registry()
            .execute(&call("fail", json!({"query": "x"})))
            .await;
        assert!(result.is_error);
        assert_eq!(result.content_text(), "upstream unavailable");
    }
}
