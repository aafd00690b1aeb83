//! Tools the model can call.
//!
//! A [`ToolHandler`] pairs a [`ToolDefinition`](crate::ToolDefinition)
//! with the code that runs it; a [`ToolRegistry`] indexes handlers by name
//! and checks each call before running it. Feeding results back to the
//! model is the orchestrator's job, in `waymark-agent`.
//!
//! ```rust
//! use waymark_core::tool::{ToolRegistry, tool_fn};
//! use waymark_core::{JsonSchema, ToolDefinition};
//! use serde_json::{json, Value};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(tool_fn(
//!     ToolDefinition {
//!         name: "echo".into(),
//!         description: "Echo the query back".into(),
//!         parameters: JsonSchema::new(json!({
//!             "type": "object",
//!             "properties": { "query": { "type": "string" } },
//!             "required": ["query"]
//!         })),
//!     },
//!     |input: Value| async move { Ok(input["query"].clone()) },
//! ));
//! assert_eq!(registry.definitions()[0].name, "echo");
//! ```

use serde_json::Value;

mod handler;
mod registry;

pub use handler::{FnToolHandler, ToolHandler, tool_fn};
pub use registry::ToolRegistry;

/// A tool failure. `message` is what the model is told.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    /// Sentence describing the failure.
    pub message: String,
}

impl ToolError {
    /// A failure reading `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("Invalid tool arguments: {err}"))
    }
}

/// What a tool returns: structured JSON, forwarded unchanged to clients.
///
/// ```rust
/// use waymark_core::tool::ToolOutput;
///
/// let output = ToolOutput::from("done");
/// assert_eq!(output.content, "done");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// The JSON result.
    pub content: Value,
}

impl From<Value> for ToolOutput {
    fn from(content: Value) -> Self {
        Self { content }
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Value::String(text).into()
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        text.to_owned().into()
    }
}
