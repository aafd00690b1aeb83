//! The handler trait and its closure-backed implementation.

use std::future::Future;

use serde_json::Value;

use super::{ToolError, ToolOutput};
use crate::provider::{BoxFuture, ToolDefinition};

/// One callable tool.
///
/// Stateful tools (an HTTP client, a config) implement this directly;
/// anything else can go through [`tool_fn`]. Futures are boxed so
/// handlers can live in an `Arc<dyn ToolHandler>`.
pub trait ToolHandler: Send + Sync {
    /// Name, description and parameter schema.
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool. Through [`ToolRegistry`](super::ToolRegistry),
    /// `input` has already passed schema validation.
    fn execute(&self, input: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>>;
}

/// A [`ToolHandler`] wrapping an async closure. See [`tool_fn`].
pub struct FnToolHandler<F> {
    definition: ToolDefinition,
    handler: F,
}

impl<F> std::fmt::Debug for FnToolHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnToolHandler")
            .field("name", &self.definition.name)
            .finish_non_exhaustive()
    }
}

impl<F, Fut, O> ToolHandler for FnToolHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    O: Into<ToolOutput> + Send + 'static,
{
    fn definition(&self) -> ToolDefinition {
        self.definition.clone()
    }

    fn execute(&self, input: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        let running = (self.handler)(input);
        Box::pin(async move { running.await.map(Into::into) })
    }
}

/// Builds a tool from `definition` and an async closure over the JSON
/// arguments. The closure may return anything convertible to
/// [`ToolOutput`], such as a `Value` or a `String`.
///
/// ```rust
/// use waymark_core::tool::tool_fn;
/// use waymark_core::{JsonSchema, ToolDefinition};
/// use serde_json::{json, Value};
///
/// let shout = tool_fn(
///     ToolDefinition {
///         name: "shout".into(),
///         description: "Upper-case the text".into(),
///         parameters: JsonSchema::new(json!({"type": "object"})),
///     },
///     |input: Value| async move {
///         Ok(input["text"].as_str().unwrap_or_default().to_uppercase())
///     },
/// );
/// ```
pub fn tool_fn<F, Fut, O>(definition: ToolDefinition, handler: F) -> FnToolHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    O: Into<ToolOutput> + Send + 'static,
{
    FnToolHandler {
        definition,
        handler,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::JsonSchema;
    use serde_json::json;

    fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "shout".into(),
            description: "Upper-case the text".into(),
            parameters: JsonSchema::new(json!({"type": "object"})),
        }
    }

    #[tokio::test]
    async fn test_closure_output_converted() {
        let handler = tool_fn(definition(), |input: Value| async move {
            Ok(input["text"].as_str().unwrap_or_default().to_uppercase())
        });
        let output = handler.execute(json!({"text": "jewel"})).await.unwrap();
        assert_eq!(output.content, json!("JEWEL"));
        assert_eq!(handler.definition().name, "shout");
    }

    #[tokio::test]
    async fn test_closure_error_passed_through() {
        let handler = tool_fn(definition(), |_input: Value| async move {
            Err::<Value, _>(ToolError::new("down"))
        });
        let err = handler.execute(json!({})).await.unwrap_err();
        assert_eq!(err.message, "down");
    }
}
