//! The model-backend seam.
//!
//! [`Provider`] is what a backend implements, with plain `async fn`s.
//! The orchestrator needs to hold "some backend" behind an `Arc`, which
//! `impl Future` return types rule out, so [`DynProvider`] restates the
//! same operations with boxed futures and a blanket impl covers every
//! `Provider`.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{ChatMessage, ChatResponse};
use crate::error::LlmError;
use crate::stream::ChatStream;

/// A boxed, `Send` future borrowing from `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A chat-completion backend.
pub trait Provider: Send + Sync {
    /// Runs `params` to completion.
    fn generate(
        &self,
        params: &ChatParams,
    ) -> impl Future<Output = Result<ChatResponse, LlmError>> + Send;

    /// Runs `params`, yielding the response incrementally.
    fn stream(
        &self,
        params: &ChatParams,
    ) -> impl Future<Output = Result<ChatStream, LlmError>> + Send;

    /// Which backend and model this is.
    fn metadata(&self) -> ProviderMetadata;
}

/// Dyn-compatible [`Provider`].
pub trait DynProvider: Send + Sync {
    /// See [`Provider::generate`].
    fn generate_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> BoxFuture<'a, Result<ChatResponse, LlmError>>;

    /// See [`Provider::stream`].
    fn stream_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> BoxFuture<'a, Result<ChatStream, LlmError>>;

    /// See [`Provider::metadata`].
    fn metadata(&self) -> ProviderMetadata;
}

impl<P: Provider> DynProvider for P {
    fn generate_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> BoxFuture<'a, Result<ChatResponse, LlmError>> {
        Box::pin(self.generate(params))
    }

    fn stream_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> BoxFuture<'a, Result<ChatStream, LlmError>> {
        Box::pin(self.stream(params))
    }

    fn metadata(&self) -> ProviderMetadata {
        Provider::metadata(self)
    }
}

/// Identifies a backend instance in logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Backend family, such as `"openai"` or `"mock"`.
    pub name: Cow<'static, str>,
    /// Model the backend sends requests to.
    pub model: String,
}

/// One model request.
///
/// ```rust
/// use waymark_core::{ChatMessage, ChatParams};
///
/// let params = ChatParams {
///     messages: vec![ChatMessage::user("Where is Merlion Park?")],
///     temperature: Some(0.2),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatParams {
    /// Conversation so far, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Tools offered to the model.
    pub tools: Option<Vec<ToolDefinition>>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

/// A tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool's name, matched against [`ToolCall::name`](crate::ToolCall::name).
    pub name: String,
    /// Shown to the model so it knows when to use the tool.
    pub description: String,
    /// Schema the arguments must satisfy.
    pub parameters: JsonSchema,
}

/// A JSON Schema document.
///
/// ```rust
/// use waymark_core::JsonSchema;
///
/// let schema = JsonSchema::new(serde_json::json!({
///     "type": "object",
///     "properties": { "query": { "type": "string" } },
///     "required": ["query"]
/// }));
/// assert!(schema.validate(&serde_json::json!({"query": "Jewel"})).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema(Value);

impl JsonSchema {
    /// Wraps a schema document.
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    /// The schema document.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The schema schemars derives for `T`.
    #[cfg(feature = "schema")]
    pub fn from_type<T: schemars::JsonSchema>() -> Result<Self, serde_json::Error> {
        serde_json::to_value(schemars::schema_for!(T)).map(Self)
    }

    /// Checks `value` against the schema, reporting every violation.
    ///
    /// A schema that does not compile is an [`LlmError::InvalidRequest`].
    #[cfg(feature = "schema")]
    pub fn validate(&self, value: &Value) -> Result<(), LlmError> {
        let compiled = jsonschema::validator_for(&self.0)
            .map_err(|e| LlmError::InvalidRequest(format!("invalid JSON schema: {e}")))?;
        let violations: Vec<String> = compiled.iter_errors(value).map(|e| e.to_string()).collect();
        if violations.is_empty() {
            return Ok(());
        }
        Err(LlmError::SchemaValidation {
            message: violations.join("; "),
            schema: self.0.clone(),
            actual: value.clone(),
        })
    }
}
