//! # waymark-core
//!
//! Shared vocabulary for the waymark location assistant: chat messages,
//! model-backend traits, streaming events, the UI event protocol, and the
//! tool registry.
//!
//! It contains **no** backend-specific code. The OpenAI-compatible
//! backend lives in `waymark-openai`, the geodata adapters in
//! `waymark-places`, and the conversation loop in `waymark-agent`.
//!
//! ```text
//!  ┌────────────────┐ ┌────────────────┐ ┌─────────────────┐
//!  │ waymark-openai │ │ waymark-places │ │ waymark-session │
//!  └───────┬────────┘ └───────┬────────┘ └────────┬────────┘
//!          │                  │                   │
//!          │          ┌───────┴───────┐           │
//!          │          │ waymark-agent │           │
//!          │          └───────┬───────┘           │
//!          └──────────────────┼───────────────────┘
//!                             ▼
//!              ┌──────────────────────────────┐
//!              │        waymark-core          │
//!              │ (Provider, TurnEvent, tools) │
//!              └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chat`] | Messages, content blocks, tool calls, and responses |
//! | [`error`] | Unified [`LlmError`] for model-service failures |
//! | [`event`] | [`TurnEvent`], the client-facing event protocol |
//! | [`provider`] | The [`Provider`] trait and request parameters |
//! | [`stream`] | Backend streaming events and the [`ChatStream`] alias |
//! | [`tool`] | Tool handlers and the [`ToolRegistry`] |

#![warn(missing_docs)]

pub mod chat;
pub mod error;
pub mod event;
pub mod provider;
pub mod stream;
pub mod tool;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use chat::{ChatMessage, ChatResponse, ChatRole, ContentBlock, StopReason, ToolCall, ToolResult};
pub use error::LlmError;
pub use event::TurnEvent;
pub use provider::{
    BoxFuture, ChatParams, DynProvider, JsonSchema, Provider, ProviderMetadata, ToolDefinition,
};
pub use stream::{ChatStream, StreamEvent};
pub use tool::{ToolHandler, ToolRegistry};
