//! Conversation orchestration for waymark.
//!
//! This crate sits between a model backend and the place adapters:
//!
//! - [`policy`] holds the usage instructions sent to the model.
//! - [`tools`] registers `search_location` and `get_review_rating`.
//! - [`guard`] checks that tool arguments come from the latest user message.
//! - [`orchestrator`] runs one turn and streams [`TurnEvent`](waymark_core::TurnEvent)s.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use waymark_agent::{HistoryMessage, Orchestrator, OrchestratorConfig, build_registry};
//! use waymark_places::{LocationSearch, RatingLookup};
//!
//! # async fn example(provider: Arc<dyn waymark_core::DynProvider>) -> Result<(), Box<dyn std::error::Error>> {
//! let registry = build_registry(
//!     LocationSearch::new(Default::default())?,
//!     RatingLookup::new(Default::default())?,
//! )?;
//! let orchestrator = Orchestrator::new(provider, registry, OrchestratorConfig::default());
//!
//! let mut events = orchestrator.handle(vec![HistoryMessage::user("Where is Merlion Park?")]);
//! while let Some(event) = events.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod guard;
pub mod orchestrator;
pub mod policy;
pub mod tools;

pub use guard::{GuardMode, ParseGuardModeError};
pub use orchestrator::{HistoryMessage, Orchestrator, OrchestratorConfig, TurnStream};
pub use tools::{GET_REVIEW_RATING, SEARCH_LOCATION, build_registry};
