//! Client-side state for waymark conversations.
//!
//! A [`Session`] folds the streamed [`TurnEvent`](waymark_core::TurnEvent)s
//! of each reply into a message history and keeps a map in step with the
//! latest location result:
//!
//! ```text
//! TurnEvent ──► ConversationState ──► ResultDeduplicator ──► MapSynchronizer ──► MapSurface
//!  (sse)          (reducer)              (dedup)                 (map)
//! ```
//!
//! | Module | Role |
//! |--------|------|
//! | [`reducer`] | messages, parts and status |
//! | [`dedup`] | fingerprints location results |
//! | [`map`] | reconciles features against a [`MapSurface`] |
//! | [`transcript`] | text rendering of messages |
//! | [`sse`] | `/api/chat` client and event decoder |

#![warn(missing_docs)]

pub mod dedup;
mod error;
pub mod map;
pub mod reducer;
mod session;
pub mod sse;
pub mod transcript;

pub use dedup::ResultDeduplicator;
pub use error::{DecodeError, MapError, SessionError, TransportError};
pub use map::{
    FitOptions, LngLatBounds, MapSurface, MapSynchronizer, MarkerId, Reconciliation,
    RenderSummary, TerminalMap,
};
pub use reducer::{ConversationState, Message, Part, Role, Status, ToolOutcome};
pub use session::Session;
pub use sse::{ChatClient, EventStream, WireMessage};

/// Name of the location search tool on the wire.
pub const LOCATION_TOOL: &str = "search_location";

/// Name of the review-rating tool on the wire.
pub const RATING_TOOL: &str = "get_review_rating";

/// Most features shown on the map at once.
pub const MAX_MAP_FEATURES: usize = 10;
