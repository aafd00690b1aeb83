//! OpenAI-compatible backend for waymark.
//!
//! Implements [`Provider`](waymark_core::Provider) against
//! `POST {base_url}/chat/completions`, including streaming with
//! incremental tool-call arguments. Any server speaking the same wire
//! format (proxies, local gateways) works by overriding `base_url`.
//!
//! ```rust,no_run
//! use waymark_openai::{OpenAiConfig, OpenAiProvider};
//!
//! let provider = OpenAiProvider::new(OpenAiConfig {
//!     api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
//!     ..Default::default()
//! })
//! .expect("HTTP client");
//! ```

#![warn(missing_docs)]

mod config;
mod convert;
mod provider;
mod stream;
mod types;

pub use config::OpenAiConfig;
pub use provider::OpenAiProvider;
