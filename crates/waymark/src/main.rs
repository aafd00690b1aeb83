//! `waymark` command-line entry point.
//!
//! - `waymark serve` runs the chat endpoint backed by an OpenAI-compatible
//!   model and the place adapters.
//! - `waymark chat` is a terminal client for a running server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use waymark_agent::{GuardMode, Orchestrator, OrchestratorConfig, build_registry};
use waymark_openai::{OpenAiConfig, OpenAiProvider};
use waymark_places::{LocationSearch, LocationSearchConfig, RatingConfig, RatingLookup};

mod chat;
mod server;

#[derive(Parser)]
#[command(name = "waymark", version, about = "Find places by chatting about them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve `POST /api/chat` and `GET /health`.
    Serve(ServeArgs),
    /// Chat with a running server from the terminal.
    Chat(ChatArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "WAYMARK_BIND", default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// API key for the model service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_base_url: String,

    /// Model to use.
    #[arg(long, env = "WAYMARK_MODEL", default_value = "gpt-5-mini")]
    model: String,

    /// Places API key; rating lookups report an error without it.
    #[arg(long, env = "GOOGLE_PLACES_API_KEY", hide_env_values = true)]
    places_api_key: Option<String>,

    /// What to do when tool arguments do not come from the latest user
    /// message: off, warn or reject.
    #[arg(long, env = "WAYMARK_GUARD", default_value_t = GuardMode::Reject)]
    guard: GuardMode,

    /// Maximum model invocations per turn.
    #[arg(long, default_value_t = 5)]
    max_iterations: u32,

    /// Countries location search is restricted to.
    #[arg(long, default_value = "sg")]
    country_codes: String,

    /// Region appended to rating queries.
    #[arg(long, default_value = "Singapore")]
    region: String,
}

impl ServeArgs {
    fn orchestrator(&self) -> Result<Orchestrator> {
        let provider = OpenAiProvider::new(OpenAiConfig {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.model.clone(),
            ..Default::default()
        })
        .context("building model client")?;

        let search = LocationSearch::new(LocationSearchConfig {
            country_codes: self.country_codes.clone(),
            ..Default::default()
        })
        .context("building location search")?;
        let rating = RatingLookup::new(RatingConfig {
            api_key: self.places_api_key.clone().filter(|k| !k.is_empty()),
            region: self.region.clone(),
            ..Default::default()
        })
        .context("building rating lookup")?;
        let registry = build_registry(search, rating).context("building tool registry")?;

        Ok(Orchestrator::new(
            Arc::new(provider),
            registry,
            OrchestratorConfig {
                max_iterations: self.max_iterations,
                guard: self.guard,
                ..Default::default()
            },
        ))
    }
}

#[derive(Args)]
struct ChatArgs {
    /// Base URL of the waymark server.
    #[arg(long, env = "WAYMARK_SERVER", default_value = "http://127.0.0.1:3000")]
    server: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve(args) => {
            let orchestrator = args.orchestrator()?;
            server::serve(args.bind, orchestrator).await
        }
        Command::Chat(args) => chat::run(&args.server).await,
    }
}
