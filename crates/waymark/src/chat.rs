//! Terminal chat client.
//!
//! Reads one message per line, streams the reply as it arrives, then
//! prints the location list or rating the reply carried and the state of
//! the map.

use std::io::Write;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use waymark_core::TurnEvent;
use waymark_session::{ChatClient, Session, Status, TerminalMap, WireMessage, transcript};

const GREETING: &str = "Ask about a location, e.g. \"Where is Merlion Park?\". Type /quit to leave.";
const QUIT: &str = "/quit";

/// Runs the chat loop against the server at `server` until stdin closes
/// or the user types `/quit`.
pub async fn run(server: &str) -> Result<()> {
    let client = ChatClient::new(server).context("building chat client")?;
    let mut session = Session::new(TerminalMap::new());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{GREETING}");
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            break;
        };
        let line = line.trim();
        if line == QUIT {
            break;
        }
        if line.is_empty() {
            continue;
        }
        let history = match session.submit(line) {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "message not sent");
                continue;
            }
        };

        stream_reply(&client, &mut session, &history).await?;
        report(&mut session);
    }

    session.dispose();
    Ok(())
}

fn prompt() -> Result<()> {
    let mut stdout = std::io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    Ok(())
}

async fn stream_reply(
    client: &ChatClient,
    session: &mut Session<TerminalMap>,
    history: &[WireMessage],
) -> Result<()> {
    let mut events = match client.send(history).await {
        Ok(events) => events,
        Err(e) => {
            session.fail(e.to_string());
            return Ok(());
        }
    };

    let mut stdout = std::io::stdout();
    while let Some(item) = events.next().await {
        let event = match item {
            Ok(event) => event,
            Err(e) => {
                session.fail(e.to_string());
                break;
            }
        };
        if let TurnEvent::TextDelta { text } = &event {
            write!(stdout, "{text}")?;
            stdout.flush()?;
        }
        let terminal = event.is_terminal();
        if let Err(e) = session.apply(event) {
            warn!(error = %e, "map update failed");
        }
        if terminal {
            break;
        }
    }
    writeln!(stdout)?;

    if session.state().status() == Status::Streaming {
        session.fail("Connection closed before the reply finished");
    }
    Ok(())
}

fn report(session: &mut Session<TerminalMap>) {
    if let Some(message) = session.state().messages().last() {
        for extra in transcript::extras(message) {
            println!("{extra}");
        }
    }
    if let Some(error) = session.state().last_error() {
        println!("Error: {error}");
    }
    session.clear_error();
    if let Some(map) = session.map().surface() {
        println!("{}", map.render());
    }
}
