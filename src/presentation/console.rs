//! Console front-end
//!
//! Reads one command per line from stdin and forwards it to the controller.
//! Status updates from the controller are printed as they arrive.

use crate::domain::models::{AppEvent, ColorCommand, MessageSeverity};
use crate::infrastructure::bluetooth::{Intent, LightHandle};
use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

pub const HELP: &str = "\
Commands:
  connect                 scan for the light and connect
  color <r> <g> <b> <w>   set the color (0-255 per channel)
  pattern start           start the pattern animation
  pattern stop            stop the pattern animation
  quit                    exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Intent(Intent),
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_lowercase().as_str(), args.as_slice()) {
        ("connect", []) => ConsoleCommand::Intent(Intent::Connect),
        ("connect", _) => bail!("usage: connect"),
        ("color", [r, g, b, w]) => {
            let color = ColorCommand::new(channel(r)?, channel(g)?, channel(b)?, channel(w)?);
            ConsoleCommand::Intent(Intent::SetColor(color))
        }
        ("color", _) => bail!("usage: color <r> <g> <b> <w>"),
        ("pattern", ["start"]) => ConsoleCommand::Intent(Intent::StartPattern),
        ("pattern", ["stop"]) => ConsoleCommand::Intent(Intent::StopPattern),
        ("pattern", _) => bail!("usage: pattern start|stop"),
        ("help", _) | ("?", _) => ConsoleCommand::Help,
        ("quit", _) | ("exit", _) => ConsoleCommand::Quit,
        (other, _) => return Err(anyhow!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

fn channel(value: &str) -> Result<u8> {
    value
        .parse::<u8>()
        .with_context(|| format!("channel value '{}' is not in 0-255", value))
}

/// Drive `handle` from stdin until `quit` or end of input
pub async fn run(handle: LightHandle, mut events: mpsc::UnboundedReceiver<AppEvent>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(ConsoleCommand::Intent(intent))) => handle.send(intent),
                    Ok(Some(ConsoleCommand::Help)) => println!("{}", HELP),
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(None) => {}
                    Err(e) => println!("error: {}", e),
                }
            }
            Some(event) = events.recv() => print_event(&event),
        }
    }

    Ok(())
}

fn print_event(event: &AppEvent) {
    match event {
        AppEvent::ConnectionStatus(status) => println!("[status] {}", status),
        AppEvent::LogMessage(message) => {
            let tag = match message.severity {
                MessageSeverity::Info => "info",
                MessageSeverity::Success => "ok",
                MessageSeverity::Warning => "warn",
                MessageSeverity::Error => "error",
            };
            println!("[{}] {}", tag, message.message);
        }
    }
}
