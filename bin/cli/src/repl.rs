//! Interactive chat loop and dialogue runner.

use crate::error::CliError;
use parley_conversation::{
    ChatTarget, TurnOrchestrator, format_reply, format_transcript_line,
};
use rootcause::Report;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

const HELP: &str = "Commands:
  /target <claude|gemini|both>  choose who answers
  /reset                        clear the conversation history
  /help                         show this help
  /quit                         leave";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Text to send to the current target.
    Message(String),
    /// Switch target.
    Target(String),
    Reset,
    Help,
    Quit,
    /// Blank line.
    Empty,
    /// A slash command that does not exist.
    Unknown(String),
}

impl ReplCommand {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line.to_string());
        };

        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, arg)| (name, arg.trim()));
        match name.to_ascii_lowercase().as_str() {
            "quit" | "exit" => Self::Quit,
            "reset" => Self::Reset,
            "help" => Self::Help,
            "target" => Self::Target(arg.to_string()),
            _ => Self::Unknown(name.to_string()),
        }
    }
}

/// Runs the interactive chat loop until `/quit` or end of input.
///
/// # Errors
///
/// Returns an error if reading stdin or writing stdout fails.
pub async fn run_chat(
    orchestrator: &mut TurnOrchestrator,
    mut target: ChatTarget,
) -> Result<(), Report<CliError>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!(session = %orchestrator.session().id, %target, "chat started");
    println!("Chatting with {target}. Type /help for commands.");

    loop {
        prompt(&target)?;
        let Some(line) = lines.next_line().await.map_err(CliError::from)? else {
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Reset => {
                orchestrator.reset_history().await;
                println!("History cleared.");
            }
            ReplCommand::Target(value) => match value.parse::<ChatTarget>() {
                Ok(next) => {
                    debug!(from = %target, to = %next, "target changed");
                    target = next;
                    println!("Now chatting with {target}.");
                }
                Err(err) => println!("{err}"),
            },
            ReplCommand::Unknown(name) => println!("Unknown command /{name}. Type /help."),
            ReplCommand::Message(text) => {
                let reply = orchestrator.process_conversation(&text, &target).await;
                println!("{}\n", format_reply(&reply, target.mode()));
            }
        }
    }

    info!(session = %orchestrator.session().id, "chat ended");
    Ok(())
}

/// Runs an automated dialogue and prints its transcript.
pub async fn run_dialogue(orchestrator: &mut TurnOrchestrator, topic: &str, turns: usize) {
    let transcript = orchestrator.run_dialogue(topic, turns).await;
    for line in transcript.to_string().lines() {
        println!("{}", format_transcript_line(line));
    }
    if transcript.is_aborted() {
        println!("Dialogue stopped early after a failed reply.");
    }
}

fn prompt(target: &ChatTarget) -> Result<(), Report<CliError>> {
    let mut stdout = std::io::stdout();
    write!(stdout, "[{target}] > ").map_err(CliError::from)?;
    stdout.flush().map_err(CliError::from)?;
    Ok(())
}
