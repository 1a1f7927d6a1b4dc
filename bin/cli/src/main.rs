use clap::{Parser, Subcommand};
use parley_cli::{CliError, ParleyConfig, repl};
use parley_conversation::ChatTarget;
use rootcause::Report;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "parley", version, about = "Chat with Claude and Gemini side by side")]
struct Cli {
    /// Path to a TOML config file (defaults to ./parley.toml if present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an interactive chat.
    Chat {
        /// Who answers: claude, gemini or both.
        #[arg(short, long, default_value = "both")]
        target: ChatTarget,
    },
    /// Let the two models talk to each other about a topic.
    Dialogue {
        /// Topic to discuss.
        #[arg(short = 'p', long)]
        topic: String,

        /// Number of rounds; defaults to the configured value.
        #[arg(short, long)]
        turns: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            tracing::error!("parley exited with an error");
            eprintln!("{report}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Report<CliError>> {
    let config = ParleyConfig::load(cli.config.as_deref())?;
    tracing::debug!(
        anthropic_model = %config.anthropic.model,
        gemini_model = %config.gemini.model,
        "Loaded configuration"
    );

    let mut orchestrator = config.build_orchestrator()?;

    match cli.command {
        Command::Chat { target } => repl::run_chat(&mut orchestrator, target).await?,
        Command::Dialogue { topic, turns } => {
            let turns = turns.unwrap_or(config.dialogue.turns);
            repl::run_dialogue(&mut orchestrator, &topic, turns).await;
        }
    }
    Ok(())
}
