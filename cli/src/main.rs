use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod util;

use commands::interactions::InteractionCommands;

/// Must outlast an intelligent-mode log on the server: classification then
/// extraction, each up to two 15 s model attempts.
const DEFAULT_TIMEOUT_SECS: u64 = 90;

#[derive(Parser)]
#[command(
    name = "hcp",
    version,
    about = "HCP interaction CLI: chat with the engine, fill the form, save interactions"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "HCP_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Seconds to wait for a chat response before giving up
    #[arg(long, env = "HCP_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Interactive chat with a local form
    Chat,
    /// Send one chat message and print the reply and resulting form
    Send {
        /// Message text; start with '-' for a task
        message: String,
        /// Pre-fill the form as key=value (repeatable)
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,
    },
    /// Stored interaction operations
    Interaction {
        #[command(subcommand)]
        command: InteractionCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("HCP_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout_secs.max(1));

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Chat => commands::chat::repl(&cli.api_url, timeout).await,
        Commands::Send { message, fields } => {
            commands::chat::send(&cli.api_url, timeout, &message, &fields).await
        }
        Commands::Interaction { command } => commands::interactions::run(&cli.api_url, command).await,
    };

    std::process::exit(code);
}
