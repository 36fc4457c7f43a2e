use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mathagent_client::{ChatClient, ClientError, FileTokenStore, Session, DEFAULT_BASE_URL};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod repl;

#[derive(Parser, Debug)]
#[command(name = "mathagent", version, about = "Chat with the Math Agent tutor")]
struct Cli {
    /// Backend base URL.
    #[arg(long, env = "MATHAGENT_API_URL", default_value = DEFAULT_BASE_URL, global = true)]
    api_url: String,

    /// Where the session token is kept.
    #[arg(long, env = "MATHAGENT_TOKEN_FILE", global = true)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the sign-in URL, or finish sign-in from the redirect URL.
    Login {
        #[arg(long)]
        callback: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Send one message.
    Send {
        text: String,
        #[arg(long)]
        conversation: Option<i64>,
    },
    /// List conversations.
    History,
    /// Print a conversation.
    Show { id: i64 },
    /// Delete a conversation.
    Delete {
        id: i64,
        /// Treat an already deleted conversation as success.
        #[arg(long)]
        ignore_missing: bool,
    },
    /// Generate a graph for the last problem in a conversation.
    Graph {
        id: i64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Interactive chat.
    Chat {
        #[arg(long)]
        conversation: Option<i64>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_client(cli: &Cli) -> anyhow::Result<ChatClient> {
    let store = match &cli.token_file {
        Some(path) => FileTokenStore::new(path),
        None => FileTokenStore::default_location().context("locating token file")?,
    };
    tracing::debug!(token_file = %store.path().display(), "using token store");

    ChatClient::builder()
        .base_url(cli.api_url.as_str())
        .session(Session::new(store))
        .build()
        .context("configuring client")
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let client = build_client(&cli)?;

    match cli.command {
        Command::Login { callback } => commands::login(&client, callback.as_deref()).await,
        Command::Logout => commands::logout(&client),
        Command::Whoami => commands::whoami(&client).await,
        Command::Send { text, conversation } => {
            commands::send(&client, &text, conversation).await
        }
        Command::History => commands::history(&client).await,
        Command::Show { id } => commands::show(&client, id).await,
        Command::Delete { id, ignore_missing } => {
            commands::delete(&client, id, ignore_missing).await
        }
        Command::Graph { id, out } => commands::graph(&client, id, out).await,
        Command::Chat { conversation } => repl::run(&client, conversation).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let unauthorized = err
                .chain()
                .filter_map(|cause| cause.downcast_ref::<ClientError>())
                .any(ClientError::is_unauthorized);
            if unauthorized {
                eprintln!("hint: run `mathagent login` to sign in again");
            }
            ExitCode::FAILURE
        }
    }
}
