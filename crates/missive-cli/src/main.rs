//! missive: operator CLI for a missive node.
//!
//! Local log operations (`post`, `list`, `verify`) work directly on the
//! configured store; remote operations (`info`, `pull`, `push`, `sync`)
//! speak the command protocol over a socket or HTTP transport.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::RemoteArgs;

/// missive - trust-gated message exchange
#[derive(Parser, Debug)]
#[command(name = "missive")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to node configuration file
    #[arg(short, long, default_value = "missive.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a config file with a fresh identity
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Sign a message and append it to the local log
    Post {
        /// Message body: JSON if it parses, raw text otherwise
        body: String,

        /// Relative expiry such as "90s" or "2h 30m"
        #[arg(long)]
        expires_in: Option<String>,
    },

    /// Print local log messages as JSON lines
    List {
        /// Only messages newer than this epoch-millisecond timestamp
        #[arg(long)]
        since: Option<i64>,
    },

    /// Check every signature on a stored message
    Verify {
        /// Content hash of the message
        hash: String,
    },

    /// Query a remote server's identity
    Info {
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Fetch the remote log increment into the local store
    Pull {
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Offer the local log increment to the remote
    Push {
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Push then pull
    Sync {
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(&cli.config, force),
        Commands::Post { body, expires_in } => {
            commands::post::run(&cli.config, &body, expires_in.as_deref()).await
        }
        Commands::List { since } => commands::list::run(&cli.config, since).await,
        Commands::Verify { hash } => commands::verify::run(&cli.config, &hash).await,
        Commands::Info { remote } => commands::remote::info(&cli.config, &remote).await,
        Commands::Pull { remote } => commands::remote::pull(&cli.config, &remote).await,
        Commands::Push { remote } => commands::remote::push(&cli.config, &remote).await,
        Commands::Sync { remote } => commands::remote::sync(&cli.config, &remote).await,
    }
}
