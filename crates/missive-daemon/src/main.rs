//! missive-daemon: serves a node's message log to trusted peers.
//!
//! Runs in the foreground: bind the Unix socket (always) and the HTTP
//! listener (when configured), then wait for SIGINT/SIGTERM. Process
//! supervision belongs to the init system, not this binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use missive_core::config::{default_socket_path, NodeConfig};
use missive_core::store::open_store;
use missive_daemon::transport::{router, SocketServer};
use missive_daemon::{Server, StoreExecutor};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// missive daemon - trust-gated message exchange node
#[derive(Parser, Debug)]
#[command(name = "missive-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to node configuration file
    #[arg(short, long, default_value = "missive.toml")]
    config: PathBuf,

    /// Unix socket path (overrides config)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// HTTP listen address (overrides config)
    #[arg(long)]
    http_listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = if args.config.exists() {
        NodeConfig::from_file(&args.config)
            .with_context(|| format!("loading config from {}", args.config.display()))?
    } else {
        info!(path = %args.config.display(), "no config found, generating a fresh identity");
        let generated = NodeConfig::generate();
        generated
            .save(&args.config)
            .with_context(|| format!("writing config to {}", args.config.display()))?;
        generated
    };

    let identity = config.identity().context("reconstructing node identity")?;
    info!(public_key = identity.public_key_hex(), "node identity ready");

    let store = open_store(&config.store)
        .await
        .with_context(|| format!("opening message store '{}'", config.store))?;
    let executor = Arc::new(StoreExecutor::new(Arc::clone(&store), identity));
    let server = Arc::new(Server::with_max_signature_age(
        executor,
        config.trust_set(),
        Duration::from_millis(config.max_signature_age_ms),
    ));

    let socket_path = args
        .socket
        .or_else(|| config.socket.clone())
        .unwrap_or_else(default_socket_path);
    let socket_server = SocketServer::bind(&socket_path, Arc::clone(&server))
        .with_context(|| format!("binding socket at {}", socket_path.display()))?;
    let mut socket_task = tokio::spawn(socket_server.serve());

    let http_task = match args.http_listen.or(config.http_listen) {
        Some(addr) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding http listener at {addr}"))?;
            info!(%addr, "http transport listening");
            let app = router(Arc::clone(&server));
            Some(tokio::spawn(async move { axum::serve(listener, app).await }))
        }
        None => None,
    };

    let mut sigint = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let http_wait = async {
        match http_task {
            Some(task) => {
                let _ = task.await;
            }
            None => futures::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        result = &mut socket_task => {
            let _ = std::fs::remove_file(&socket_path);
            bail!("socket server exited unexpectedly: {result:?}");
        }
        _ = http_wait => {
            let _ = std::fs::remove_file(&socket_path);
            bail!("http server exited unexpectedly");
        }
    }

    socket_task.abort();
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}
