//! Command implementations and shared node plumbing.

pub mod init;
pub mod list;
pub mod post;
pub mod remote;
pub mod verify;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use missive_core::config::NodeConfig;
use missive_core::protocol::Transport;
use missive_core::store::{open_store, MessageStore};
use missive_core::Identity;
use missive_daemon::transport::{HttpTransport, SocketTransport};

/// Where a remote command should be sent.
#[derive(Args, Debug)]
pub struct RemoteArgs {
    /// Unix socket path of the remote server
    #[arg(long, conflicts_with = "url")]
    pub socket: Option<std::path::PathBuf>,

    /// HTTP URL of the remote server
    #[arg(long)]
    pub url: Option<String>,
}

/// A loaded node: config, identity, and open store.
pub struct NodeHandle {
    pub config: NodeConfig,
    pub identity: Identity,
    pub store: Arc<dyn MessageStore>,
}

/// Loads the node behind a config file.
pub async fn open_node(config_path: &Path) -> Result<NodeHandle> {
    if !config_path.exists() {
        bail!(
            "no config at {}; run `missive init` first",
            config_path.display()
        );
    }
    let config = NodeConfig::from_file(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let identity = config.identity().context("reconstructing node identity")?;
    let store = open_store(&config.store)
        .await
        .with_context(|| format!("opening message store '{}'", config.store))?;
    Ok(NodeHandle {
        config,
        identity,
        store,
    })
}

/// Builds the transport (and a bookmark name) for a remote.
pub fn make_transport(remote: &RemoteArgs) -> Result<(String, Box<dyn Transport>)> {
    if let Some(path) = &remote.socket {
        let name = path.display().to_string();
        return Ok((name.clone(), Box::new(SocketTransport::new(path.clone()))));
    }
    if let Some(url) = &remote.url {
        return Ok((url.clone(), Box::new(HttpTransport::new(url.clone()))));
    }
    bail!("specify a remote with --socket <path> or --url <url>");
}
