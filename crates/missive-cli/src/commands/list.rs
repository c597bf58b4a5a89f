//! `missive list`: print local log messages as JSON lines.

use std::path::Path;

use anyhow::{Context, Result};
use missive_core::store::MessageStore;

use super::open_node;

pub async fn run(config_path: &Path, since: Option<i64>) -> Result<()> {
    let node = open_node(config_path).await?;
    let messages = node
        .store
        .list_since(since)
        .await
        .context("listing local store")?;
    for message in messages {
        println!("{}", serde_json::to_string(&message)?);
    }
    Ok(())
}
