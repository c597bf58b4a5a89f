//! `missive post`: sign a message and append it to the local log.

use std::path::Path;

use anyhow::{Context, Result};
use missive_core::store::MessageStore;
use missive_core::Message;
use serde_json::Value;

use super::open_node;

pub async fn run(config_path: &Path, body: &str, expires_in: Option<&str>) -> Result<()> {
    let node = open_node(config_path).await?;

    // JSON bodies stay structured; anything else is a plain string.
    let body: Value = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));

    let mut builder = Message::plain(body);
    if let Some(expression) = expires_in {
        builder = builder.expires_in(expression);
    }
    let mut message = builder.finish().context("building message")?;
    message.sign(&node.identity).context("signing message")?;

    let inserted = node
        .store
        .append(message.clone())
        .await
        .context("appending to local store")?;
    let hash = message.meta.hash.unwrap_or_default();
    if inserted {
        println!("posted {hash}");
    } else {
        println!("already present {hash}");
    }
    Ok(())
}
