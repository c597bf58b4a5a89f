//! `missive verify`: check every signature on a stored message.

use std::path::Path;

use anyhow::{bail, Context, Result};
use missive_core::store::MessageStore;

use super::open_node;

pub async fn run(config_path: &Path, hash: &str) -> Result<()> {
    let node = open_node(config_path).await?;
    let Some(message) = node.store.get(hash).await.context("reading local store")? else {
        bail!("no message with hash {hash}");
    };

    let results = message.verify();
    if results.is_empty() {
        println!("no signatures");
        return Ok(());
    }
    for (record, valid) in message.meta.signed.iter().zip(&results) {
        let status = if *valid { "valid" } else { "INVALID" };
        println!("{status}  {}  t={}", record.public_key, record.timestamp);
    }
    if results.iter().any(|ok| !ok) {
        bail!("one or more signatures are invalid");
    }
    Ok(())
}
