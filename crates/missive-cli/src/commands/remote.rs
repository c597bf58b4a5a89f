//! Remote commands: `info`, `pull`, `push`, `sync`.
//!
//! Sync bookmarks are in-memory per invocation; a fresh run re-offers
//! messages the remote's hash check drops, which costs bandwidth, not
//! correctness.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use missive_core::protocol::{signed_command, Event, Transport, COMMAND_INFO};
use missive_core::sync::{MemorySyncStore, Syncer};
use serde_json::Value;

use super::{make_transport, open_node, RemoteArgs};

pub async fn info(config_path: &Path, remote: &RemoteArgs) -> Result<()> {
    let node = open_node(config_path).await?;
    let (_name, transport) = make_transport(remote)?;

    let command = signed_command(&node.identity, COMMAND_INFO, Value::Null)
        .context("signing info command")?;
    let mut events = transport
        .send(&command)
        .await
        .context("sending info command")?;

    while let Some(event) = events.next().await {
        match event {
            Event::Data { payload } => println!("{}", serde_json::to_string_pretty(&payload)?),
            Event::Error {
                message,
                status_code,
            } => bail!("remote rejected info ({status_code}): {message}"),
            Event::End => return Ok(()),
        }
    }
    bail!("result stream ended without a terminal event");
}

pub async fn pull(config_path: &Path, remote: &RemoteArgs) -> Result<()> {
    let (name, transport) = make_transport(remote)?;
    let mut syncer = syncer_for(config_path).await?;
    let outcome = syncer
        .pull(&name, transport.as_ref())
        .await
        .context("pull round failed")?;
    println!("pulled {} messages", outcome.count);
    Ok(())
}

pub async fn push(config_path: &Path, remote: &RemoteArgs) -> Result<()> {
    let (name, transport) = make_transport(remote)?;
    let mut syncer = syncer_for(config_path).await?;
    let outcome = syncer
        .push(&name, transport.as_ref())
        .await
        .context("push round failed")?;
    println!("pushed {} messages", outcome.count);
    Ok(())
}

pub async fn sync(config_path: &Path, remote: &RemoteArgs) -> Result<()> {
    let (name, transport) = make_transport(remote)?;
    let mut syncer = syncer_for(config_path).await?;
    let report = syncer
        .sync(&name, transport.as_ref())
        .await
        .context("sync round failed")?;
    println!(
        "pushed {} messages, pulled {} messages",
        report.push.count, report.pull.count
    );
    Ok(())
}

async fn syncer_for(config_path: &Path) -> Result<Syncer> {
    let node = open_node(config_path).await?;
    Ok(Syncer::new(
        node.identity,
        node.store,
        Arc::new(MemorySyncStore::new()),
    ))
}
