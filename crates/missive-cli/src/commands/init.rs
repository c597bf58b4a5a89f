//! `missive init`: mint a config with a fresh identity.

use std::path::Path;

use anyhow::{bail, Context, Result};
use missive_core::config::NodeConfig;

pub fn run(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "config already exists at {}; pass --force to overwrite",
            config_path.display()
        );
    }
    let config = NodeConfig::generate();
    config
        .save(config_path)
        .with_context(|| format!("writing config to {}", config_path.display()))?;
    println!("wrote {}", config_path.display());
    println!("public key: {}", config.keys.public_key);
    Ok(())
}
