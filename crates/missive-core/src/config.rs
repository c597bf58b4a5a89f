//! Node configuration: identity keys, trust list, store, listeners.
//!
//! One TOML file per node. A missing file is not an error to the callers
//! that can mint an identity; [`NodeConfig::generate`] produces a fresh
//! config the way a first run should.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::KeyError;
use crate::identity::Identity;
use crate::trust::TrustSet;

/// Default freshness window for command signatures, milliseconds.
pub const DEFAULT_MAX_SIGNATURE_AGE_MS: u64 = 30_000;

/// Default store URL.
const DEFAULT_STORE_URL: &str = "memory:";

/// Errors from loading or persisting a node config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML did not parse.
    #[error("config parse failed: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized.
    #[error("config serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No key material configured.
    #[error("config has no identity keys; run init first")]
    MissingKeys,

    /// The configured key material is unusable.
    #[error("configured key is invalid: {0}")]
    Key(#[from] KeyError),
}

/// Identity key material, hex-encoded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Hex public key.
    #[serde(default)]
    pub public_key: String,

    /// Hex secret key.
    #[serde(default)]
    pub secret_key: String,
}

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identity keys.
    #[serde(default)]
    pub keys: KeyConfig,

    /// Additional trusted public keys (the node's own is implicit).
    #[serde(default)]
    pub trusted_keys: Vec<String>,

    /// Message store URL: `memory:` or `file:<path>`.
    #[serde(default = "default_store_url")]
    pub store: String,

    /// Unix socket path to serve on; defaults per runtime directory.
    #[serde(default)]
    pub socket: Option<PathBuf>,

    /// Optional HTTP listen address.
    #[serde(default)]
    pub http_listen: Option<SocketAddr>,

    /// Freshness window for command signatures, milliseconds.
    #[serde(default = "default_max_signature_age_ms")]
    pub max_signature_age_ms: u64,
}

fn default_store_url() -> String {
    DEFAULT_STORE_URL.to_string()
}

fn default_max_signature_age_ms() -> u64 {
    DEFAULT_MAX_SIGNATURE_AGE_MS
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            keys: KeyConfig::default(),
            trusted_keys: Vec::new(),
            store: default_store_url(),
            socket: None,
            http_listen: None,
            max_signature_age_ms: DEFAULT_MAX_SIGNATURE_AGE_MS,
        }
    }
}

impl NodeConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the config to a file.
    ///
    /// # Errors
    ///
    /// Propagates serialization and I/O failures.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Mints a config with a fresh identity and defaults.
    #[must_use]
    pub fn generate() -> Self {
        let identity = Identity::generate();
        Self {
            keys: KeyConfig {
                public_key: identity.public_key_hex().to_string(),
                secret_key: identity.secret_key_hex(),
            },
            ..Self::default()
        }
    }

    /// Reconstructs the node identity from configured key material.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKeys`] when unset, or a key error
    /// when the material is malformed.
    pub fn identity(&self) -> Result<Identity, ConfigError> {
        if self.keys.secret_key.is_empty() {
            return Err(ConfigError::MissingKeys);
        }
        Ok(Identity::from_secret_hex(&self.keys.secret_key)?)
    }

    /// Builds the trust set: own key plus explicit extras.
    #[must_use]
    pub fn trust_set(&self) -> TrustSet {
        TrustSet::new(self.keys.public_key.clone(), self.trusted_keys.clone())
    }
}

/// Default socket path: `$XDG_RUNTIME_DIR/missive/missive.sock`, falling
/// back to `/tmp/missive/missive.sock`.
#[must_use]
pub fn default_socket_path() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR").map_or_else(
        |_| PathBuf::from("/tmp").join("missive").join("missive.sock"),
        |runtime_dir| PathBuf::from(runtime_dir).join("missive").join("missive.sock"),
    )
}
