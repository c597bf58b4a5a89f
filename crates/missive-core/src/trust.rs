//! The set of public keys a node will authorize commands from.

use std::collections::BTreeSet;

/// Trust configuration for a serving node.
///
/// The node's own key is implicitly trusted; additional keys are explicit.
/// Membership is plain set containment over hex key strings; keys are
/// opaque identifiers at this layer.
#[derive(Debug, Clone)]
pub struct TrustSet {
    own: String,
    trusted: BTreeSet<String>,
}

impl TrustSet {
    /// Creates a trust set from the node's own key and explicit extras.
    pub fn new(own: impl Into<String>, trusted: impl IntoIterator<Item = String>) -> Self {
        Self {
            own: own.into(),
            trusted: trusted.into_iter().collect(),
        }
    }

    /// Adds a key to the explicit trust list.
    pub fn insert(&mut self, public_key_hex: impl Into<String>) {
        self.trusted.insert(public_key_hex.into());
    }

    /// True if the key is the node's own or explicitly trusted.
    #[must_use]
    pub fn is_trusted(&self, public_key_hex: &str) -> bool {
        self.own == public_key_hex || self.trusted.contains(public_key_hex)
    }

    /// Whether the key may run the given command.
    ///
    /// Command-independent today; the command name is part of the contract
    /// so policies can narrow per command without touching call sites.
    #[must_use]
    pub fn allows(&self, _command: &str, public_key_hex: &str) -> bool {
        self.is_trusted(public_key_hex)
    }

    /// The node's own public key.
    #[must_use]
    pub fn own_key(&self) -> &str {
        &self.own
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_key_is_implicitly_trusted() {
        let trust = TrustSet::new("self-key", []);
        assert!(trust.is_trusted("self-key"));
        assert!(!trust.is_trusted("stranger"));
    }

    #[test]
    fn explicit_keys_are_trusted() {
        let mut trust = TrustSet::new("self-key", ["friend".to_string()]);
        assert!(trust.is_trusted("friend"));
        trust.insert("newcomer");
        assert!(trust.is_trusted("newcomer"));
    }

    #[test]
    fn allows_mirrors_trust_for_every_command() {
        let trust = TrustSet::new("self-key", ["friend".to_string()]);
        assert!(trust.allows("list", "friend"));
        assert!(trust.allows("post", "self-key"));
        assert!(!trust.allows("list", "stranger"));
    }
}
