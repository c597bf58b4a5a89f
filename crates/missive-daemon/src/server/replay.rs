//! Replay protection for executed command hashes.
//!
//! An entry exists only for commands that were fully authorized, never for
//! ones that merely arrived, and it lives exactly as long as the signature
//! freshness window. After the window, the freshness check itself rejects
//! the command, so the cache can forget it without reopening a replay.
//!
//! The whole point of this cache is the atomicity of
//! [`ReplayCache::check_and_insert`]: two concurrent submissions of the
//! identical signed command must resolve to one execution and one
//! rejection, so the check and the insert happen under a single lock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::{Duration, Instant};

use tracing::debug;

/// How many operations pass between expiry sweeps.
const SWEEP_INTERVAL_OPS: u64 = 64;

/// Time-bounded set of already-executed command hashes.
pub struct ReplayCache {
    ttl: Duration,
    inner: Mutex<State>,
}

struct State {
    entries: HashMap<String, Instant>,
    ops: u64,
}

impl ReplayCache {
    /// Creates a cache whose entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(State {
                entries: HashMap::new(),
                ops: 0,
            }),
        }
    }

    /// True if a live entry exists for this hash.
    #[must_use]
    pub fn contains(&self, hash: &str) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        self.sweep_periodically(&mut state);
        state
            .entries
            .get(hash)
            .is_some_and(|inserted| inserted.elapsed() < self.ttl)
    }

    /// Atomically records the hash unless a live entry already exists.
    ///
    /// Returns `true` if this call inserted the entry (the caller may
    /// execute), `false` if another submission got there first.
    #[must_use]
    pub fn check_and_insert(&self, hash: &str) -> bool {
        let now = Instant::now();
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        self.sweep_periodically(&mut state);
        match state.entries.get(hash) {
            Some(inserted) if now.duration_since(*inserted) < self.ttl => false,
            _ => {
                state.entries.insert(hash.to_string(), now);
                true
            }
        }
    }

    /// Number of live entries, for diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .entries
            .values()
            .filter(|inserted| inserted.elapsed() < self.ttl)
            .count()
    }

    /// True when no live entries remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries every [`SWEEP_INTERVAL_OPS`] operations so the
    /// map stays bounded by the command rate within one window.
    fn sweep_periodically(&self, state: &mut State) {
        state.ops += 1;
        if state.ops % SWEEP_INTERVAL_OPS != 0 {
            return;
        }
        let before = state.entries.len();
        let ttl = self.ttl;
        state.entries.retain(|_, inserted| inserted.elapsed() < ttl);
        if state.entries.len() < before {
            debug!(
                removed = before - state.entries.len(),
                remaining = state.entries.len(),
                "swept expired replay entries"
            );
        }
    }
}
