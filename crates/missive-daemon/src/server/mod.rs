//! The per-message authorization state machine.
//!
//! Every inbound message walks the same gauntlet before anything executes:
//!
//! ```text
//! Received ─▶ is a command? ─▶ all signatures valid? ─▶ fresh enough?
//!          ─▶ not a replay? ─▶ all signers trusted? ─▶ execute ─▶ stream
//! ```
//!
//! Each check that fails terminates the interaction with a single `error`
//! event. Freshness is judged by the *oldest* signature: a command is only
//! as fresh as its stalest endorsement, since every co-signer must
//! currently vouch for it. Trust is unanimous: one untrusted co-signer
//! vetoes execution no matter how trusted the others are, because
//! co-signing is joint responsibility.
//!
//! The replay entry is inserted *before* execution, under the same lock as
//! the lookup, so two concurrent submissions of the identical signed
//! command resolve to exactly one execution.
//!
//! A handler failure is logged server-side and surfaced to the caller only
//! as a generic `error`; the handler never takes down its host and never
//! leaks internals.

mod replay;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use missive_core::message::now_millis;
use missive_core::protocol::Event;
use missive_core::{Message, Payload, TrustSet};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

pub use replay::ReplayCache;

use crate::executor::{CommandExecutor, CommandOutput};

/// Default freshness window for command signatures.
pub const DEFAULT_MAX_SIGNATURE_AGE: Duration = Duration::from_secs(30);

/// Buffered events per in-flight command.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Trust-gated command server.
///
/// Cheap to clone and share: every handle points at the same executor and
/// replay cache, and [`Server::handle`] may be called from any number of
/// transports concurrently. The replay cache is the only shared mutable
/// state.
#[derive(Clone)]
pub struct Server {
    executor: Arc<dyn CommandExecutor>,
    trust: TrustSet,
    replay: Arc<ReplayCache>,
    max_signature_age_ms: i64,
}

/// A terminal rejection: one `error` event, then done.
struct Rejection {
    message: String,
    status_code: u16,
}

impl Rejection {
    fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }
}

impl Server {
    /// Creates a server with the default freshness window.
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>, trust: TrustSet) -> Self {
        Self::with_max_signature_age(executor, trust, DEFAULT_MAX_SIGNATURE_AGE)
    }

    /// Creates a server with an explicit freshness window.
    ///
    /// The replay cache TTL equals the window: past it, the freshness
    /// check rejects on its own and the cache may forget.
    #[must_use]
    pub fn with_max_signature_age(
        executor: Arc<dyn CommandExecutor>,
        trust: TrustSet,
        max_signature_age: Duration,
    ) -> Self {
        Self {
            executor,
            trust,
            replay: Arc::new(ReplayCache::new(max_signature_age)),
            max_signature_age_ms: i64::try_from(max_signature_age.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// The serving public key.
    #[must_use]
    pub fn public_key(&self) -> &str {
        self.trust.own_key()
    }

    /// Handles one inbound message, streaming tagged result events.
    ///
    /// Always terminates with exactly one terminal event: `end` after
    /// zero-or-more `data`, or a single `error`. Dropping the receiver
    /// abandons the in-flight command at its next event.
    pub fn handle(&self, message: Message) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let server = self.clone();
        tokio::spawn(async move {
            match server.process(message, &tx).await {
                Ok(()) => {
                    let _ = tx.send(Event::End).await;
                }
                Err(rejection) => {
                    warn!(
                        status = rejection.status_code,
                        reason = %rejection.message,
                        "rejected message"
                    );
                    let _ = tx
                        .send(Event::Error {
                            message: rejection.message,
                            status_code: rejection.status_code,
                        })
                        .await;
                }
            }
        });
        rx
    }

    /// Runs the authorization pipeline and streams execution output.
    async fn process(&self, message: Message, tx: &mpsc::Sender<Event>) -> Result<(), Rejection> {
        let Payload::Command { command, args } = &message.payload else {
            return Err(Rejection::new("not a command", 400));
        };
        let command = command.clone();
        let args = args.clone();

        // Cryptographic validity: at least one signature, all of them good.
        let checks = message.verify();
        if checks.is_empty() || checks.iter().any(|ok| !ok) {
            return Err(Rejection::new("signature not valid", 400));
        }

        // Freshness of the oldest endorsement.
        let now = now_millis();
        let fresh = message
            .oldest_signature_timestamp()
            .is_some_and(|oldest| oldest >= now - self.max_signature_age_ms);
        if !fresh {
            return Err(Rejection::new("signature is not recent enough", 401));
        }

        // Replay: content hash as identity, recomputed so a stripped or
        // doctored meta.hash cannot dodge the cache.
        let hash = message
            .content_hash()
            .map_err(|err| internal_failure("hashing inbound command", &err))?;
        if self.replay.contains(&hash) {
            return Err(Rejection::new("command has already been run", 400));
        }

        // Unanimous trust across distinct signers.
        let signers: BTreeSet<&str> = message
            .meta
            .signed
            .iter()
            .map(|record| record.public_key.as_str())
            .collect();
        let allowed = signers
            .iter()
            .copied()
            .filter(|key| self.trust.allows(&command, key))
            .count();
        if allowed != signers.len() {
            return Err(Rejection::new(
                format!("not allowed to run {command}"),
                403,
            ));
        }

        // Claim the hash before executing; losing the race means an
        // identical command slipped in between our check and now.
        if !self.replay.check_and_insert(&hash) {
            return Err(Rejection::new("command has already been run", 400));
        }

        debug!(%command, signers = signers.len(), "executing command");
        let output = self
            .executor
            .run(&command, args)
            .await
            .map_err(|err| internal_failure(&command, &err))?;

        match output {
            CommandOutput::Single(value) => {
                let _ = tx.send(Event::Data { payload: value }).await;
            }
            CommandOutput::Stream(mut stream) => {
                while let Some(value) = stream.next().await {
                    if tx.send(Event::Data { payload: value }).await.is_err() {
                        // Receiver dropped: consumer abandoned the stream.
                        return Ok(());
                    }
                }
            }
        }
        Ok(())
    }

}

/// Logs an internal failure and maps it to the generic rejection.
fn internal_failure(context: &str, err: &dyn std::fmt::Display) -> Rejection {
    error!(context, %err, "command handling failed");
    Rejection::new("unexpected error", 500)
}
