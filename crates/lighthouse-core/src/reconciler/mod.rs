//! Registry reconciler
//!
//! The Reconciler is responsible for:
//! - Polling the registry's claim listing on a fixed interval
//! - Quarantining claims whose names fail validation
//! - Resolving and validating metadata for new or changed claims only
//! - Persisting the resulting snapshot
//!
//! ## Architecture
//!
//! ```text
//!                    ┌────────────────┐
//!    timer tick ───▶ │   Reconciler   │
//!                    └────────────────┘
//!                            │
//!      ┌─────────────┬───────┴───────┬──────────────┐
//!      ▼             ▼               ▼              ▼
//! ┌──────────┐ ┌───────────┐ ┌─────────────┐ ┌────────────┐
//! │ Registry │ │   Name    │ │  Metadata   │ │ StateStore │
//! │ (list,   │ │ Validator │ │  Validator  │ │ (save)     │
//! │ resolve) │ └───────────┘ └─────────────┘ └────────────┘
//! └──────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. List the trie (cycle skipped on failure)
//! 2. Drop quarantined txids, quarantine invalid names
//! 3. If the result equals the cached trie, stop here
//! 4. Refresh every claim whose name is new or whose txid changed
//! 5. Replace the cached trie with the claims whose metadata is current
//! 6. Persist anything not yet written

mod handle;

pub use handle::ReconcilerHandle;

use crate::config::{PersistMode, ReconcilerConfig};
use crate::error::{Error, Result};
use crate::model::{MetadataRecord, ReconcilerState, TrieEntry};
use crate::traits::{MetadataValidator, NameValidator, RegistryClient, StateStore};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

/// Why a txid was quarantined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarantineReason {
    /// The claim name failed character validation
    InvalidName,
    /// Resolving the name failed or timed out
    ResolveFailed,
    /// The resolved payload failed schema validation
    SchemaRejected,
}

/// Result of refreshing a single claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Metadata validated and stored
    Validated,
    /// The claim's txid is now quarantined
    Quarantined(QuarantineReason),
}

/// Summary of one reconciliation cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Claims in the registry listing
    pub listed: usize,
    /// Claims left after quarantine and name filtering
    pub accepted: usize,
    /// Claims whose metadata was fetched this cycle
    pub refreshed: usize,
    /// Refreshed claims whose metadata validated
    pub validated: usize,
    /// Txids newly quarantined this cycle
    pub quarantined: usize,
    /// The filtered listing matched the cached trie; nothing was refreshed
    pub unchanged: bool,
    /// Successful snapshot writes during the cycle
    pub writes: usize,
}

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcilerEvent {
    /// Poll loop started
    Started {
        poll_interval: Duration,
        cached_claims: usize,
    },

    /// A cycle ran to completion
    CycleCompleted(CycleReport),

    /// A cycle was abandoned because the registry could not be listed
    CycleSkipped { error: String },

    /// Metadata for a claim validated and was cached
    EntryValidated { name: String, txid: String },

    /// A claim's txid was quarantined
    EntryQuarantined {
        name: String,
        txid: String,
        reason: QuarantineReason,
        detail: String,
    },

    /// Writing the snapshot failed; state is kept in memory
    PersistFailed { error: String },

    /// Poll loop stopped
    Stopped { reason: String },
}

/// Incremental registry-to-cache reconciler
///
/// Owns its [`ReconcilerState`] exclusively. All mutation happens through
/// `&mut self`, so a single task drives it and cycles can never overlap.
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`] (loads the persisted snapshot)
/// 2. Either call [`Reconciler::reconcile()`] yourself, or
///    [`Reconciler::start()`] the poll loop and keep the returned handle
/// 3. [`ReconcilerHandle::shutdown()`] stops the loop after any in-flight
///    cycle and hands the reconciler back
pub struct Reconciler {
    registry: Box<dyn RegistryClient>,
    name_validator: Box<dyn NameValidator>,
    metadata_validator: Box<dyn MetadataValidator>,
    store: Box<dyn StateStore>,

    state: ReconcilerState,

    /// State has changes the store has not seen yet
    dirty: bool,

    /// Successful saves since construction
    writes: usize,

    poll_interval: Duration,
    call_timeout: Duration,
    persist_mode: PersistMode,

    event_tx: mpsc::Sender<ReconcilerEvent>,
}

impl Reconciler {
    /// Create a reconciler and hydrate it from `store`
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver)
    pub async fn new(
        registry: Box<dyn RegistryClient>,
        name_validator: Box<dyn NameValidator>,
        metadata_validator: Box<dyn MetadataValidator>,
        store: Box<dyn StateStore>,
        config: ReconcilerConfig,
    ) -> Result<(Self, mpsc::Receiver<ReconcilerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let mut reconciler = Self {
            registry,
            name_validator,
            metadata_validator,
            store,
            state: ReconcilerState::new(),
            dirty: false,
            writes: 0,
            poll_interval: config.poll_interval(),
            call_timeout: config.call_timeout(),
            persist_mode: config.persist_mode,
            event_tx: tx,
        };
        reconciler.load_state().await?;

        Ok((reconciler, rx))
    }

    /// Replace in-memory state with the persisted snapshot, or empty state
    ///
    /// The snapshot is trusted as-is.
    pub async fn load_state(&mut self) -> Result<()> {
        match self.store.load().await? {
            Some(state) => {
                info!(
                    "Loaded cache from {}: {} claims, {} metadata records, {} quarantined",
                    self.store.describe(),
                    state.claimtrie.len(),
                    state.metadata.len(),
                    state.bad_uris.len()
                );
                self.state = state;
            }
            None => {
                info!("No cache at {}, rebuilding metadata cache", self.store.describe());
                self.state = ReconcilerState::new();
            }
        }
        self.dirty = false;
        Ok(())
    }

    /// Current in-memory state
    pub fn state(&self) -> &ReconcilerState {
        &self.state
    }

    /// Whether there are changes not yet persisted
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Lift every quarantine
    ///
    /// Quarantine never expires on its own; this is the operator's way out.
    /// Returns the number of txids released. Takes effect from the next cycle.
    pub fn clear_quarantine(&mut self) -> usize {
        let released = self.state.bad_uris.len();
        if released > 0 {
            info!("Releasing {} quarantined claims", released);
            self.state.bad_uris.clear();
            self.dirty = true;
        }
        released
    }

    /// Drop quarantined claims and quarantine claims with invalid names
    ///
    /// Order is preserved. New quarantines mark state dirty but are not
    /// persisted here.
    pub fn filter_remote_trie(&mut self, entries: Vec<TrieEntry>) -> Vec<TrieEntry> {
        let mut kept = Vec::with_capacity(entries.len());

        for entry in entries {
            if self.state.bad_uris.contains(&entry.txid) {
                continue;
            }

            match self.name_validator.validate_name(&entry.name) {
                Ok(()) => kept.push(entry),
                Err(e) => {
                    info!("Bad name for claim {}", entry.txid);
                    self.quarantine(&entry, QuarantineReason::InvalidName, e.to_string());
                }
            }
        }

        kept
    }

    /// Run one reconciliation cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: The cycle completed
    /// - `Err(Error::RegistryUnavailable)`: Listing failed; nothing changed
    pub async fn reconcile(&mut self) -> Result<CycleReport> {
        let started_at = Utc::now();
        let writes_before = self.writes;

        let listing = self.fetch_remote_trie().await?;
        let listed = listing.len();
        let quarantined_before = self.state.bad_uris.len();

        let filtered = self.filter_remote_trie(listing);

        let mut report = CycleReport {
            started_at,
            finished_at: started_at,
            listed,
            accepted: filtered.len(),
            refreshed: 0,
            validated: 0,
            quarantined: 0,
            unchanged: false,
            writes: 0,
        };

        if filtered == self.state.claimtrie {
            debug!("Claim trie unchanged ({} claims)", filtered.len());
            report.unchanged = true;
        } else {
            for entry in &filtered {
                if self.state.is_current(entry) {
                    continue;
                }
                debug!("Claim {} changed (txid {})", entry.name, entry.txid);

                report.refreshed += 1;
                if self.refresh_entry(entry).await == RefreshOutcome::Validated {
                    report.validated += 1;
                }
            }

            let current: Vec<TrieEntry> = filtered
                .into_iter()
                .filter(|entry| self.state.is_current(entry))
                .collect();
            if current != self.state.claimtrie {
                self.state.claimtrie = current;
                self.dirty = true;
            }
        }

        report.quarantined = self.state.bad_uris.len() - quarantined_before;

        if self.dirty {
            // failure is reported by persist_state and retried next cycle
            let _ = self.persist_state().await;
        }

        report.writes = self.writes - writes_before;
        report.finished_at = Utc::now();
        self.emit_event(ReconcilerEvent::CycleCompleted(report.clone()));

        Ok(report)
    }

    /// Resolve, validate and cache the metadata for one claim
    ///
    /// Never fails: every error ends in quarantine.
    pub async fn refresh_entry(&mut self, entry: &TrieEntry) -> RefreshOutcome {
        let outcome = match self.resolve_metadata(&entry.name).await {
            Ok(payload) => match self.metadata_validator.validate(&payload) {
                Ok(metadata) => {
                    info!("Validated lbry://{}", entry.name);
                    self.state.metadata.insert(
                        entry.name.clone(),
                        MetadataRecord::stamped(metadata, entry.txid.clone()),
                    );
                    if !self.state.claimtrie.contains(entry) {
                        self.state.claimtrie.push(entry.clone());
                    }
                    self.dirty = true;
                    self.emit_event(ReconcilerEvent::EntryValidated {
                        name: entry.name.clone(),
                        txid: entry.txid.clone(),
                    });
                    RefreshOutcome::Validated
                }
                Err(e) => {
                    info!("Bad metadata: {}", entry.name);
                    self.quarantine(entry, QuarantineReason::SchemaRejected, e.to_string());
                    RefreshOutcome::Quarantined(QuarantineReason::SchemaRejected)
                }
            },
            Err(e) => {
                info!("Bad metadata: {} ({})", entry.name, e);
                self.quarantine(entry, QuarantineReason::ResolveFailed, e.to_string());
                RefreshOutcome::Quarantined(QuarantineReason::ResolveFailed)
            }
        };

        if self.persist_mode == PersistMode::PerEntry {
            let _ = self.persist_state().await;
        }

        outcome
    }

    /// Write the full snapshot through the state store
    ///
    /// On failure the state stays dirty and in memory, a `PersistFailed`
    /// event is emitted, and the error is returned.
    pub async fn persist_state(&mut self) -> Result<()> {
        match self.store.save(&self.state).await {
            Ok(()) => {
                self.dirty = false;
                self.writes += 1;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to persist cache to {}: {}", self.store.describe(), e);
                self.dirty = true;
                self.emit_event(ReconcilerEvent::PersistFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Spawn the poll loop on the current runtime
    ///
    /// The first cycle runs one interval from now, not immediately.
    pub fn start(mut self) -> ReconcilerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            if let Err(e) = self.run_with_shutdown(shutdown_rx).await {
                error!("Reconciler loop failed: {}", e);
            }
            self
        });
        ReconcilerHandle::new(shutdown_tx, task)
    }

    /// Run the poll loop until `shutdown_rx` fires or its sender is dropped
    ///
    /// A cycle that has started is always run to completion before the
    /// shutdown signal is looked at again.
    pub async fn run_with_shutdown(&mut self, mut shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        info!("Starting updater (every {:?})", self.poll_interval);
        self.emit_event(ReconcilerEvent::Started {
            poll_interval: self.poll_interval,
            cached_claims: self.state.claimtrie.len(),
        });

        let first_tick = tokio::time::Instant::now() + self.poll_interval;
        let mut timer = tokio::time::interval_at(first_tick, self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(timer);

        let reason = loop {
            tokio::select! {
                biased;

                signal = &mut shutdown_rx => {
                    break match signal {
                        Ok(()) => "Shutdown signal",
                        Err(_) => "Handle dropped",
                    };
                }

                Some(_) = ticks.next() => {
                    self.run_cycle().await;
                }
            }
        };

        if self.dirty {
            let _ = self.persist_state().await;
        }

        info!("Stopping updater: {}", reason);
        self.emit_event(ReconcilerEvent::Stopped {
            reason: reason.to_string(),
        });
        Ok(())
    }

    /// One timer-driven cycle; errors are logged, never propagated
    async fn run_cycle(&mut self) {
        match self.reconcile().await {
            Ok(report) if report.unchanged => {
                debug!("Cycle complete, nothing changed");
            }
            Ok(report) => {
                info!(
                    "Cycle complete: {} refreshed, {} validated, {} quarantined",
                    report.refreshed, report.validated, report.quarantined
                );
            }
            Err(e) => {
                warn!("Skipping cycle: {}", e);
                self.emit_event(ReconcilerEvent::CycleSkipped {
                    error: e.to_string(),
                });
            }
        }
    }

    /// List the registry under the call timeout
    async fn fetch_remote_trie(&self) -> Result<Vec<TrieEntry>> {
        match tokio::time::timeout(self.call_timeout, self.registry.list_entries()).await {
            Ok(Ok(entries)) => Ok(entries),
            Ok(Err(e)) => Err(Error::registry_unavailable(format!(
                "{}: {}",
                self.registry.client_name(),
                e
            ))),
            Err(_) => Err(Error::registry_unavailable(format!(
                "{}: listing timed out after {}s",
                self.registry.client_name(),
                self.call_timeout.as_secs()
            ))),
        }
    }

    /// Resolve a name under the call timeout
    async fn resolve_metadata(&self, name: &str) -> Result<serde_json::Value> {
        match tokio::time::timeout(self.call_timeout, self.registry.resolve(name)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(
                format!("resolve {}", name),
                self.call_timeout.as_secs(),
            )),
        }
    }

    /// Add a claim's txid to quarantine (no-op if already there)
    fn quarantine(&mut self, entry: &TrieEntry, reason: QuarantineReason, detail: String) {
        if !self.state.bad_uris.insert(entry.txid.clone()) {
            return;
        }
        self.dirty = true;
        self.emit_event(ReconcilerEvent::EntryQuarantined {
            name: entry.name.clone(),
            txid: entry.txid.clone(),
            reason,
            detail,
        });
    }

    fn emit_event(&self, event: ReconcilerEvent) {
        // a closed channel just means nobody is listening
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InvalidNameError, SchemaError};
    use crate::model::ValidatedMetadata;
    use crate::state::MemoryStateStore;
    use async_trait::async_trait;

    struct EmptyRegistry;

    #[async_trait]
    impl RegistryClient for EmptyRegistry {
        async fn list_entries(&self) -> Result<Vec<TrieEntry>> {
            Ok(Vec::new())
        }

        async fn resolve(&self, name: &str) -> Result<serde_json::Value> {
            Err(Error::resolve(name, "empty registry"))
        }

        fn client_name(&self) -> &'static str {
            "empty"
        }
    }

    struct NoSpaces;

    impl NameValidator for NoSpaces {
        fn validate_name(&self, name: &str) -> std::result::Result<(), InvalidNameError> {
            if name.contains(' ') {
                return Err(InvalidNameError::new(name, "contains ' '"));
            }
            Ok(())
        }
    }

    struct RejectAll;

    impl MetadataValidator for RejectAll {
        fn validate(
            &self,
            _payload: &serde_json::Value,
        ) -> std::result::Result<ValidatedMetadata, SchemaError> {
            Err(SchemaError::new("rejected"))
        }
    }

    async fn reconciler() -> (Reconciler, mpsc::Receiver<ReconcilerEvent>) {
        Reconciler::new(
            Box::new(EmptyRegistry),
            Box::new(NoSpaces),
            Box::new(RejectAll),
            Box::new(MemoryStateStore::new()),
            ReconcilerConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn repeat_quarantine_is_silent() {
        let (mut reconciler, mut events) = reconciler().await;
        let bad = TrieEntry::new("a b", "t1");

        assert!(reconciler.filter_remote_trie(vec![bad.clone()]).is_empty());
        assert!(matches!(
            events.try_recv(),
            Ok(ReconcilerEvent::EntryQuarantined {
                reason: QuarantineReason::InvalidName,
                ..
            })
        ));

        reconciler.persist_state().await.unwrap();
        reconciler.quarantine(&bad, QuarantineReason::SchemaRejected, "again".into());

        assert!(events.try_recv().is_err(), "no second event");
        assert!(!reconciler.is_dirty(), "nothing new to persist");
        assert_eq!(reconciler.state().bad_uris.len(), 1);
    }

    #[tokio::test]
    async fn quarantined_txid_is_skipped_before_name_validation() {
        let (mut reconciler, mut events) = reconciler().await;
        reconciler.quarantine(
            &TrieEntry::new("alice", "t1"),
            QuarantineReason::ResolveFailed,
            "down".into(),
        );
        let _ = events.try_recv();

        let kept = reconciler.filter_remote_trie(vec![
            TrieEntry::new("alice", "t1"),
            TrieEntry::new("bob", "t2"),
        ]);

        assert_eq!(kept, vec![TrieEntry::new("bob", "t2")]);
        assert!(events.try_recv().is_err());
    }
}
