// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Holds the last saved snapshot in memory. Useful for embedding the
// reconciler where the host persists elsewhere, and for tests: clones share
// the same snapshot and save counter.
//
// ## Crash Behavior
//
// - Everything is lost on restart
// - The first cycle after a restart refreshes every claim

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::model::ReconcilerState;
use crate::traits::state_store::StateStore;

/// In-memory state store implementation
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    snapshot: Arc<RwLock<Option<ReconcilerState>>>,
    saves: Arc<AtomicUsize>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `state`, as if saved by a previous run
    pub fn with_state(state: ReconcilerState) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Some(state))),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The last saved snapshot
    pub async fn snapshot(&self) -> Option<ReconcilerState> {
        self.snapshot.read().await.clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<ReconcilerState>, Error> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, state: &ReconcilerState) -> Result<(), Error> {
        *self.snapshot.write().await = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
