// # State Store Trait
//
// Defines the interface for persisting the reconciler snapshot.
//
// ## Purpose
//
// The reconciler keeps its whole state in memory and hands the store a full
// snapshot to save. The store never sees partial updates, so every save is a
// whole-file replace.
//
// ## Implementations
//
// - File-based: JSON file with atomic rename (`FileStateStore`)
// - In-memory: for embedding and tests (`MemoryStateStore`)

use async_trait::async_trait;

use crate::model::ReconcilerState;

/// Trait for state store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Implementation Guidelines
///
/// - **Atomic saves**: A concurrent reader must see either the previous or
///   the new snapshot, never a mix
/// - **No validation on load**: The snapshot is a trusted local cache
/// - **Async I/O only**: Never block the reconciler task
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(Some(state))`: A snapshot was found
    /// - `Ok(None)`: Nothing persisted yet
    /// - `Err(Error)`: Storage error
    async fn load(&self) -> Result<Option<ReconcilerState>, crate::Error>;

    /// Replace the persisted snapshot with `state`
    async fn save(&self, state: &ReconcilerState) -> Result<(), crate::Error>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}
