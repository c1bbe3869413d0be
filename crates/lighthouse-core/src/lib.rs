// # lighthouse-core
//
// Core library for the Lighthouse registry metadata reconciler.
//
// ## Architecture Overview
//
// - **RegistryClient**: Trait for listing claims and resolving their metadata
// - **NameValidator / MetadataValidator**: Traits for the external validation rules
// - **StateStore**: Trait for persisting the reconciler snapshot
// - **Reconciler**: Polls the registry, diffs against the cache, refreshes
//   changed claims, quarantines invalid ones, persists the result
//
// ## Design Principles
//
// 1. **Single owner**: One task owns the reconciler state; no locks
// 2. **Incremental**: Only new or re-issued claims are resolved
// 3. **Quarantine**: Every per-claim failure ends in permanent exclusion
// 4. **Library-First**: The daemon is a thin wrapper around this crate

pub mod config;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{CacheConfig, LighthouseConfig, PersistMode, ReconcilerConfig, RegistryConfig};
pub use error::{Error, InvalidNameError, Result, SchemaError};
pub use model::{MetadataRecord, QuarantineSet, ReconcilerState, TrieEntry, ValidatedMetadata};
pub use reconciler::{
    CycleReport, QuarantineReason, Reconciler, ReconcilerEvent, ReconcilerHandle, RefreshOutcome,
};
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{MetadataValidator, NameValidator, RegistryClient, StateStore};
