//! Data model shared by the reconciler, the state stores and the plugins
//!
//! ## Cache file format
//!
//! [`ReconcilerState`] serializes to the object the cache file holds:
//!
//! ```json
//! {
//!   "claimtrie": [{ "name": "alice", "txid": "t1", "value": "..." }],
//!   "metadata": { "alice": { "title": "...", "txid": "t1" } },
//!   "bad_uris": ["t2"]
//! }
//! ```

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A claim as reported by the registry's name trie listing
///
/// Only `name` and `txid` are interpreted. Every other field the registry
/// sends is carried along untouched and takes part in equality, so a claim
/// whose registry-side fields change compares unequal to the cached copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrieEntry {
    /// Claimed name, unique within the trie
    pub name: String,
    /// Transaction that created the current claim
    pub txid: String,
    /// Registry-specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TrieEntry {
    pub fn new(name: impl Into<String>, txid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            txid: txid.into(),
            fields: Map::new(),
        }
    }

    /// Attach a registry-specific field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// A metadata payload that passed schema validation
///
/// Constructed by [`MetadataValidator`](crate::traits::MetadataValidator)
/// implementations once a payload is accepted. The reconciler only ever turns
/// values of this type into [`MetadataRecord`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMetadata {
    fields: Map<String, Value>,
}

impl ValidatedMetadata {
    /// Wrap fields a validator has accepted
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Validated metadata for a name, stamped with the txid it was validated for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// The claim transaction this metadata belongs to
    pub txid: String,
    /// Validated metadata fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl MetadataRecord {
    /// Stamp validated metadata with the txid of the claim it came from
    pub fn stamped(metadata: ValidatedMetadata, txid: impl Into<String>) -> Self {
        let mut fields = metadata.fields;
        // the stamp owns this key in the flattened form
        fields.remove("txid");
        Self {
            txid: txid.into(),
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Transaction ids excluded from all further processing
///
/// Insertion-ordered, duplicate-free. There is no expiry: an entry leaves
/// through [`QuarantineSet::clear`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuarantineSet {
    txids: IndexSet<String>,
}

impl QuarantineSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.txids.contains(txid)
    }

    /// Quarantine a txid. Returns `false` if it was already quarantined.
    pub fn insert(&mut self, txid: impl Into<String>) -> bool {
        self.txids.insert(txid.into())
    }

    pub fn clear(&mut self) {
        self.txids.clear();
    }

    pub fn len(&self) -> usize {
        self.txids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txids.is_empty()
    }
}

/// Everything the reconciler owns, persisted as one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerState {
    /// Accepted claims, in registry listing order
    pub claimtrie: Vec<TrieEntry>,
    /// Validated metadata keyed by name
    pub metadata: BTreeMap<String, MetadataRecord>,
    /// Quarantined transaction ids
    pub bad_uris: QuarantineSet,
}

impl ReconcilerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the cached metadata for `entry.name` was validated for `entry.txid`
    pub fn is_current(&self, entry: &TrieEntry) -> bool {
        self.metadata
            .get(&entry.name)
            .is_some_and(|record| record.txid == entry.txid)
    }
}
