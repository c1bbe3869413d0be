//! Test doubles and common utilities for reconciler contract tests
//!
//! The doubles are deliberately dumb: a registry that replays whatever the
//! test scripted, validators with one obvious rule each, and a store that
//! can be told to fail.

#![allow(dead_code)]

use async_trait::async_trait;
use lighthouse_core::error::{Error, InvalidNameError, Result, SchemaError};
use lighthouse_core::model::{ReconcilerState, TrieEntry, ValidatedMetadata};
use lighthouse_core::traits::{MetadataValidator, NameValidator, RegistryClient, StateStore};
use lighthouse_core::{MemoryStateStore, PersistMode, Reconciler, ReconcilerConfig, ReconcilerEvent};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// What the registry answers to `list_entries`
#[derive(Debug, Clone)]
pub enum Listing {
    Entries(Vec<TrieEntry>),
    Unavailable,
    Hang,
}

/// What the registry answers to `resolve(name)`
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Fail,
    Hang,
}

/// Registry double replaying scripted answers; clones share script and counters
#[derive(Clone)]
pub struct ScriptedRegistry {
    listing: Arc<Mutex<Listing>>,
    payloads: Arc<Mutex<HashMap<String, Payload>>>,
    list_calls: Arc<AtomicUsize>,
    resolved: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRegistry {
    pub fn new(entries: Vec<TrieEntry>) -> Self {
        Self {
            listing: Arc::new(Mutex::new(Listing::Entries(entries))),
            payloads: Arc::new(Mutex::new(HashMap::new())),
            list_calls: Arc::new(AtomicUsize::new(0)),
            resolved: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_entries(&self, entries: Vec<TrieEntry>) {
        *self.listing.lock().unwrap() = Listing::Entries(entries);
    }

    pub fn set_listing(&self, listing: Listing) {
        *self.listing.lock().unwrap() = listing;
    }

    pub fn set_payload(&self, name: &str, payload: Payload) {
        self.payloads
            .lock()
            .unwrap()
            .insert(name.to_string(), payload);
    }

    /// Builder form of [`set_payload`](Self::set_payload)
    pub fn with_payload(self, name: &str, payload: Payload) -> Self {
        self.set_payload(name, payload);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Names passed to `resolve`, in call order
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }

    pub fn resolve_count(&self, name: &str) -> usize {
        self.resolved().iter().filter(|n| *n == name).count()
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn list_entries(&self) -> Result<Vec<TrieEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let listing = self.listing.lock().unwrap().clone();
        match listing {
            Listing::Entries(entries) => Ok(entries),
            Listing::Unavailable => Err(Error::Other("connection refused".to_string())),
            Listing::Hang => std::future::pending().await,
        }
    }

    async fn resolve(&self, name: &str) -> Result<Value> {
        self.resolved.lock().unwrap().push(name.to_string());
        let payload = self.payloads.lock().unwrap().get(name).cloned();
        match payload {
            Some(Payload::Json(value)) => Ok(value),
            Some(Payload::Hang) => std::future::pending().await,
            Some(Payload::Fail) | None => Err(Error::resolve(name, "name not claimed")),
        }
    }

    fn client_name(&self) -> &'static str {
        "scripted"
    }
}

/// Accepts ASCII letters, digits and '-'; counts calls
#[derive(Clone, Default)]
pub struct CharsetNameValidator {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CharsetNameValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validated(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl NameValidator for CharsetNameValidator {
    fn validate_name(&self, name: &str) -> std::result::Result<(), InvalidNameError> {
        self.calls.lock().unwrap().push(name.to_string());
        match name.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '-')) {
            None if !name.is_empty() => Ok(()),
            None => Err(InvalidNameError::new(name, "empty")),
            Some(c) => Err(InvalidNameError::new(name, format!("contains {:?}", c))),
        }
    }
}

/// Accepts any object with a string `title`
pub struct TitleRequired;

impl MetadataValidator for TitleRequired {
    fn validate(&self, payload: &Value) -> std::result::Result<ValidatedMetadata, SchemaError> {
        let object = payload
            .as_object()
            .ok_or_else(|| SchemaError::new("payload is not an object"))?;
        match object.get("title") {
            Some(Value::String(_)) => Ok(ValidatedMetadata::new(object.clone())),
            _ => Err(SchemaError::new("missing title")),
        }
    }
}

/// Store whose saves can be made to fail; wraps a MemoryStateStore
#[derive(Clone, Default)]
pub struct FlakyStateStore {
    inner: MemoryStateStore,
    failing: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl FlakyStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStateStore {
        &self.inner
    }
}

#[async_trait]
impl StateStore for FlakyStateStore {
    async fn load(&self) -> Result<Option<ReconcilerState>> {
        self.inner.load().await
    }

    async fn save(&self, state: &ReconcilerState) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::persistence("disk full"));
        }
        self.inner.save(state).await
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

pub fn entry(name: &str, txid: &str) -> TrieEntry {
    TrieEntry::new(name, txid)
}

pub fn titled(title: &str) -> Payload {
    Payload::Json(json!({ "title": title, "description": "test claim" }))
}

/// Reconciler config with a short call timeout
pub fn test_config(persist_mode: PersistMode) -> ReconcilerConfig {
    ReconcilerConfig {
        poll_interval_secs: 30,
        call_timeout_secs: 5,
        persist_mode,
        event_channel_capacity: 1000,
    }
}

/// Build a reconciler over the given doubles with per-entry persistence
pub async fn reconciler_with(
    registry: &ScriptedRegistry,
    store: Box<dyn StateStore>,
) -> (Reconciler, mpsc::Receiver<ReconcilerEvent>) {
    reconciler_with_mode(registry, store, PersistMode::PerEntry).await
}

pub async fn reconciler_with_mode(
    registry: &ScriptedRegistry,
    store: Box<dyn StateStore>,
    persist_mode: PersistMode,
) -> (Reconciler, mpsc::Receiver<ReconcilerEvent>) {
    Reconciler::new(
        Box::new(registry.clone()),
        Box::new(CharsetNameValidator::new()),
        Box::new(TitleRequired),
        store,
        test_config(persist_mode),
    )
    .await
    .expect("reconciler construction succeeds")
}

/// Everything currently buffered on the event channel
pub fn drain_events(rx: &mut mpsc::Receiver<ReconcilerEvent>) -> Vec<ReconcilerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
