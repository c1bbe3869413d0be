//! Contract Test: Timer Lifecycle & Shutdown Determinism
//!
//! Constraints verified:
//! - The first cycle runs one interval after start, not immediately
//! - Cycles repeat on the interval
//! - stop() prevents further cycles and is idempotent
//! - shutdown() waits for the loop and hands the reconciler back
//! - Dropping the handle stops the loop
//!
//! If this test fails, someone has added an immediate first poll, a
//! detached task, or a shutdown path that loses state.

mod common;

use common::*;
use lighthouse_core::{MemoryStateStore, ReconcilerEvent};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn first_cycle_fires_after_one_interval() {
    let registry =
        ScriptedRegistry::new(vec![entry("alice", "t1")]).with_payload("alice", titled("Alice"));
    let (reconciler, _events) =
        reconciler_with(&registry, Box::new(MemoryStateStore::new())).await;

    let handle = reconciler.start();

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(registry.list_calls(), 0, "no poll before the first interval");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(registry.list_calls(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(registry.list_calls(), 2);

    let reconciler = handle.shutdown().await.unwrap();
    assert_eq!(reconciler.state().metadata["alice"].txid, "t1");
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_halts_polling() {
    let registry = ScriptedRegistry::new(Vec::new());
    let (reconciler, _events) =
        reconciler_with(&registry, Box::new(MemoryStateStore::new())).await;

    let mut handle = reconciler.start();
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(registry.list_calls(), 1);
    assert!(handle.is_running());

    handle.stop();
    handle.stop();
    assert!(!handle.is_running());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(registry.list_calls(), 1, "no cycles after stop");

    // shutdown after stop is still fine
    tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("loop exits promptly")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn outage_does_not_kill_the_loop() {
    let registry = ScriptedRegistry::new(Vec::new());
    registry.set_listing(Listing::Unavailable);
    let (reconciler, mut events) =
        reconciler_with(&registry, Box::new(MemoryStateStore::new())).await;

    let handle = reconciler.start();
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(registry.list_calls(), 2, "retried on the next tick");

    let reconciler = handle.shutdown().await.unwrap();
    assert!(reconciler.state().claimtrie.is_empty());

    let events = drain_events(&mut events);
    let skipped = events
        .iter()
        .filter(|e| matches!(e, ReconcilerEvent::CycleSkipped { .. }))
        .count();
    assert_eq!(skipped, 2);
    assert!(matches!(events.first(), Some(ReconcilerEvent::Started { .. })));
    assert!(matches!(events.last(), Some(ReconcilerEvent::Stopped { .. })));
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_unpersisted_state() {
    let registry = ScriptedRegistry::new(vec![entry("alice", "t1")]);
    let store = FlakyStateStore::new();
    let (mut reconciler, _events) = reconciler_with(&registry, Box::new(store.clone())).await;

    // quarantine something without persisting it
    reconciler.filter_remote_trie(vec![entry("no good", "t7")]);
    assert!(reconciler.is_dirty());

    let handle = reconciler.start();
    let reconciler = handle.shutdown().await.unwrap();

    assert!(!reconciler.is_dirty());
    let saved = store.inner().snapshot().await.unwrap();
    assert!(saved.bad_uris.contains("t7"));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_loop() {
    let registry = ScriptedRegistry::new(Vec::new());
    let (reconciler, mut events) =
        reconciler_with(&registry, Box::new(MemoryStateStore::new())).await;

    drop(reconciler.start());
    tokio::time::sleep(Duration::from_secs(90)).await;

    assert_eq!(registry.list_calls(), 0);
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        ReconcilerEvent::Stopped { reason } if reason == "Handle dropped"
    )));
}
