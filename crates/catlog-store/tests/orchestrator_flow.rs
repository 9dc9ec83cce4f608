//! Integration tests for the sync orchestrator: mutation cycles, change
//! notification ordering, failure states, and corrupt-load blocking.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use catlog_core::chunk::Chunk;
use catlog_core::ledger::{AssetEntry, AssetKind, Ledger};
use catlog_store::{ChunkStore, MemoryCollection, SyncError, SyncOrchestrator, SyncState};
use pretty_assertions::assert_eq;

fn orchestrator(chunk_size: usize) -> SyncOrchestrator<MemoryCollection> {
    SyncOrchestrator::new(ChunkStore::with_chunk_size(
        MemoryCollection::new(),
        NonZeroUsize::new(chunk_size).unwrap(),
    ))
}

fn asset(name: &str, amount: i64) -> AssetEntry {
    AssetEntry {
        id: String::new(),
        kind: AssetKind::Fixed,
        name: name.to_string(),
        amount,
        currency: "TWD".to_string(),
        original_amount: amount as f64,
        exchange_rate: 1.0,
    }
}

#[tokio::test]
async fn mutation_persists_and_round_trips() {
    let mut orchestrator = orchestrator(64);
    orchestrator.load().await.unwrap();

    let date = "2024-01-15".parse().unwrap();
    orchestrator
        .add_asset(date, asset("bank", 100_000))
        .await
        .unwrap();

    assert_eq!(orchestrator.state(), SyncState::Idle);
    assert_eq!(orchestrator.ledger().records[&date].len(), 1);

    // A second orchestrator over the same stored chunk set sees the data.
    let stored = orchestrator_from(&orchestrator);
    let mut second = stored;
    second.load().await.unwrap();
    assert_eq!(second.ledger(), orchestrator.ledger());
}

/// Clones the backing chunk documents into a fresh orchestrator, simulating
/// another session against the same collection.
fn orchestrator_from(
    source: &SyncOrchestrator<MemoryCollection>,
) -> SyncOrchestrator<MemoryCollection> {
    let chunks = source_store_snapshot(source);
    SyncOrchestrator::new(ChunkStore::with_chunk_size(
        MemoryCollection::with_chunks(chunks),
        NonZeroUsize::new(64).unwrap(),
    ))
}

fn source_store_snapshot(source: &SyncOrchestrator<MemoryCollection>) -> Vec<Chunk> {
    source.store().collection().snapshot()
}

#[tokio::test]
async fn change_listener_fires_before_persistence_completes() {
    let events: Arc<Mutex<Vec<String>>> = Arc::default();

    let listener_events = Arc::clone(&events);
    let progress_events = Arc::clone(&events);
    let mut orchestrator = SyncOrchestrator::new(ChunkStore::with_chunk_size(
        MemoryCollection::new(),
        NonZeroUsize::new(32).unwrap(),
    ))
    .with_change_listener(move |ledger: &Ledger| {
        listener_events
            .lock()
            .unwrap()
            .push(format!("changed:{}", ledger.records.len()));
    })
    .with_progress_listener(move |percent| {
        progress_events
            .lock()
            .unwrap()
            .push(format!("progress:{percent}"));
    });

    orchestrator
        .add_asset("2024-03-01".parse().unwrap(), asset("bank", 1))
        .await
        .unwrap();

    let log = events.lock().unwrap();
    // The change notification precedes every progress event of its cycle.
    assert_eq!(log[0], "changed:1");
    assert!(log[1..].iter().all(|entry| entry.starts_with("progress:")));
    assert_eq!(log.last().unwrap(), "progress:100");
}

#[tokio::test]
async fn failed_write_leaves_ledger_dirty_and_state_failed() {
    let mut orchestrator = orchestrator(16);
    orchestrator.load().await.unwrap();

    orchestrator.store().collection().fail_upsert_at(1);
    let date = "2024-05-01".parse().unwrap();
    let error = orchestrator
        .add_asset(date, asset("bank", 42))
        .await
        .unwrap_err();

    assert!(matches!(error, SyncError::Store(_)));
    assert_eq!(orchestrator.state(), SyncState::Failed);
    // The mutation is kept in memory, ahead of storage.
    assert!(orchestrator.ledger().records.contains_key(&date));

    // Manual retry after the fault clears.
    orchestrator.store().collection().clear_faults();
    orchestrator.persist().await.unwrap();
    assert_eq!(orchestrator.state(), SyncState::Idle);
}

#[tokio::test]
async fn reconcile_failure_is_not_fatal_and_retries_on_next_cycle() {
    let mut orchestrator = orchestrator(24);
    orchestrator.load().await.unwrap();

    // Big save, then shrink with deletes failing.
    orchestrator
        .update_memo("2024-01-01".parse().unwrap(), "m".repeat(300))
        .await
        .unwrap();
    orchestrator.store().collection().fail_delete(true);
    let outcome = orchestrator
        .update_memo("2024-01-01".parse().unwrap(), "tiny".to_string())
        .await
        .unwrap();

    assert!(outcome.reconcile_pending);
    assert_eq!(orchestrator.state(), SyncState::Idle);

    // Next cycle retries the reconciliation before writing.
    orchestrator.store().collection().fail_delete(false);
    let outcome = orchestrator
        .update_memo("2024-01-01".parse().unwrap(), "tiny".to_string())
        .await
        .unwrap();
    assert!(!outcome.reconcile_pending);

    let mut verifier = orchestrator_from(&orchestrator);
    verifier.load().await.unwrap();
    assert_eq!(verifier.ledger(), orchestrator.ledger());
}

#[tokio::test]
async fn corrupt_load_blocks_persisting() {
    let collection = MemoryCollection::with_chunks([Chunk {
        index: 0,
        content: "{\"definitely broken".to_string(),
    }]);
    let mut orchestrator =
        SyncOrchestrator::new(ChunkStore::with_chunk_size(collection, NonZeroUsize::new(64).unwrap()));

    let error = orchestrator.load().await.unwrap_err();
    assert!(matches!(
        error,
        SyncError::Store(catlog_store::StoreError::CorruptData { .. })
    ));
    assert!(orchestrator.is_blocked());

    // Persisting now would overwrite data a manual repair might still save.
    let error = orchestrator.persist().await.unwrap_err();
    assert!(matches!(error, SyncError::Blocked));
}

#[tokio::test]
async fn refresh_keeps_current_ledger_when_store_is_empty() {
    let mut orchestrator = orchestrator(64);
    orchestrator.replace({
        let mut ledger = Ledger::default();
        ledger.update_memo("2024-01-01".parse().unwrap(), "local only");
        ledger
    });

    let replaced = orchestrator.refresh().await.unwrap();
    assert!(!replaced);
    assert_eq!(
        orchestrator.ledger().memos.values().next().map(String::as_str),
        Some("local only")
    );
}

#[tokio::test]
async fn rejected_withdrawal_rate_skips_the_persist_cycle() {
    let counter = Arc::new(AtomicU32::new(0));
    let observed = Arc::clone(&counter);
    let mut orchestrator = SyncOrchestrator::new(ChunkStore::with_chunk_size(
        MemoryCollection::new(),
        NonZeroUsize::new(64).unwrap(),
    ))
    .with_change_listener(move |_| {
        observed.fetch_add(1, Ordering::SeqCst);
    });

    assert!(orchestrator.set_withdrawal_rate(0.0).await.unwrap().is_none());
    assert!(orchestrator.set_withdrawal_rate(-1.0).await.unwrap().is_none());
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(orchestrator.store().collection().is_empty());

    let outcome = orchestrator.set_withdrawal_rate(3.5).await.unwrap();
    assert!(outcome.is_some());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(
        (orchestrator.ledger().fire_settings.withdrawal_rate - 3.5).abs() < f64::EPSILON
    );
}
