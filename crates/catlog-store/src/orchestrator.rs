//! The sync orchestrator: single authoritative owner of the in-memory
//! ledger.
//!
//! The UI layer never holds the ledger itself. It asks the orchestrator for
//! the current snapshot, hands every mutation through one of the helpers
//! below, and listens on two explicit callbacks:
//!
//! - `on_change` fires after each successful in-memory replacement,
//!   *before* persistence completes; rendering is decoupled from the
//!   network.
//! - `on_progress` relays chunk-write percentages while a persist cycle is
//!   in flight.
//!
//! Every mutation runs the same sequence: clone the authoritative ledger,
//! apply the pure mutation from `catlog_core`, swap the result in, notify,
//! then persist the whole value. Persist cycles never overlap: the methods
//! take `&mut self`, so a second mutation cannot start until the first
//! cycle resolved. Cancellation mid-write is not supported; a started
//! cycle runs to success or failure.
//!
//! # Failure handling
//!
//! - A failed write leaves the ledger in memory, unpersisted, with the
//!   state at [`SyncState::Failed`]; the caller warns the user and may call
//!   [`SyncOrchestrator::persist`] again.
//! - A failed reconciliation is logged and remembered; it is retried before
//!   the next write (and the next write's own reconciliation self-heals
//!   regardless).
//! - A corrupt load poisons the orchestrator: further persists are refused
//!   until a later [`SyncOrchestrator::load`] or
//!   [`SyncOrchestrator::refresh`] succeeds, so a half-read ledger can
//!   never overwrite the (possibly recoverable) stored data.

use std::collections::BTreeMap;

use catlog_core::ledger::{AssetEntry, ExpenseEntry, IncomeSource, Ledger, YearMonth};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use crate::backend::ChunkCollection;
use crate::store::{ChunkStore, StoreError};

/// Callback invoked with the new ledger after each in-memory replacement.
pub type ChangeListener = Box<dyn Fn(&Ledger) + Send + Sync>;

/// Callback invoked with chunk-write progress percentages (1-100).
pub type ProgressListener = Box<dyn Fn(u8) + Send + Sync>;

/// Phase of the persist cycle.
///
/// Transitions per mutation cycle: `Idle → Writing → Reconciling → Idle`
/// on success, `Idle → Writing → Failed` on a write error. `Failed` is the
/// only phase observable from outside between cycles: while a cycle runs
/// the orchestrator is exclusively borrowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncState {
    /// No persist cycle in flight.
    #[default]
    Idle,
    /// Sequential chunk writes in flight.
    Writing,
    /// Stale-tail reconciliation in flight.
    Reconciling,
    /// A write failed; the in-memory ledger is ahead of storage.
    Failed,
}

/// Orchestrator-level errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Persisting is blocked because the last load found corrupt data.
    /// Writing now could overwrite fragments a manual repair still needs.
    #[error("persist blocked: stored ledger data is corrupt and unresolved")]
    Blocked,
}

/// Result of one persist cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Chunks written.
    pub chunks_written: u32,
    /// Stale tail chunks deleted.
    pub stale_deleted: u32,
    /// Whether stale-tail reconciliation is still pending (it failed and
    /// will be retried on the next opportunity).
    pub reconcile_pending: bool,
}

/// Coordinates the in-memory ledger with its chunked storage.
pub struct SyncOrchestrator<C> {
    ledger: Ledger,
    store: ChunkStore<C>,
    state: SyncState,
    reconcile_pending: bool,
    poisoned: bool,
    on_change: Option<ChangeListener>,
    on_progress: Option<ProgressListener>,
}

impl<C: ChunkCollection> SyncOrchestrator<C> {
    /// Creates an orchestrator over a store, starting from a default ledger.
    #[must_use]
    pub fn new(store: ChunkStore<C>) -> Self {
        Self {
            ledger: Ledger::default(),
            store,
            state: SyncState::Idle,
            reconcile_pending: false,
            poisoned: false,
            on_change: None,
            on_progress: None,
        }
    }

    /// Installs the change listener.
    #[must_use]
    pub fn with_change_listener(mut self, listener: impl Fn(&Ledger) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(listener));
        self
    }

    /// Installs the progress listener.
    #[must_use]
    pub fn with_progress_listener(mut self, listener: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(listener));
        self
    }

    /// The current authoritative ledger snapshot.
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The underlying chunk store.
    pub const fn store(&self) -> &ChunkStore<C> {
        &self.store
    }

    /// Current sync state.
    pub const fn state(&self) -> SyncState {
        self.state
    }

    /// Whether persisting is blocked by an unresolved corrupt load.
    pub const fn is_blocked(&self) -> bool {
        self.poisoned
    }

    /// Loads the stored ledger at session start.
    ///
    /// Falls back to the default ledger when nothing was ever saved. A
    /// corrupt read poisons the orchestrator (see module docs) and is
    /// returned to the caller.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError::CorruptData`] and backend listing failures.
    pub async fn load(&mut self) -> Result<(), SyncError> {
        match self.store.read().await {
            Ok(Some(outcome)) => {
                self.poisoned = false;
                self.replace(outcome.ledger);
                Ok(())
            }
            Ok(None) => {
                self.poisoned = false;
                self.replace(Ledger::default());
                Ok(())
            }
            Err(error) => {
                if matches!(error, StoreError::CorruptData { .. }) {
                    self.poisoned = true;
                }
                Err(error.into())
            }
        }
    }

    /// Re-reads the stored ledger on demand (manual refresh). Unlike
    /// [`Self::load`], finding nothing stored keeps the current in-memory
    /// ledger.
    ///
    /// Returns whether stored data replaced the in-memory ledger.
    ///
    /// # Errors
    ///
    /// Propagates [`StoreError::CorruptData`] and backend listing failures.
    pub async fn refresh(&mut self) -> Result<bool, SyncError> {
        match self.store.read().await {
            Ok(Some(outcome)) => {
                self.poisoned = false;
                self.replace(outcome.ledger);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(error) => {
                if matches!(error, StoreError::CorruptData { .. }) {
                    self.poisoned = true;
                }
                Err(error.into())
            }
        }
    }

    /// Replaces the authoritative ledger and notifies the change listener.
    /// Persistence is NOT triggered; use [`Self::commit`] for the full
    /// replace-and-persist cycle.
    pub fn replace(&mut self, ledger: Ledger) {
        self.ledger = ledger;
        if let Some(listener) = &self.on_change {
            listener(&self.ledger);
        }
    }

    /// Replaces the authoritative ledger, notifies, and persists.
    ///
    /// This is the wholesale-import entry point (external backup payloads
    /// arrive as complete ledgers).
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn commit(&mut self, ledger: Ledger) -> Result<PersistOutcome, SyncError> {
        self.replace(ledger);
        self.persist().await
    }

    /// Applies a pure mutation to a clone of the current ledger, swaps the
    /// result in, notifies, and persists.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn mutate(
        &mut self,
        mutation: impl FnOnce(&mut Ledger),
    ) -> Result<PersistOutcome, SyncError> {
        let mut next = self.ledger.clone();
        mutation(&mut next);
        self.commit(next).await
    }

    /// Persists the current in-memory ledger through the chunk store.
    ///
    /// # Errors
    ///
    /// [`SyncError::Blocked`] while poisoned by a corrupt load;
    /// [`StoreError::WriteFailed`] (state moves to [`SyncState::Failed`],
    /// the ledger stays in memory for a retry). A reconcile failure is NOT
    /// an error here: the outcome reports it as pending.
    pub async fn persist(&mut self) -> Result<PersistOutcome, SyncError> {
        if self.poisoned {
            return Err(SyncError::Blocked);
        }

        if self.reconcile_pending {
            self.state = SyncState::Reconciling;
            match self.store.reconcile_stale().await {
                Ok(_) => self.reconcile_pending = false,
                Err(error) => {
                    // The upcoming write reconciles again anyway.
                    warn!(error = %error, "stale-tail reconcile retry failed");
                }
            }
        }

        self.state = SyncState::Writing;
        let progress = &self.on_progress;
        let written = self
            .store
            .write_chunks(&self.ledger, |percent| {
                if let Some(listener) = progress {
                    listener(percent);
                }
            })
            .await;

        let chunks_written = match written {
            Ok(total) => total,
            Err(error) => {
                self.state = SyncState::Failed;
                return Err(error.into());
            }
        };

        self.state = SyncState::Reconciling;
        match self.store.reconcile_stale().await {
            Ok(stale_deleted) => {
                self.state = SyncState::Idle;
                self.reconcile_pending = false;
                Ok(PersistOutcome {
                    chunks_written,
                    stale_deleted,
                    reconcile_pending: false,
                })
            }
            Err(error) => {
                // The save itself is durable; remember the debt and move on.
                warn!(error = %error, "write saved but stale-tail reconciliation failed");
                self.state = SyncState::Idle;
                self.reconcile_pending = true;
                Ok(PersistOutcome {
                    chunks_written,
                    stale_deleted: 0,
                    reconcile_pending: true,
                })
            }
        }
    }
}

impl<C: ChunkCollection> SyncOrchestrator<C> {
    // ------------------------------------------------------------------
    // Mutation helpers: one per UI operation. Each is replace-and-persist
    // over the corresponding pure mutation on `Ledger`.
    // ------------------------------------------------------------------

    /// Replaces one day's snapshot, memo, and month income in one edit.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn update_day_details(
        &mut self,
        date: NaiveDate,
        assets: Vec<AssetEntry>,
        memo: String,
        sources: Vec<IncomeSource>,
    ) -> Result<PersistOutcome, SyncError> {
        self.mutate(|ledger| ledger.update_day_details(date, assets, memo, sources))
            .await
    }

    /// Replaces one day's asset snapshot.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn update_records(
        &mut self,
        date: NaiveDate,
        assets: Vec<AssetEntry>,
    ) -> Result<PersistOutcome, SyncError> {
        self.mutate(|ledger| ledger.update_records(date, assets)).await
    }

    /// Sets one day's memo.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn update_memo(
        &mut self,
        date: NaiveDate,
        memo: String,
    ) -> Result<PersistOutcome, SyncError> {
        self.mutate(|ledger| ledger.update_memo(date, memo)).await
    }

    /// Replaces a month's income sources.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn update_income(
        &mut self,
        month: YearMonth,
        sources: Vec<IncomeSource>,
    ) -> Result<PersistOutcome, SyncError> {
        self.mutate(|ledger| ledger.update_income(month, sources)).await
    }

    /// Appends one asset entry to a day.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn add_asset(
        &mut self,
        date: NaiveDate,
        entry: AssetEntry,
    ) -> Result<PersistOutcome, SyncError> {
        self.mutate(|ledger| ledger.add_asset(date, entry)).await
    }

    /// Appends one income source to a month.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn add_income(
        &mut self,
        month: YearMonth,
        source: IncomeSource,
    ) -> Result<PersistOutcome, SyncError> {
        self.mutate(|ledger| ledger.add_income(month, source)).await
    }

    /// Deletes a day's snapshot and memo.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn delete_day(
        &mut self,
        date: NaiveDate,
    ) -> Result<PersistOutcome, SyncError> {
        self.mutate(|ledger| ledger.delete_day(date)).await
    }

    /// Whole-month expense replacement from an import payload.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn merge_expenses(
        &mut self,
        by_month: BTreeMap<YearMonth, Vec<ExpenseEntry>>,
    ) -> Result<PersistOutcome, SyncError> {
        self.mutate(|ledger| ledger.merge_expenses(by_month)).await
    }

    /// Updates the withdrawal rate. A rejected (non-positive) rate is a
    /// no-op: nothing is replaced or persisted.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub async fn set_withdrawal_rate(
        &mut self,
        rate: f64,
    ) -> Result<Option<PersistOutcome>, SyncError> {
        let mut next = self.ledger.clone();
        if !next.set_withdrawal_rate(rate) {
            return Ok(None);
        }
        self.commit(next).await.map(Some)
    }
}
