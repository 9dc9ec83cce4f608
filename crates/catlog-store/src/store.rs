//! The chunk store: durable ledger persistence with reconciliation and
//! tail-trim recovery.
//!
//! # Write protocol
//!
//! 1. Serialize the ledger to its canonical JSON string.
//! 2. Split into N ordered chunks.
//! 3. Write the chunks **sequentially in ascending index order**, one
//!    round-trip each, reporting progress after every successful write.
//!    Sequential writing is contractual: it keeps progress monotonic and
//!    guarantees a partial failure leaves a clean prefix of the new chunk
//!    set rather than an interleaved mixture with the previous save.
//! 4. Reconcile: delete every stored chunk with `index >= N` as one batch.
//!    These are leftovers from a previous, larger save; left in place they
//!    would corrupt a future join.
//!
//! A mid-write failure surfaces as [`StoreError::WriteFailed`] with the last
//! completed index; there is no automatic retry. Re-running `write` with the
//! same ledger is safe because upserts are idempotent per index. A
//! reconciliation failure surfaces as [`StoreError::ReconcileFailed`]: the
//! ledger **is** durably saved at that point; the caller logs a warning and
//! retries reconciliation at the next opportunity.
//!
//! # Read protocol
//!
//! Fetch all chunks ordered by index, join, parse. When no chunks exist the
//! ledger simply has never been saved (`Ok(None)`, not an error). When the
//! join does not parse, run the recovery heuristic: repeatedly remove the
//! last chunk's content from the tail of the joined string, re-parsing after
//! each trim, down to but excluding the first chunk. The heuristic never
//! trims from the front or middle: the only corruption this system produces
//! is orphaned *trailing* fragments from a shrinking save racing its
//! reconciliation. The first successful parse wins and is reported (and
//! warn-logged) with the number of fragments discarded; a recovered read is
//! a symptom, never a silent success. If no prefix parses, the read fails
//! with [`StoreError::CorruptData`] carrying the original parse error.
//! Callers must surface it and must NOT fall back to an empty ledger.

use std::num::NonZeroUsize;

use catlog_core::chunk::{self, EncodingError, DEFAULT_CHUNK_SIZE};
use catlog_core::ledger::Ledger;
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::{BackendError, ChunkCollection};

/// Errors from the chunk store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The ledger value failed to serialize. Indicates a caller bug.
    #[error("ledger serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Malformed codec input. Indicates a caller bug.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// A chunk write failed mid-sequence. The backend holds a valid prefix
    /// of the new save; re-running `write` with the same ledger is safe.
    #[error("chunk write failed after index {last_completed:?} of {total} chunks")]
    WriteFailed {
        /// Index of the last chunk written successfully, `None` when the
        /// very first write failed.
        last_completed: Option<u32>,
        /// Total chunks in this save.
        total: u32,
        /// The backend failure.
        #[source]
        source: BackendError,
    },

    /// Stale-chunk deletion failed after a fully successful write. The
    /// ledger is durably saved, but tail fragments from a previous larger
    /// save may remain and would corrupt a future read.
    #[error("stale chunk reconciliation failed; ledger is saved but tail fragments may remain")]
    ReconcileFailed {
        /// The backend failure.
        #[source]
        source: BackendError,
    },

    /// Chunk listing failed during a read.
    #[error("chunk listing failed")]
    ReadFailed {
        /// The backend failure.
        #[source]
        source: BackendError,
    },

    /// The joined chunk set does not parse even after tail-trim recovery.
    /// Fatal for this read: surface to the user, block further writes, do
    /// not substitute an empty ledger.
    #[error("ledger data corrupt: join does not parse even after tail-trim recovery")]
    CorruptData {
        /// The parse error from the untrimmed join.
        #[source]
        source: serde_json::Error,
    },
}

/// Result of a successful write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Chunks written in this save.
    pub chunks_written: u32,
    /// Stale tail chunks deleted by reconciliation.
    pub stale_deleted: u32,
}

/// Result of a successful read.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    /// The reconstructed ledger.
    pub ledger: Ledger,
    /// Number of orphaned tail fragments discarded by recovery. Zero for a
    /// clean read; non-zero reads were warn-logged.
    pub recovered_tail_chunks: usize,
}

/// Durable storage for one ledger's chunk representation.
///
/// One store owns one collection (one ledger identity). Writes take
/// `&mut self`: only one persist cycle can be in flight, which is exactly
/// the concurrency contract — callers serialize their own mutation cycles.
#[derive(Debug)]
pub struct ChunkStore<C> {
    collection: C,
    chunk_size: NonZeroUsize,
    /// Chunk count of the last fully written save, for reconcile retries.
    last_written: Option<u32>,
}

impl<C: ChunkCollection> ChunkStore<C> {
    /// Creates a store with the default chunk size.
    #[must_use]
    pub fn new(collection: C) -> Self {
        Self::with_chunk_size(collection, DEFAULT_CHUNK_SIZE)
    }

    /// Creates a store with an explicit chunk size (character count).
    #[must_use]
    pub const fn with_chunk_size(collection: C, chunk_size: NonZeroUsize) -> Self {
        Self {
            collection,
            chunk_size,
            last_written: None,
        }
    }

    /// The underlying collection.
    pub const fn collection(&self) -> &C {
        &self.collection
    }

    /// Chunk count of the last fully written save, when one happened.
    pub const fn last_written_chunks(&self) -> Option<u32> {
        self.last_written
    }

    /// Persists the ledger: the sequential chunk writes followed by
    /// stale-tail reconciliation, as one call.
    ///
    /// Progress percentages (1-100) arrive through `on_progress` after each
    /// chunk lands. Callers that need to observe the two phases separately
    /// (the orchestrator's state machine does) drive
    /// [`Self::write_chunks`] and [`Self::reconcile_stale`] themselves.
    ///
    /// # Errors
    ///
    /// [`StoreError::WriteFailed`] on a mid-sequence backend failure (the
    /// save did not complete; retry the whole write);
    /// [`StoreError::ReconcileFailed`] when the save completed but stale
    /// tail deletion failed (retry via [`Self::reconcile_stale`] or let the
    /// next write self-heal); [`StoreError::Serialize`] /
    /// [`StoreError::Encoding`] on caller bugs.
    pub async fn write(
        &mut self,
        ledger: &Ledger,
        on_progress: impl FnMut(u8),
    ) -> Result<WriteReport, StoreError> {
        let chunks_written = self.write_chunks(ledger, on_progress).await?;
        let stale_deleted = self.reconcile_stale().await?;
        Ok(WriteReport {
            chunks_written,
            stale_deleted,
        })
    }

    /// Step one of a save: serialize, split, and write the chunks
    /// sequentially in ascending index order. Returns the chunk count.
    ///
    /// On success the save is durable; run [`Self::reconcile_stale`] next
    /// to clear tail fragments a previous larger save may have left.
    ///
    /// # Errors
    ///
    /// [`StoreError::WriteFailed`] with the last completed index on a
    /// backend failure; [`StoreError::Serialize`] / [`StoreError::Encoding`]
    /// on caller bugs.
    pub async fn write_chunks(
        &mut self,
        ledger: &Ledger,
        mut on_progress: impl FnMut(u8),
    ) -> Result<u32, StoreError> {
        let serialized = serde_json::to_string(ledger).map_err(StoreError::Serialize)?;
        let chunks = chunk::split(&serialized, self.chunk_size)?;
        let total = chunks.len() as u32;

        let mut last_completed = None;
        for chunk in &chunks {
            if let Err(source) = self.collection.upsert(chunk).await {
                return Err(StoreError::WriteFailed {
                    last_completed,
                    total,
                    source,
                });
            }
            last_completed = Some(chunk.index);
            let percent = (f64::from(chunk.index + 1) / f64::from(total) * 100.0).round() as u8;
            debug!(chunk = chunk.index, total, percent, "chunk written");
            on_progress(percent);
        }

        // The save is durable from here on; remember its extent so a failed
        // reconciliation can be retried without rewriting.
        self.last_written = Some(total);
        Ok(total)
    }

    /// Step two of a save: delete every stored chunk beyond the last fully
    /// written save, as one atomic batch.
    ///
    /// Returns the number of stale chunks deleted; 0 when nothing was ever
    /// written or nothing is stale. Safe to re-run at any time.
    ///
    /// # Errors
    ///
    /// [`StoreError::ReconcileFailed`] on a backend failure. The save
    /// itself stays durable.
    pub async fn reconcile_stale(&mut self) -> Result<u32, StoreError> {
        let Some(keep) = self.last_written else {
            return Ok(0);
        };

        let stale = self
            .collection
            .list_from(keep)
            .await
            .map_err(|source| StoreError::ReconcileFailed { source })?;
        if stale.is_empty() {
            return Ok(0);
        }

        let indices: Vec<u32> = stale.iter().map(|chunk| chunk.index).collect();
        self.collection
            .delete_batch(&indices)
            .await
            .map_err(|source| StoreError::ReconcileFailed { source })?;
        debug!(deleted = indices.len(), first_stale = keep, "stale tail chunks reconciled");
        Ok(indices.len() as u32)
    }

    /// Loads the ledger from the chunk set.
    ///
    /// Returns `Ok(None)` when no chunks exist: the ledger has never been
    /// saved and the caller falls back to a default.
    ///
    /// # Errors
    ///
    /// [`StoreError::ReadFailed`] when listing fails;
    /// [`StoreError::CorruptData`] when the join does not parse even after
    /// tail-trim recovery.
    pub async fn read(&self) -> Result<Option<ReadOutcome>, StoreError> {
        let mut chunks = self
            .collection
            .list()
            .await
            .map_err(|source| StoreError::ReadFailed { source })?;
        if chunks.is_empty() {
            return Ok(None);
        }

        // The backend contract says ascending already; sort anyway. Joining
        // out-of-order chunks must never be attempted.
        chunks.sort_by_key(|chunk| chunk.index);

        let joined: String = chunks.iter().map(|chunk| chunk.content.as_str()).collect();
        let parse_error = match serde_json::from_str::<Ledger>(&joined) {
            Ok(ledger) => {
                return Ok(Some(ReadOutcome {
                    ledger,
                    recovered_tail_chunks: 0,
                }));
            }
            Err(error) => error,
        };

        warn!(
            error = %parse_error,
            chunks = chunks.len(),
            "ledger join did not parse; attempting tail-trim recovery"
        );

        // Trim whole fragments off the tail, highest index first, keeping at
        // least the first fragment.
        let mut trimmed = joined;
        for discarded in 1..chunks.len() {
            let tail = &chunks[chunks.len() - discarded];
            trimmed.truncate(trimmed.len() - tail.content.len());
            if let Ok(ledger) = serde_json::from_str::<Ledger>(&trimmed) {
                warn!(
                    discarded,
                    "recovered ledger by discarding orphaned tail fragments"
                );
                return Ok(Some(ReadOutcome {
                    ledger,
                    recovered_tail_chunks: discarded,
                }));
            }
        }

        Err(StoreError::CorruptData {
            source: parse_error,
        })
    }
}
