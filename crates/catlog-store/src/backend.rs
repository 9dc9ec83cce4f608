//! The ordered document-collection contract and its in-memory backend.
//!
//! The chunk store talks to storage through [`ChunkCollection`], a minimal
//! seam implementable atop any keyed-document backend: idempotent upsert of
//! one `{index, content}` document, index-ascending listing (optionally from
//! a lower bound), and all-or-nothing batch delete. One collection holds one
//! ledger's chunk set, scoped per owner by whoever constructs the backend.
//!
//! The trait is object-safe: methods return [`BoxFuture`] rather than using
//! `async fn`, so stores can hold `Box<dyn ChunkCollection>` backends.
//!
//! [`MemoryCollection`] is the in-process implementation. It backs the test
//! suites and doubles as a scratch backend; its fault injection knobs
//! simulate the mid-write and mid-reconcile network failures the store's
//! protocol is designed around.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use catlog_core::chunk::Chunk;
use thiserror::Error;

/// Object-safe future alias for backend operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A backend operation failure (network, quota, permission, ...).
///
/// Backends reduce their native failures to this shape; the store never
/// inspects anything beyond the operation label and message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("collection {operation} failed: {message}")]
pub struct BackendError {
    /// Which operation failed (`upsert`, `list`, `delete`).
    pub operation: &'static str,
    /// Backend-specific description.
    pub message: String,
}

impl BackendError {
    /// Builds an error for a failed operation.
    #[must_use]
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

/// Minimal ordered document-collection contract.
///
/// Implementations must make `upsert` idempotent per index (a re-run with
/// identical content is a no-op) and `delete_batch` all-or-nothing.
pub trait ChunkCollection: Send + Sync {
    /// Upserts one chunk document keyed by its index.
    fn upsert<'a>(&'a self, chunk: &'a Chunk) -> BoxFuture<'a, Result<(), BackendError>>;

    /// Lists every stored chunk, ordered by index ascending.
    fn list<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Chunk>, BackendError>>;

    /// Lists stored chunks with `index >= min_index`, ordered ascending.
    fn list_from<'a>(&'a self, min_index: u32) -> BoxFuture<'a, Result<Vec<Chunk>, BackendError>>;

    /// Deletes the given indices as one atomic batch. Missing indices are
    /// not an error.
    fn delete_batch<'a>(&'a self, indices: &'a [u32]) -> BoxFuture<'a, Result<(), BackendError>>;
}

/// Fault-injection plan for [`MemoryCollection`].
#[derive(Debug, Default)]
struct FaultPlan {
    /// Fail the upsert of this index (once armed, every attempt).
    fail_upsert_at: Option<u32>,
    /// Fail every listing call.
    fail_list: bool,
    /// Fail every batch delete.
    fail_delete: bool,
}

/// In-memory chunk collection.
///
/// Chunks live in a `BTreeMap` keyed by index, so listing order falls out
/// of the map. All operations complete immediately; the async surface
/// exists to exercise the store's sequential-await protocol.
#[derive(Debug, Default)]
pub struct MemoryCollection {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    chunks: BTreeMap<u32, String>,
    faults: FaultPlan,
    upserts: u64,
}

// Mutex poisoning indicates a panicked test thread; unrecoverable.
#[allow(clippy::missing_panics_doc)]
impl MemoryCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection pre-seeded with chunk documents.
    #[must_use]
    pub fn with_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        let collection = Self::new();
        {
            let mut inner = collection.inner.lock().unwrap();
            for chunk in chunks {
                inner.chunks.insert(chunk.index, chunk.content);
            }
        }
        collection
    }

    /// Arms a failure for the upsert of `index`.
    pub fn fail_upsert_at(&self, index: u32) {
        self.inner.lock().unwrap().faults.fail_upsert_at = Some(index);
    }

    /// Arms or clears listing failures.
    pub fn fail_list(&self, fail: bool) {
        self.inner.lock().unwrap().faults.fail_list = fail;
    }

    /// Arms or clears batch-delete failures.
    pub fn fail_delete(&self, fail: bool) {
        self.inner.lock().unwrap().faults.fail_delete = fail;
    }

    /// Clears every armed fault.
    pub fn clear_faults(&self) {
        self.inner.lock().unwrap().faults = FaultPlan::default();
    }

    /// Snapshot of the stored chunk set, index order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Chunk> {
        self.inner
            .lock()
            .unwrap()
            .chunks
            .iter()
            .map(|(&index, content)| Chunk {
                index,
                content: content.clone(),
            })
            .collect()
    }

    /// Number of stored chunk documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().chunks.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().chunks.is_empty()
    }

    /// Total number of upsert calls observed (successful or not).
    #[must_use]
    pub fn upsert_count(&self) -> u64 {
        self.inner.lock().unwrap().upserts
    }

    /// Overwrites one stored document directly, bypassing the fault plan.
    /// Test hook for simulating stale tails left by a raced save.
    pub fn inject_chunk(&self, chunk: Chunk) {
        self.inner
            .lock()
            .unwrap()
            .chunks
            .insert(chunk.index, chunk.content);
    }
}

#[allow(clippy::missing_panics_doc)]
impl ChunkCollection for MemoryCollection {
    fn upsert<'a>(&'a self, chunk: &'a Chunk) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            inner.upserts += 1;
            if inner.faults.fail_upsert_at == Some(chunk.index) {
                return Err(BackendError::new(
                    "upsert",
                    format!("injected failure at index {}", chunk.index),
                ));
            }
            inner.chunks.insert(chunk.index, chunk.content.clone());
            Ok(())
        })
    }

    fn list<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Chunk>, BackendError>> {
        self.list_from(0)
    }

    fn list_from<'a>(&'a self, min_index: u32) -> BoxFuture<'a, Result<Vec<Chunk>, BackendError>> {
        Box::pin(async move {
            let inner = self.inner.lock().unwrap();
            if inner.faults.fail_list {
                return Err(BackendError::new("list", "injected listing failure"));
            }
            Ok(inner
                .chunks
                .range(min_index..)
                .map(|(&index, content)| Chunk {
                    index,
                    content: content.clone(),
                })
                .collect())
        })
    }

    fn delete_batch<'a>(&'a self, indices: &'a [u32]) -> BoxFuture<'a, Result<(), BackendError>> {
        Box::pin(async move {
            let mut inner = self.inner.lock().unwrap();
            if inner.faults.fail_delete {
                return Err(BackendError::new("delete", "injected delete failure"));
            }
            for index in indices {
                inner.chunks.remove(index);
            }
            Ok(())
        })
    }
}
