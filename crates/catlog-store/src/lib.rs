//! # catlog-store
//!
//! Durable storage and sync orchestration for CatLog ledgers.
//!
//! A ledger has no on-disk representation of its own: it lives in memory and
//! is reconstructed on every load from an ordered collection of fixed-size
//! chunk documents. This crate owns the full persistence protocol:
//!
//! - The [`backend`] module defines the minimal ordered document-collection
//!   contract ([`backend::ChunkCollection`]) the store needs (idempotent
//!   per-index upsert, index-ordered listing, batch delete), plus an
//!   in-memory implementation with fault injection for tests.
//! - The [`store`] module implements [`store::ChunkStore`]: sequential
//!   chunk writes with monotonic progress reporting, stale-tail
//!   reconciliation after every save, and tail-trim recovery when a read
//!   joins to unparseable JSON.
//! - The [`orchestrator`] module implements [`orchestrator::SyncOrchestrator`],
//!   the single authoritative owner of the in-memory ledger: it applies
//!   mutations as whole-value replacement, notifies the UI through an
//!   explicit change callback, and sequences one persist cycle per mutation.
//!
//! Everything here is runtime-agnostic async: backends expose object-safe
//! futures via the [`backend::BoxFuture`] alias and the caller awaits each
//! operation sequentially. Write ordering is contractual, never an artifact
//! of the runtime.

pub mod backend;
pub mod orchestrator;
pub mod store;

pub use backend::{BackendError, BoxFuture, ChunkCollection, MemoryCollection};
pub use orchestrator::{PersistOutcome, SyncError, SyncOrchestrator, SyncState};
pub use store::{ChunkStore, ReadOutcome, StoreError, WriteReport};
