//! # catlog-core
//!
//! Pure domain layer for the CatLog personal ledger tracker.
//!
//! This crate holds everything that can be computed without touching the
//! network or the filesystem:
//!
//! - The [`ledger`] module defines the [`Ledger`] aggregate (asset
//!   snapshots, monthly incomes and expenses, per-day memos, and the
//!   retirement-planning settings) together with its mutation surface.
//!   The ledger is a value type: callers build a new ledger for every
//!   change and hand it to the persistence layer wholesale.
//! - The [`chunk`] module implements the lossless split/join codec that
//!   turns a serialized ledger into fixed-size ordered fragments small
//!   enough for a document store with a per-document size ceiling.
//! - The [`stats`] module derives every view-model statistic from a ledger
//!   snapshot: monthly rollups with carry-forward asset totals, yearly
//!   trends, FIRE (financial-independence) targets, and date-range reports.
//!
//! The companion crate `catlog-store` owns durability: it serializes a
//! ledger, feeds it through [`chunk`], and writes the fragments to an
//! ordered document collection.

pub mod chunk;
pub mod ledger;
pub mod stats;

pub use chunk::{Chunk, EncodingError, DEFAULT_CHUNK_SIZE};
pub use ledger::{
    AssetEntry, AssetKind, ExpenseEntry, FireSettings, IncomeMonth, IncomeSource, Ledger,
    YearMonth,
};
