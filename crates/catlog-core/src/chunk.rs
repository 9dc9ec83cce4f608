//! Lossless split/join codec for serialized ledgers.
//!
//! The backing document store caps individual document size, so a serialized
//! ledger is persisted as an ordered sequence of fixed-size fragments. This
//! module owns the deterministic split and the exact inverse join:
//!
//! - [`split`] cuts a serialized ledger into fragments of exactly
//!   [`DEFAULT_CHUNK_SIZE`] characters (the last fragment may be shorter),
//!   indexed by 0-based position.
//! - [`join`] sorts fragments by index and concatenates their contents,
//!   reproducing the input byte-for-byte. It does not validate JSON — that
//!   is the reader's job.
//!
//! Fragments are measured in **characters**, never raw bytes, so a cut can
//! never land inside a multi-byte sequence. The default size sits well below
//! the backend's per-document ceiling to leave headroom for multi-byte
//! expansion when characters are stored as UTF-8.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default fragment length in characters.
///
/// Chosen conservatively under a 1 MiB per-document ceiling: a fragment of
/// 250 000 characters stays within bounds even if every character expands to
/// multiple bytes on the wire.
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(250_000) {
    Some(size) => size,
    None => unreachable!(),
};

/// One ordered fragment of a serialized ledger.
///
/// This is also the persisted document shape: one document per chunk, keyed
/// by `index`, in a collection scoped per ledger owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based position of this fragment.
    pub index: u32,

    /// Fragment content.
    pub content: String,
}

/// Malformed input to the codec. Non-retryable; indicates a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EncodingError {
    /// `split` was handed an empty payload. An empty ledger still has a
    /// defined minimal JSON form; callers must serialize that instead.
    #[error("cannot split an empty payload; serialize a default ledger instead")]
    EmptyPayload,
}

/// Splits `serialized` into ordered fragments of `chunk_size` characters.
///
/// Every fragment except possibly the last holds exactly `chunk_size`
/// characters; the last holds the remainder. Indices are assigned by
/// position starting at 0.
///
/// # Errors
///
/// Returns [`EncodingError::EmptyPayload`] when `serialized` is empty.
pub fn split(serialized: &str, chunk_size: NonZeroUsize) -> Result<Vec<Chunk>, EncodingError> {
    if serialized.is_empty() {
        return Err(EncodingError::EmptyPayload);
    }

    let mut chunks = Vec::new();
    let mut rest = serialized;
    while !rest.is_empty() {
        let cut = rest
            .char_indices()
            .nth(chunk_size.get())
            .map_or(rest.len(), |(byte_offset, _)| byte_offset);
        let (head, tail) = rest.split_at(cut);
        chunks.push(Chunk {
            index: u32::try_from(chunks.len()).expect("chunk count exceeds u32"),
            content: head.to_string(),
        });
        rest = tail;
    }
    Ok(chunks)
}

/// Joins fragments back into the serialized form.
///
/// Fragments are sorted by `index` first, so callers holding an unordered
/// set reconstruct correctly; duplicate indices keep their relative order.
/// Joining the output of [`split`] reproduces the input exactly.
#[must_use]
pub fn join(mut chunks: Vec<Chunk>) -> String {
    chunks.sort_by_key(|chunk| chunk.index);
    chunks.iter().map(|chunk| chunk.content.as_str()).collect()
}
