//! Passage store abstraction.
//!
//! The [`PassageStore`] trait exposes the textbook chunks by the same
//! integer ids the [`EmbeddingIndex`](crate::index::EmbeddingIndex) returns.
//! Stores are loaded once and never mutated, so lookups take no locks.

pub mod memory;

use crate::models::Chunk;

pub use memory::InMemoryPassageStore;

/// Read-only, id-addressable collection of chunks.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](PassageStore::get) | Look up a chunk by index position |
/// | [`len`](PassageStore::len) | Number of chunks |
/// | [`chunks`](PassageStore::chunks) | All chunks in id order |
pub trait PassageStore: Send + Sync {
    /// The chunk at `id`, or `None` when out of range.
    fn get(&self, id: usize) -> Option<&Chunk>;

    /// Number of stored chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All chunks in id order.
    fn chunks(&self) -> &[Chunk];
}
