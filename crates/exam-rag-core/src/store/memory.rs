//! In-memory [`PassageStore`] backed by a `Vec`.
//!
//! Chunk ids equal their position in the vector, which is what lets the
//! index's integer ids address the store directly.

use anyhow::{bail, Result};

use crate::models::Chunk;

use super::PassageStore;

/// Vector-backed passage store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPassageStore {
    chunks: Vec<Chunk>,
}

impl InMemoryPassageStore {
    /// Build from `(text, source)` records, assigning ids by position.
    pub fn from_records<I, T, S>(records: I) -> Self
    where
        I: IntoIterator<Item = (T, S)>,
        T: Into<String>,
        S: Into<String>,
    {
        let chunks = records
            .into_iter()
            .enumerate()
            .map(|(id, (text, source))| Chunk {
                id,
                text: text.into(),
                source: source.into(),
            })
            .collect();
        Self { chunks }
    }

    /// Build from chunks that already carry ids.
    ///
    /// Fails unless the ids are exactly `0, 1, …, N-1` in order.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Result<Self> {
        for (pos, chunk) in chunks.iter().enumerate() {
            if chunk.id != pos {
                bail!(
                    "chunk ids must be contiguous from 0: found id {} at position {}",
                    chunk.id,
                    pos
                );
            }
        }
        Ok(Self { chunks })
    }
}

impl PassageStore for InMemoryPassageStore {
    fn get(&self, id: usize) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records_assigns_positions() {
        let store = InMemoryPassageStore::from_records(vec![
            ("first passage", "bio:1"),
            ("second passage", ""),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1).unwrap().id, 1);
        assert_eq!(store.get(0).unwrap().source, "bio:1");
        assert!(store.get(2).is_none());
    }

    #[test]
    fn test_from_chunks_rejects_gaps() {
        let chunks = vec![
            Chunk {
                id: 0,
                text: "a".into(),
                source: String::new(),
            },
            Chunk {
                id: 2,
                text: "b".into(),
                source: String::new(),
            },
        ];
        let err = InMemoryPassageStore::from_chunks(chunks).unwrap_err();
        assert!(err.to_string().contains("contiguous"));
    }

    #[test]
    fn test_empty_store() {
        let store = InMemoryPassageStore::default();
        assert!(store.is_empty());
        assert!(store.chunks().is_empty());
    }
}
