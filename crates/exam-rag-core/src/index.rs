//! Embedding index abstraction and the exact inner-product index.
//!
//! [`EmbeddingIndex::search`] mirrors the classic nearest-neighbor index
//! contract: it returns at most `k` `(score, id)` slots ordered by descending
//! score. A slot may carry [`NO_MATCH`] when the index has nothing to put
//! there. Callers filter the sentinel before touching the passage store.
//!
//! # File Format
//!
//! [`FlatIndex::to_bytes`] / [`FlatIndex::from_bytes`] use a small
//! little-endian layout:
//!
//! ```text
//! offset  size          field
//! 0       4             magic "EXIX"
//! 4       4             version (u32, = 1)
//! 8       4             dims (u32)
//! 12      8             count (u64)
//! 20      count×dims×4  vectors (f32), row-major
//! ```

use anyhow::{bail, Result};

use crate::embedding::{blob_to_vec, inner_product, vec_to_blob};

/// Id reported for an empty result slot.
pub const NO_MATCH: i64 = -1;

const MAGIC: &[u8; 4] = b"EXIX";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 20;

/// Parallel score/id arrays returned by a search, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits {
    pub scores: Vec<f32>,
    pub ids: Vec<i64>,
}

impl SearchHits {
    /// Iterate `(id, score)` pairs in rank order, sentinel slots included.
    pub fn iter(&self) -> impl Iterator<Item = (i64, f32)> + '_ {
        self.ids.iter().copied().zip(self.scores.iter().copied())
    }
}

/// A read-only nearest-neighbor index over passage embeddings.
///
/// Implementations must be immutable after construction so concurrent
/// searches need no locking.
pub trait EmbeddingIndex: Send + Sync {
    /// Vector dimensionality.
    fn dims(&self) -> usize;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the `k` most similar vectors to `query` by inner product.
    ///
    /// The result has at most `k` slots and never more than [`len`](Self::len);
    /// unused slots carry [`NO_MATCH`]. Fails if `query` has the wrong
    /// dimension.
    fn search(&self, query: &[f32], k: usize) -> Result<SearchHits>;
}

/// Exact (brute-force) inner-product index held in one contiguous buffer.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dims: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build from a row-major buffer of `count × dims` floats.
    pub fn new(dims: usize, data: Vec<f32>) -> Result<Self> {
        if dims == 0 {
            bail!("index dims must be > 0");
        }
        if data.len() % dims != 0 {
            bail!(
                "index buffer length {} is not a multiple of dims {}",
                data.len(),
                dims
            );
        }
        Ok(Self { dims, data })
    }

    /// Build from one vector per row. All rows must share a length.
    pub fn from_vectors(dims: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut data = Vec::with_capacity(vectors.len() * dims);
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dims {
                bail!("vector {} has {} dims, expected {}", i, v.len(), dims);
            }
            data.extend_from_slice(v);
        }
        Self::new(dims, data)
    }

    /// The stored vector at `id`, if in range.
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dims)?;
        let end = start.checked_add(self.dims)?;
        self.data.get(start..end)
    }

    /// Serialize to the `EXIX` file layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&(self.dims as u32).to_le_bytes());
        out.extend_from_slice(&(self.len() as u64).to_le_bytes());
        out.extend_from_slice(&vec_to_blob(&self.data));
        out
    }

    /// Parse the `EXIX` file layout.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            bail!("index file too short: {} bytes", bytes.len());
        }
        if &bytes[0..4] != MAGIC {
            bail!("index file has bad magic (expected EXIX)");
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != VERSION {
            bail!("unsupported index version {}", version);
        }
        let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&bytes[12..20]);
        let count = u64::from_le_bytes(count_bytes) as usize;

        let expected = count
            .checked_mul(dims)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| anyhow::anyhow!("index header overflows: {} × {}", count, dims))?;
        let body = &bytes[HEADER_LEN..];
        if body.len() != expected {
            bail!(
                "index body is {} bytes, header declares {} vectors × {} dims ({} bytes)",
                body.len(),
                count,
                dims,
                expected
            );
        }

        Self::new(dims, blob_to_vec(body))
    }
}

impl EmbeddingIndex for FlatIndex {
    fn dims(&self) -> usize {
        self.dims
    }

    fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    fn search(&self, query: &[f32], k: usize) -> Result<SearchHits> {
        if query.len() != self.dims {
            bail!(
                "query has {} dims, index has {}",
                query.len(),
                self.dims
            );
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dims)
            .enumerate()
            .map(|(id, row)| (id, inner_product(query, row)))
            .collect();

        // Caller-supplied k is untrusted; never size anything past the index.
        let k = k.min(scored.len());

        // Descending score, lower id first on ties.
        let by_rank = |a: &(usize, f32), b: &(usize, f32)| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0));
        if k < scored.len() && k > 0 {
            scored.select_nth_unstable_by(k - 1, by_rank);
        }
        scored.truncate(k);
        scored.sort_by(by_rank);

        let mut hits = SearchHits {
            scores: Vec::with_capacity(k),
            ids: Vec::with_capacity(k),
        };
        for (id, score) in scored {
            hits.ids.push(id as i64);
            hits.scores.push(score);
        }
        Ok(hits)
    }
}
