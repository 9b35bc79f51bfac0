//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that every query-embedding backend
//! implements, plus pure helpers for normalization, similarity, and the
//! little-endian `f32` byte encoding used by the knowledge-base formats.
//!
//! Concrete embedders (fastembed, Ollama, OpenAI) live in the `exam-rag`
//! app crate.

use anyhow::Result;
use async_trait::async_trait;

/// A sentence-embedding model that turns a query into a vector.
///
/// Implementations must return vectors of exactly [`dims`](Embedder::dims)
/// elements. The retriever normalizes whatever comes back, so callers need
/// not pre-normalize.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Scale a vector to unit L2 norm in place.
///
/// Zero vectors are left untouched.
pub fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return;
    }
    for v in vec.iter_mut() {
        *v /= norm;
    }
}

/// Dot product of two equal-length vectors.
///
/// Equals cosine similarity when both inputs are unit-normalized. Returns
/// `0.0` when lengths differ.
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Encode a float vector as little-endian `f32` bytes.
///
/// # Example
///
/// ```rust
/// use exam_rag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian `f32` bytes back into a vector.
///
/// Trailing bytes that do not form a whole `f32` are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_inner_product_identical_unit() {
        let mut v = vec![1.0, 2.0, 3.0];
        normalize(&mut v);
        assert!((inner_product(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_inner_product_orthogonal() {
        assert!(inner_product(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_inner_product_different_lengths() {
        assert_eq!(inner_product(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_blob_ignores_trailing_bytes() {
        let mut blob = vec_to_blob(&[0.5, -1.0]);
        blob.push(0xFF);
        assert_eq!(blob_to_vec(&blob), vec![0.5, -1.0]);
    }
}
