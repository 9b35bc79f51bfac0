//! Query retrieval: embed, search, join.
//!
//! # Algorithm
//!
//! 1. Reject blank queries and `top_k == 0`.
//! 2. Embed the query and scale it to unit length.
//! 3. Inner-product search for the top `top_k` ids, capping `top_k` at the
//!    index size.
//! 4. Drop [`NO_MATCH`] slots and ids outside the passage store.
//! 5. Join each surviving id with its chunk, keeping the index's order.

use std::sync::Arc;

use crate::embedding::{normalize, Embedder};
use crate::error::{RagError, Result};
use crate::index::{EmbeddingIndex, NO_MATCH};
use crate::models::RetrievalResult;
use crate::store::PassageStore;

/// Default number of passages fetched per question.
pub const DEFAULT_TOP_K: usize = 5;

/// The loaded knowledge base: an index and the store it addresses.
#[derive(Clone)]
pub struct KnowledgeBase {
    index: Arc<dyn EmbeddingIndex>,
    store: Arc<dyn PassageStore>,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase").finish_non_exhaustive()
    }
}

impl KnowledgeBase {
    /// Pair an index with its passage store.
    ///
    /// Fails with [`RagError::RetrievalUnavailable`] when either side is
    /// empty or their sizes disagree.
    pub fn new(index: Arc<dyn EmbeddingIndex>, store: Arc<dyn PassageStore>) -> Result<Self> {
        if index.is_empty() {
            return Err(RagError::RetrievalUnavailable(
                "embedding index is empty".to_string(),
            ));
        }
        if store.is_empty() {
            return Err(RagError::RetrievalUnavailable(
                "passage store is empty".to_string(),
            ));
        }
        if index.len() != store.len() {
            return Err(RagError::RetrievalUnavailable(format!(
                "index holds {} vectors but store holds {} chunks",
                index.len(),
                store.len()
            )));
        }
        Ok(Self { index, store })
    }

    pub fn index(&self) -> &dyn EmbeddingIndex {
        self.index.as_ref()
    }

    pub fn store(&self) -> &dyn PassageStore {
        self.store.as_ref()
    }
}

/// Turns a query string into ranked passages.
#[derive(Clone)]
pub struct Retriever {
    kb: KnowledgeBase,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    /// Fails when the embedder's dimensionality differs from the index's.
    pub fn new(kb: KnowledgeBase, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if embedder.dims() != kb.index().dims() {
            return Err(RagError::RetrievalUnavailable(format!(
                "embedder '{}' produces {} dims but index has {}",
                embedder.model_name(),
                embedder.dims(),
                kb.index().dims()
            )));
        }
        Ok(Self { kb, embedder })
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Fetch up to `top_k` passages most similar to `query`.
    ///
    /// Results are ordered by descending score. No state is modified, so
    /// repeated calls with the same query return the same results.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(RagError::InvalidRequest("top_k must be >= 1".to_string()));
        }

        let mut query_vec = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| RagError::RetrievalUnavailable(format!("query embedding failed: {:#}", e)))?;

        let index = self.kb.index();
        if query_vec.len() != index.dims() {
            return Err(RagError::RetrievalUnavailable(format!(
                "query embedding has {} dims, index has {}",
                query_vec.len(),
                index.dims()
            )));
        }
        normalize(&mut query_vec);

        // Asking for more than the index holds returns everything it holds.
        let top_k = top_k.min(index.len());
        let hits = index
            .search(&query_vec, top_k)
            .map_err(|e| RagError::RetrievalUnavailable(format!("index search failed: {:#}", e)))?;

        let store = self.kb.store();
        let mut results = Vec::with_capacity(top_k);
        for (id, score) in hits.iter() {
            if id == NO_MATCH {
                continue;
            }
            match usize::try_from(id).ok().and_then(|i| store.get(i)) {
                Some(chunk) => results.push(RetrievalResult::from_chunk(chunk, score)),
                None => tracing::warn!(id, "index returned id outside passage store"),
            }
        }

        tracing::debug!(top_k, returned = results.len(), "retrieval complete");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FlatIndex, SearchHits};
    use crate::store::InMemoryPassageStore;
    use async_trait::async_trait;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            self.0.len()
        }
        async fn embed_query(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_query(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("model not loaded")
        }
    }

    /// Index that reports ids the store does not have.
    struct StrayIndex;

    impl EmbeddingIndex for StrayIndex {
        fn dims(&self) -> usize {
            2
        }
        fn len(&self) -> usize {
            2
        }
        fn search(&self, _query: &[f32], _k: usize) -> anyhow::Result<SearchHits> {
            Ok(SearchHits {
                scores: vec![0.9, 0.8, 0.7, 0.1],
                ids: vec![1, 7, -1, 0],
            })
        }
    }

    fn store() -> Arc<InMemoryPassageStore> {
        Arc::new(InMemoryPassageStore::from_records(vec![
            ("east passage", "ch1"),
            ("north passage", "ch2"),
            ("north-east passage", "ch3"),
        ]))
    }

    fn kb() -> KnowledgeBase {
        let index = FlatIndex::from_vectors(
            2,
            &[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7071, 0.7071]],
        )
        .unwrap();
        KnowledgeBase::new(Arc::new(index), store()).unwrap()
    }

    #[tokio::test]
    async fn test_retrieve_ranks_and_joins() {
        let retriever = Retriever::new(kb(), Arc::new(FixedEmbedder(vec![0.0, 2.0]))).unwrap();
        let results = retriever.retrieve("north?", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_id, 1);
        assert_eq!(results[0].source, "ch2");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert_eq!(results[1].chunk_id, 2);
    }

    #[tokio::test]
    async fn test_retrieve_top_k_beyond_index() {
        let retriever = Retriever::new(kb(), Arc::new(FixedEmbedder(vec![1.0, 0.0]))).unwrap();
        let results = retriever.retrieve("east", 10).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_retrieve_huge_top_k_returns_whole_index() {
        let retriever = Retriever::new(kb(), Arc::new(FixedEmbedder(vec![1.0, 0.0]))).unwrap();
        for top_k in [1usize << 40, usize::MAX / 2, usize::MAX] {
            let ids: Vec<usize> = retriever
                .retrieve("east", top_k)
                .await
                .unwrap()
                .iter()
                .map(|r| r.chunk_id)
                .collect();
            assert_eq!(ids, vec![0, 2, 1]);
        }
    }

    #[tokio::test]
    async fn test_retrieve_filters_out_of_range_ids() {
        let store = Arc::new(InMemoryPassageStore::from_records(vec![
            ("zero", ""),
            ("one", ""),
        ]));
        let kb = KnowledgeBase::new(Arc::new(StrayIndex), store).unwrap();
        let retriever = Retriever::new(kb, Arc::new(FixedEmbedder(vec![1.0, 0.0]))).unwrap();
        let ids: Vec<usize> = retriever
            .retrieve("q", 4)
            .await
            .unwrap()
            .iter()
            .map(|r| r.chunk_id)
            .collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[tokio::test]
    async fn test_retrieve_is_repeatable() {
        let retriever = Retriever::new(kb(), Arc::new(FixedEmbedder(vec![0.3, 0.9]))).unwrap();
        let first = retriever.retrieve("same", 3).await.unwrap();
        let second = retriever.retrieve("same", 3).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_retrieve_rejects_blank_query_and_zero_k() {
        let retriever = Retriever::new(kb(), Arc::new(FixedEmbedder(vec![1.0, 0.0]))).unwrap();
        assert!(matches!(
            retriever.retrieve("   ", 5).await,
            Err(RagError::InvalidRequest(_))
        ));
        assert!(matches!(
            retriever.retrieve("q", 0).await,
            Err(RagError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_unavailable() {
        let retriever = Retriever::new(kb(), Arc::new(FailingEmbedder)).unwrap();
        let err = retriever.retrieve("q", 5).await.unwrap_err();
        assert!(matches!(err, RagError::RetrievalUnavailable(_)));
        assert!(err.to_string().contains("model not loaded"));
    }

    #[test]
    fn test_dims_mismatch_rejected() {
        let result = Retriever::new(kb(), Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])));
        assert!(matches!(result, Err(RagError::RetrievalUnavailable(_))));
    }

    #[test]
    fn test_empty_knowledge_base_rejected() {
        let index = FlatIndex::new(2, Vec::new()).unwrap();
        let result = KnowledgeBase::new(Arc::new(index), store());
        assert!(matches!(result, Err(RagError::RetrievalUnavailable(_))));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let index = FlatIndex::from_vectors(2, &[vec![1.0, 0.0]]).unwrap();
        let result = KnowledgeBase::new(Arc::new(index), store());
        assert!(matches!(result, Err(RagError::RetrievalUnavailable(_))));
    }
}
