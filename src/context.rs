//! Process-wide application state.
//!
//! [`AppContext`] is built once at startup and shared by every request
//! handler and CLI command. Nothing in it is mutable after construction.

use anyhow::Result;
use std::sync::Arc;

use exam_rag_core::embedding::Embedder;
use exam_rag_core::generate::Generator;
use exam_rag_core::retrieve::KnowledgeBase;
use exam_rag_core::{AnswerPolicy, Retriever};

use crate::config::Config;
use crate::embedding::{create_embedder, DisabledEmbedder};
use crate::generator::create_generator;
use crate::knowledge::load_knowledge_base;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub policy: Arc<AnswerPolicy>,
}

impl AppContext {
    /// Load the knowledge base, embedder, and generator named in `config`.
    ///
    /// Any failure here is fatal: the service does not start with a
    /// missing or inconsistent knowledge base.
    pub async fn init(config: Config) -> Result<Self> {
        let kb = load_knowledge_base(&config.knowledge_base).await?;

        let embedder: Arc<dyn Embedder> = if config.embedding.is_enabled() {
            create_embedder(&config.embedding).await?
        } else {
            tracing::warn!("embedding provider is disabled; every question will fail retrieval");
            Arc::new(DisabledEmbedder::new(kb.index().dims()))
        };
        let generator = create_generator(&config.generator)?;

        tracing::info!(
            embedding_model = embedder.model_name(),
            generator = generator.name(),
            serialized = !generator.supports_concurrent_calls(),
            "answer pipeline ready"
        );

        Self::from_parts(config, kb, embedder, generator)
    }

    /// Assemble a context from already-built components.
    pub fn from_parts(
        config: Config,
        kb: KnowledgeBase,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let retriever = Retriever::new(kb, embedder)?;
        let policy = AnswerPolicy::new(retriever, generator, config.policy_config());
        Ok(Self {
            config: Arc::new(config),
            policy: Arc::new(policy),
        })
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        self.policy.retriever().knowledge_base()
    }
}
