//! Query embedding providers.
//!
//! Concrete implementations of the core [`Embedder`] trait:
//! - **[`DisabledEmbedder`]** — returns errors; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]** — calls the OpenAI embeddings API with retry and backoff.
//! - **[`OllamaEmbedder`]** — calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalEmbedder`** — runs a sentence-transformer in-process via fastembed;
//!   no network calls after the first model download.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the provider named in `[embedding]`.
//! The local model is loaded once here and reused for every query.
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use exam_rag_core::embedding::Embedder;

use crate::config::EmbeddingConfig;

/// Default local model; 384-dimensional sentence embeddings.
pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (requires the `local-embeddings` feature) |
pub async fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder::new(config.dims.unwrap_or(0)))),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::load(config).await?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Disabled Provider ============

/// An embedder that always fails.
///
/// With `embedding.provider = "disabled"` the knowledge base still loads
/// and `/health` still answers, but every retrieval reports the knowledge
/// base as unavailable. `dims` mirrors the index so the retriever accepts it.
pub struct DisabledEmbedder {
    dims: usize,
}

impl DisabledEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Shared HTTP retry ============

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// POST `body` to `url`, retrying rate limits, server errors, and network
/// failures with exponential backoff.
async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(attempt, ?delay, "{} embedding retry", label);
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        label,
                        status,
                        body_text
                    ));
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} connection error ({}): {}", label, url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} embedding failed after retries", label)))
}

fn first_embedding(mut vectors: Vec<Vec<f32>>, dims: usize) -> Result<Vec<f32>> {
    if vectors.is_empty() {
        bail!("Empty embedding response");
    }
    let vec = vectors.swap_remove(0);
    if vec.len() != dims {
        bail!(
            "Embedding dimension mismatch: expected {}, got {}",
            dims,
            vec.len()
        );
    }
    Ok(vec)
}

// ============ OpenAI Provider ============

/// Embedder using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAIEmbedder {
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config,
    /// or if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());

        Ok(Self {
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
            client: build_client(config.timeout_secs)?,
            endpoint: format!("{}/v1/embeddings", base.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = post_json_with_retry(
            &self.client,
            &self.endpoint,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        first_embedding(parse_openai_response(&json)?, self.dims)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays, ordered by their `index` field.
pub(crate) fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedder using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default:
/// `http://localhost:11434`). Requires an embedding model pulled into
/// Ollama (e.g. `ollama pull all-minilm`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client: build_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/api/embed", self.url),
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        first_embedding(parse_ollama_response(&json)?, self.dims)
    }
}

pub(crate) fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

// ============ Local Provider (fastembed) ============

/// Resolve the local model name and its dimensionality.
pub fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        _ => 384,
    });

    (model_name, dims)
}

/// In-process sentence embedder.
///
/// The model is downloaded from Hugging Face on first use and cached; after
/// that embeddings run entirely offline.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
             multilingual-e5-small, multilingual-e5-base",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    /// Load (downloading if needed) the configured model.
    pub async fn load(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        let fastembed_model = config_to_fastembed_model(&model_name)?;

        tracing::info!(model = %model_name, dims, "loading local embedding model");
        let model = tokio::task::spawn_blocking(move || {
            fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))
        })
        .await??;

        Ok(Self {
            model_name,
            dims,
            model: Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let texts = vec![text.to_string()];

        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow::anyhow!("Local embedding model lock poisoned"))?;
            model
                .embed(texts, None)
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
        })
        .await??;

        first_embedding(vectors, self.dims)
    }
}
