//! TOML configuration parsing and validation.
//!
//! A minimal config only needs the knowledge base location:
//!
//! ```toml
//! [knowledge_base]
//! format = "files"
//! chunks_path = "rag_store/chunks.json"
//! index_path = "rag_store/index.bin"
//! ```
//!
//! Every other section falls back to defaults: local `all-minilm-l6-v2`
//! embeddings, a llama.cpp server on `127.0.0.1:8080`, and the standard
//! refusal thresholds.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use exam_rag_core::generate::GenerationParams;
use exam_rag_core::PolicyConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub policy: PolicySettings,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    /// `"files"` (chunk JSON + flat index) or `"sqlite"`.
    #[serde(default = "default_kb_format")]
    pub format: String,
    #[serde(default)]
    pub chunks_path: Option<PathBuf>,
    #[serde(default)]
    pub index_path: Option<PathBuf>,
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

fn default_kb_format() -> String {
    "files".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Name of the environment variable holding a bearer key (openai only).
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_stop")]
    pub stop: Vec<String>,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
    /// Admit one generation at a time.
    #[serde(default = "default_serialize")]
    pub serialize: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_generator_provider(),
            url: None,
            model: None,
            api_key_env: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            stop: default_stop(),
            timeout_secs: default_generator_timeout_secs(),
            serialize: default_serialize(),
        }
    }
}

fn default_generator_provider() -> String {
    "llamacpp".to_string()
}
/// Upper bound on `generator.max_tokens`.
pub const MAX_GENERATION_TOKENS: u32 = 2048;

fn default_max_tokens() -> u32 {
    GenerationParams::default().max_tokens
}
fn default_temperature() -> f32 {
    GenerationParams::default().temperature
}
fn default_stop() -> Vec<String> {
    GenerationParams::default().stop
}
fn default_generator_timeout_secs() -> u64 {
    120
}
fn default_serialize() -> bool {
    true
}

impl GeneratorConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop: self.stop.clone(),
        }
    }
}

/// The `[policy]` section: refusal thresholds and evidence budget.
#[derive(Debug, Deserialize, Clone)]
pub struct PolicySettings {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_evidence_chars")]
    pub max_evidence_chars: usize,
    #[serde(default = "default_min_passage_chars")]
    pub min_passage_chars: usize,
    #[serde(default = "default_min_evidence_chars")]
    pub min_evidence_chars: usize,
    #[serde(default = "default_max_question_marks")]
    pub max_question_marks: usize,
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_evidence_chars: default_max_evidence_chars(),
            min_passage_chars: default_min_passage_chars(),
            min_evidence_chars: default_min_evidence_chars(),
            max_question_marks: default_max_question_marks(),
            min_score: None,
        }
    }
}

fn default_top_k() -> usize {
    PolicyConfig::default().top_k
}
fn default_max_evidence_chars() -> usize {
    PolicyConfig::default().max_evidence_chars
}
fn default_min_passage_chars() -> usize {
    PolicyConfig::default().min_passage_chars
}
fn default_min_evidence_chars() -> usize {
    PolicyConfig::default().min_evidence_chars
}
fn default_max_question_marks() -> usize {
    PolicyConfig::default().max_question_marks
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Environment variable holding the shared secret for `/protected/ask`.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_api_key_env() -> String {
    "EXAM_API_KEY".to_string()
}

impl Config {
    /// Combine `[policy]` and `[generator]` into the core policy settings.
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            top_k: self.policy.top_k,
            max_evidence_chars: self.policy.max_evidence_chars,
            min_passage_chars: self.policy.min_passage_chars,
            min_evidence_chars: self.policy.min_evidence_chars,
            max_question_marks: self.policy.max_question_marks,
            min_score: self.policy.min_score,
            generation: self.generator.params(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a TOML config string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate knowledge base
    match config.knowledge_base.format.as_str() {
        "files" => {
            if config.knowledge_base.chunks_path.is_none() {
                bail!("knowledge_base.chunks_path is required when format is 'files'");
            }
            if config.knowledge_base.index_path.is_none() {
                bail!("knowledge_base.index_path is required when format is 'files'");
            }
        }
        "sqlite" => {
            if config.knowledge_base.sqlite_path.is_none() {
                bail!("knowledge_base.sqlite_path is required when format is 'sqlite'");
            }
        }
        other => bail!(
            "Unknown knowledge_base.format: '{}'. Must be files or sqlite.",
            other
        ),
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, ollama, or openai.",
            other
        ),
    }

    // Validate generator
    match config.generator.provider.as_str() {
        "disabled" | "llamacpp" => {}
        "ollama" | "openai" => {
            if config.generator.model.is_none() {
                bail!(
                    "generator.model must be specified when provider is '{}'",
                    config.generator.provider
                );
            }
        }
        other => bail!(
            "Unknown generator provider: '{}'. Must be disabled, llamacpp, ollama, or openai.",
            other
        ),
    }
    if config.generator.max_tokens == 0 {
        bail!("generator.max_tokens must be > 0");
    }
    if config.generator.max_tokens > MAX_GENERATION_TOKENS {
        bail!(
            "generator.max_tokens must be <= {}",
            MAX_GENERATION_TOKENS
        );
    }
    if !(0.0..=2.0).contains(&config.generator.temperature) {
        bail!("generator.temperature must be in [0.0, 2.0]");
    }

    // Validate policy
    if config.policy.top_k < 1 {
        bail!("policy.top_k must be >= 1");
    }
    if config.policy.max_evidence_chars < config.policy.min_evidence_chars {
        bail!("policy.max_evidence_chars must be >= policy.min_evidence_chars");
    }
    if config.policy.max_question_marks < 1 {
        bail!("policy.max_question_marks must be >= 1");
    }

    Ok(config)
}
