//! Text-completion seam.
//!
//! The [`Generator`] trait is the only place the pipeline talks to a
//! language model. Backends (llama.cpp server, Ollama, OpenAI-compatible
//! completions) live in the app crate.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default completion budget in tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 250;

/// Default sampling temperature: mostly deterministic.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Decoding parameters passed with every completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Strings at which the engine should stop generating.
    #[serde(default)]
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            stop: vec!["[/ASSISTANT]".to_string(), "</s>".to_string()],
        }
    }
}

/// A text-completion engine returning its single best completion.
///
/// Failures are surfaced as-is; the pipeline never retries a generation.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Backend identifier used in logs and `/health`.
    fn name(&self) -> &str;

    /// Complete `prompt` under `params`, returning the raw completion text.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Whether several `generate` calls may be in flight at once.
    ///
    /// When `false` the answer policy admits one generation at a time.
    fn supports_concurrent_calls(&self) -> bool {
        false
    }
}
