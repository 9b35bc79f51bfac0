//! Completion backends.
//!
//! Concrete implementations of the core [`Generator`] trait:
//! - **[`LlamaCppGenerator`]** — llama.cpp server, `POST /completion`.
//! - **[`OllamaGenerator`]** — Ollama, `POST /api/generate` in raw mode.
//! - **[`OpenAICompletionsGenerator`]** — any OpenAI-compatible
//!   `POST /v1/completions` endpoint.
//! - **[`DisabledGenerator`]** — always errors.
//!
//! Generators never retry: a failed or timed-out request is reported to the
//! caller as-is.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use exam_rag_core::generate::{GenerationParams, Generator};

use crate::config::GeneratorConfig;

/// Create the [`Generator`] named by `config.provider`.
pub fn create_generator(config: &GeneratorConfig) -> Result<Arc<dyn Generator>> {
    let concurrent = !config.serialize;
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "llamacpp" => Ok(Arc::new(LlamaCppGenerator::new(config, concurrent)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config, concurrent)?)),
        "openai" => Ok(Arc::new(OpenAICompletionsGenerator::new(config, concurrent)?)),
        other => bail!("Unknown generator provider: {}", other),
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// POST a JSON body and decode the JSON reply. Non-2xx is an error.
async fn post_json<Req, Resp>(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &Req,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let mut request = client.post(url).json(body);
    if let Some(key) = bearer {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to call completion endpoint {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Completion endpoint returned {}: {}", status, body_text);
    }

    response
        .json()
        .await
        .with_context(|| "Failed to decode completion response")
}

// ============ Disabled ============

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        bail!("Generator is disabled")
    }
}

// ============ llama.cpp server ============

/// Talks to a llama.cpp `server` process.
pub struct LlamaCppGenerator {
    url: String,
    client: reqwest::Client,
    concurrent: bool,
}

#[derive(Debug, Serialize)]
struct LlamaCppRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    stop: &'a [String],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct LlamaCppResponse {
    content: String,
}

impl LlamaCppGenerator {
    pub fn new(config: &GeneratorConfig, concurrent: bool) -> Result<Self> {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://127.0.0.1:8080".to_string());
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client: build_client(config.timeout_secs)?,
            concurrent,
        })
    }
}

#[async_trait]
impl Generator for LlamaCppGenerator {
    fn name(&self) -> &str {
        "llamacpp"
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let req = LlamaCppRequest {
            prompt,
            n_predict: params.max_tokens,
            temperature: params.temperature,
            stop: &params.stop,
            stream: false,
        };
        let resp: LlamaCppResponse =
            post_json(&self.client, &format!("{}/completion", self.url), None, &req).await?;
        Ok(resp.content)
    }

    fn supports_concurrent_calls(&self) -> bool {
        self.concurrent
    }
}

// ============ Ollama ============

/// Ollama `/api/generate` in raw mode, so the prompt template is sent verbatim.
pub struct OllamaGenerator {
    url: String,
    model: String,
    client: reqwest::Client,
    concurrent: bool,
}

#[derive(Debug, Serialize)]
struct OllamaOptions<'a> {
    num_predict: u32,
    temperature: f32,
    stop: &'a [String],
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    raw: bool,
    options: OllamaOptions<'a>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig, concurrent: bool) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generator.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            model,
            client: build_client(config.timeout_secs)?,
            concurrent,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let req = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            raw: true,
            options: OllamaOptions {
                num_predict: params.max_tokens,
                temperature: params.temperature,
                stop: &params.stop,
            },
        };
        let resp: OllamaResponse =
            post_json(&self.client, &format!("{}/api/generate", self.url), None, &req).await?;
        Ok(resp.response)
    }

    fn supports_concurrent_calls(&self) -> bool {
        self.concurrent
    }
}

// ============ OpenAI-compatible completions ============

/// Any server exposing the legacy `/v1/completions` API (vLLM, llama.cpp's
/// OpenAI shim, OpenAI itself).
pub struct OpenAICompletionsGenerator {
    url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    concurrent: bool,
}

#[derive(Debug, Serialize)]
struct CompletionsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "no_stop")]
    stop: &'a [String],
}

fn no_stop(stop: &&[String]) -> bool {
    stop.is_empty()
}

#[derive(Debug, Deserialize)]
struct CompletionsChoice {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CompletionsResponse {
    choices: Vec<CompletionsChoice>,
}

impl OpenAICompletionsGenerator {
    /// # Errors
    ///
    /// Fails when `model` is missing, or when `api_key_env` names a variable
    /// that is not set.
    pub fn new(config: &GeneratorConfig, concurrent: bool) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generator.model required for OpenAI provider"))?;
        let api_key = match &config.api_key_env {
            Some(var) => Some(
                std::env::var(var)
                    .map_err(|_| anyhow::anyhow!("{} environment variable not set", var))?,
            ),
            None => None,
        };
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            model,
            api_key,
            client: build_client(config.timeout_secs)?,
            concurrent,
        })
    }
}

#[async_trait]
impl Generator for OpenAICompletionsGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let req = CompletionsRequest {
            model: &self.model,
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stop: &params.stop,
        };
        let resp: CompletionsResponse = post_json(
            &self.client,
            &format!("{}/v1/completions", self.url),
            self.api_key.as_deref(),
            &req,
        )
        .await?;

        resp.choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| anyhow::anyhow!("Completion response had no choices"))
    }

    fn supports_concurrent_calls(&self) -> bool {
        self.concurrent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llamacpp_request_shape() {
        let stop = vec!["</s>".to_string()];
        let req = LlamaCppRequest {
            prompt: "p",
            n_predict: 250,
            temperature: 0.2,
            stop: &stop,
            stream: false,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["n_predict"], 250);
        assert_eq!(json["stop"][0], "</s>");
    }

    #[test]
    fn test_ollama_request_is_raw() {
        let req = OllamaRequest {
            model: "mistral",
            prompt: "p",
            stream: false,
            raw: true,
            options: OllamaOptions {
                num_predict: 10,
                temperature: 0.0,
                stop: &[],
            },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["raw"], true);
        assert_eq!(json["options"]["num_predict"], 10);
    }

    #[test]
    fn test_completions_request_omits_empty_stop() {
        let req = CompletionsRequest {
            model: "m",
            prompt: "p",
            max_tokens: 5,
            temperature: 0.2,
            stop: &[],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("stop").is_none());
    }

    #[test]
    fn test_create_generator_serialize_flag() {
        let mut config = GeneratorConfig::default();
        assert!(!create_generator(&config).unwrap().supports_concurrent_calls());
        config.serialize = false;
        assert!(create_generator(&config).unwrap().supports_concurrent_calls());
    }

    #[test]
    fn test_ollama_requires_model() {
        let config = GeneratorConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        };
        assert!(create_generator(&config).is_err());
    }

    #[tokio::test]
    async fn test_disabled_generator_errors() {
        let generator = DisabledGenerator;
        assert!(generator
            .generate("p", &GenerationParams::default())
            .await
            .is_err());
    }
}
