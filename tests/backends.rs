//! HTTP backend tests against mock servers.

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use exam_rag::config::{EmbeddingConfig, GeneratorConfig};
use exam_rag::embedding::create_embedder;
use exam_rag::generator::create_generator;
use exam_rag_core::generate::GenerationParams;

fn generator_config(provider: &str, url: &str) -> GeneratorConfig {
    GeneratorConfig {
        provider: provider.to_string(),
        url: Some(url.to_string()),
        model: Some("mistral".to_string()),
        ..Default::default()
    }
}

fn ollama_embedding_config(url: &str) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "ollama".to_string(),
        model: Some("all-minilm".to_string()),
        dims: Some(3),
        url: Some(url.to_string()),
        max_retries: 1,
        ..Default::default()
    }
}

// ─── Generators ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_llamacpp_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completion"))
        .and(body_partial_json(json!({
            "prompt": "PROMPT",
            "n_predict": 250,
            "stop": ["[/ASSISTANT]", "</s>"],
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "📘 Book Answer: x" })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = create_generator(&generator_config("llamacpp", &server.uri())).unwrap();
    let text = generator
        .generate("PROMPT", &GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(text, "📘 Book Answer: x");
}

#[tokio::test]
async fn test_llamacpp_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completion"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .expect(1)
        .mount(&server)
        .await;

    let generator = create_generator(&generator_config("llamacpp", &server.uri())).unwrap();
    let err = generator
        .generate("PROMPT", &GenerationParams::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"));
    assert!(err.to_string().contains("model crashed"));
}

#[tokio::test]
async fn test_generator_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completion"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "content": "late" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = generator_config("llamacpp", &server.uri());
    config.timeout_secs = 1;
    let generator = create_generator(&config).unwrap();
    assert!(generator
        .generate("PROMPT", &GenerationParams::default())
        .await
        .is_err());
}

#[tokio::test]
async fn test_ollama_generate_raw() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "mistral",
            "prompt": "PROMPT",
            "stream": false,
            "raw": true,
            "options": { "num_predict": 250 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "answer", "done": true })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = create_generator(&generator_config("ollama", &server.uri())).unwrap();
    let text = generator
        .generate("PROMPT", &GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(text, "answer");
}

#[tokio::test]
async fn test_openai_completions_with_key() {
    std::env::set_var("EXAM_TEST_COMPLETIONS_KEY", "sk-test");

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "mistral", "max_tokens": 250 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "text": "first", "index": 0 }, { "text": "second", "index": 1 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = generator_config("openai", &server.uri());
    config.api_key_env = Some("EXAM_TEST_COMPLETIONS_KEY".to_string());
    let generator = create_generator(&config).unwrap();
    let text = generator
        .generate("PROMPT", &GenerationParams::default())
        .await
        .unwrap();
    assert_eq!(text, "first");
}

#[tokio::test]
async fn test_openai_completions_no_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let generator = create_generator(&generator_config("openai", &server.uri())).unwrap();
    let err = generator
        .generate("PROMPT", &GenerationParams::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no choices"));
}

#[tokio::test]
async fn test_malformed_completion_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/completion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "wrong field" })))
        .mount(&server)
        .await;

    let generator = create_generator(&generator_config("llamacpp", &server.uri())).unwrap();
    let err = generator
        .generate("PROMPT", &GenerationParams::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("decode"));
}

// ─── Embedders ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_ollama_embedder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "all-minilm", "input": ["What is a cell?"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.1, 0.2, 0.3]] })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = create_embedder(&ollama_embedding_config(&server.uri()))
        .await
        .unwrap();
    assert_eq!(embedder.dims(), 3);
    let vec = embedder.embed_query("What is a cell?").await.unwrap();
    assert_eq!(vec, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn test_ollama_embedder_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0, 0.0, 0.0]] })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = create_embedder(&ollama_embedding_config(&server.uri()))
        .await
        .unwrap();
    let vec = embedder.embed_query("q").await.unwrap();
    assert_eq!(vec, vec![1.0, 0.0, 0.0]);
}

#[tokio::test]
async fn test_ollama_embedder_client_error_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = create_embedder(&ollama_embedding_config(&server.uri()))
        .await
        .unwrap();
    let err = embedder.embed_query("q").await.unwrap_err();
    assert!(err.to_string().contains("model not found"));
}

#[tokio::test]
async fn test_ollama_embedder_dimension_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0, 0.0]] })))
        .mount(&server)
        .await;

    let embedder = create_embedder(&ollama_embedding_config(&server.uri()))
        .await
        .unwrap();
    let err = embedder.embed_query("q").await.unwrap_err();
    assert!(err.to_string().contains("dimension mismatch"));
}
