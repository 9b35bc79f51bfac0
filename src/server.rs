//! HTTP front end.
//!
//! Serves the answer pipeline as a JSON API plus a minimal HTML form.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Status, version, chunk count, active backends |
//! | `POST` | `/ask` | `{question}` → `{question, answer, sources, refusal?}` |
//! | `POST` | `/protected/ask` | Same as `/ask`, gated by the `x-api-key` header |
//! | `POST` | `/retrieve` | `{query, top_k?}` → `{query, results}` |
//! | `GET`  | `/` | HTML question form |
//! | `POST` | `/` | Form field `q`; renders the answer into the page |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid request: question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401),
//! `retrieval_unavailable` (503), `protected_disabled` (503),
//! `generation_failed` (502).
//!
//! Refusals are not errors: a refused question answers `200` with the
//! refusal sentinel as `answer` and a `refusal` reason.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use exam_rag_core::{AnswerResult, RagError, Refusal, RetrievalResult};

use crate::config::Config;
use crate::context::AppContext;

/// Header carrying the shared secret for `/protected/ask`.
pub const API_KEY_HEADER: &str = "x-api-key";

type HmacSha256 = Hmac<Sha256>;

/// Shared state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    ctx: AppContext,
    /// Shared secret for the protected route; `None` disables it.
    api_key: Option<Arc<str>>,
}

/// Load everything named in `config` and serve until the process exits.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let ctx = AppContext::init(config).await?;
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "exam server listening");
    println!("Exam server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the router, reading the protected-route secret from the
/// environment variable named by `[server].api_key_env`.
pub fn build_router(ctx: AppContext) -> Router {
    let api_key = std::env::var(&ctx.config.server.api_key_env)
        .ok()
        .filter(|k| !k.is_empty());
    if api_key.is_none() {
        tracing::warn!(
            env = %ctx.config.server.api_key_env,
            "shared secret not set; /protected/ask is disabled"
        );
    }
    build_router_with_api_key(ctx, api_key)
}

/// Build the router with an explicit protected-route secret.
pub fn build_router_with_api_key(ctx: AppContext, api_key: Option<String>) -> Router {
    let state = AppState {
        ctx,
        api_key: api_key.map(Arc::from),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index).post(handle_form))
        .route("/health", get(handle_health))
        .route("/ask", post(handle_ask))
        .route("/protected/ask", post(handle_protected_ask))
        .route("/retrieve", post(handle_retrieve))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"generation_failed"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RagError::RetrievalUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RagError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!(code = err.code(), "{}", err);
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: format!("missing or invalid {} header", API_KEY_HEADER),
    }
}

fn protected_disabled() -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "protected_disabled".to_string(),
        message: "protected endpoint is not configured".to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    chunks: usize,
    embedding_model: String,
    generator: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let policy = &state.ctx.policy;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chunks: state.ctx.knowledge_base().store().len(),
        embedding_model: policy.retriever().embedder().model_name().to_string(),
        generator: policy.generator().name().to_string(),
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    question: String,
    answer: String,
    sources: Vec<RetrievalResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    refusal: Option<Refusal>,
}

impl AskResponse {
    fn new(question: String, result: AnswerResult) -> Self {
        Self {
            question,
            answer: result.text,
            sources: result.sources,
            refusal: result.refusal,
        }
    }
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let result = state.ctx.policy.answer(&req.question).await?;
    Ok(Json(AskResponse::new(req.question, result)))
}

// ============ POST /protected/ask ============

async fn handle_protected_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let expected = state.api_key.as_deref().ok_or_else(protected_disabled)?;
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(unauthorized)?;
    if !keys_match(expected, provided) {
        return Err(unauthorized());
    }

    let result = state.ctx.policy.answer(&req.question).await?;
    Ok(Json(AskResponse::new(req.question, result)))
}

/// Compare two secrets in constant time.
///
/// Both sides are MACed under the expected key so the comparison runs over
/// equal-length tags regardless of the provided key's length.
fn keys_match(expected: &str, provided: &str) -> bool {
    let tag = |input: &str| -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(expected.as_bytes()).ok()?;
        mac.update(input.as_bytes());
        Some(mac)
    };
    let (Some(provided_mac), Some(expected_mac)) = (tag(provided), tag(expected)) else {
        return false;
    };
    let provided_tag = provided_mac.finalize().into_bytes();
    expected_mac.verify_slice(&provided_tag).is_ok()
}

// ============ POST /retrieve ============

#[derive(Deserialize)]
struct RetrieveRequest {
    query: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct RetrieveResponse {
    query: String,
    results: Vec<RetrievalResult>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, AppError> {
    let top_k = req.top_k.unwrap_or(state.ctx.policy.config().top_k);
    let results = state.ctx.policy.retrieve(&req.query, top_k).await?;
    Ok(Json(RetrieveResponse {
        query: req.query,
        results,
    }))
}

// ============ GET / and POST / ============

#[derive(Deserialize)]
struct AskForm {
    #[serde(default)]
    q: String,
}

async fn handle_index() -> Html<String> {
    Html(render_page("", None))
}

async fn handle_form(State(state): State<AppState>, Form(form): Form<AskForm>) -> Response {
    match state.ctx.policy.answer(&form.q).await {
        Ok(result) => Html(render_page(&form.q, Some(Ok(&result)))).into_response(),
        Err(err) => {
            let message = err.to_string();
            let status = AppError::from(err).status;
            (status, Html(render_page(&form.q, Some(Err(&message))))).into_response()
        }
    }
}

fn render_page(question: &str, outcome: Option<Result<&AnswerResult, &str>>) -> String {
    let mut body = String::new();

    match outcome {
        Some(Ok(result)) => {
            body.push_str("<section class=\"answer\"><pre>");
            body.push_str(&html_escape::encode_text(&result.text));
            body.push_str("</pre>");
            if !result.sources.is_empty() {
                body.push_str("<h3>Sources</h3><ul>");
                for s in &result.sources {
                    body.push_str(&format!(
                        "<li>{} | chunk {} | score {:.3}</li>",
                        html_escape::encode_text(&s.source),
                        s.chunk_id,
                        s.score
                    ));
                }
                body.push_str("</ul>");
            }
            body.push_str("</section>");
        }
        Some(Err(message)) => {
            body.push_str("<section class=\"error\"><p>");
            body.push_str(&html_escape::encode_text(message));
            body.push_str("</p></section>");
        }
        None => {}
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Exam Helper</title></head>
<body>
<h1>Exam Helper</h1>
<form method="post" action="/">
<input type="text" name="q" size="80" value="{question}" placeholder="Ask one question from the book">
<button type="submit">Ask</button>
</form>
{body}
</body>
</html>
"#,
        question = html_escape::encode_double_quoted_attribute(question),
        body = body
    )
}
