//! Error types for the answering pipeline.
//!
//! Refusals are not errors: they come back as a normal
//! [`AnswerResult`](crate::models::AnswerResult). Only malformed requests and
//! infrastructure failures travel through [`RagError`].

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur in the answering pipeline.
#[derive(Error, Debug)]
pub enum RagError {
    /// The request itself is malformed (blank question, `top_k == 0`).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The knowledge base (index, passage store, or query embedder) is
    /// missing, empty, or inconsistent.
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// The completion engine failed or timed out.
    #[error("generation failed: {0}")]
    Generation(String),
}

impl RagError {
    /// Machine-readable code used by front ends.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::InvalidRequest(_) => "bad_request",
            RagError::RetrievalUnavailable(_) => "retrieval_unavailable",
            RagError::Generation(_) => "generation_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(RagError::InvalidRequest("x".into()).code(), "bad_request");
        assert_eq!(
            RagError::RetrievalUnavailable("x".into()).code(),
            "retrieval_unavailable"
        );
        assert_eq!(RagError::Generation("x".into()).code(), "generation_failed");
    }

    #[test]
    fn test_display_includes_detail() {
        let err = RagError::Generation("connection refused".into());
        assert_eq!(err.to_string(), "generation failed: connection refused");
    }
}
