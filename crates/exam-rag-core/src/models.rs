//! Core data models for the answering pipeline.
//!
//! A [`Chunk`] lives in the passage store for the life of the process. A
//! [`RetrievalResult`] is created per query and dropped after the answer is
//! returned. An [`AnswerResult`] is what front ends render.

use serde::{Deserialize, Serialize};

/// Refusal text for compound questions.
pub const MULTIPLE_QUESTIONS_TEXT: &str = "❌ Please ask only ONE question.";

/// Refusal text when the book does not hold enough evidence.
pub const NOT_FOUND_TEXT: &str = "❌ NOT FOUND IN BOOK.";

/// A unit of textbook text addressable by its index position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in both the passage store and the embedding index.
    pub id: usize,
    pub text: String,
    /// Provenance label (book/chapter/page). Empty when unknown.
    #[serde(default)]
    pub source: String,
}

/// A chunk matched by a query, with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: usize,
    pub text: String,
    pub source: String,
    /// Inner-product similarity; higher is more relevant.
    pub score: f32,
}

impl RetrievalResult {
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.id,
            text: chunk.text.clone(),
            source: chunk.source.clone(),
            score,
        }
    }
}

/// Why the policy declined to call the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refusal {
    /// The question contained more question marks than allowed.
    MultipleQuestions,
    /// Retrieval returned nothing, or too little usable evidence.
    NotFound,
}

impl Refusal {
    /// The fixed sentinel text shown to the user.
    pub fn text(self) -> &'static str {
        match self {
            Refusal::MultipleQuestions => MULTIPLE_QUESTIONS_TEXT,
            Refusal::NotFound => NOT_FOUND_TEXT,
        }
    }
}

/// The outcome of [`AnswerPolicy::answer`](crate::policy::AnswerPolicy::answer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Generated answer or a refusal sentinel.
    pub text: String,
    /// Raw retrieval results, in index order.
    pub sources: Vec<RetrievalResult>,
    /// Set when `text` is a refusal sentinel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<Refusal>,
}

impl AnswerResult {
    pub fn refused(refusal: Refusal, sources: Vec<RetrievalResult>) -> Self {
        Self {
            text: refusal.text().to_string(),
            sources,
            refusal: Some(refusal),
        }
    }

    pub fn generated(text: String, sources: Vec<RetrievalResult>) -> Self {
        Self {
            text,
            sources,
            refusal: None,
        }
    }

    pub fn is_refusal(&self) -> bool {
        self.refusal.is_some()
    }
}
