//! Staged answer policy.
//!
//! [`AnswerPolicy::answer`] runs four named stages. Each returns either
//! `ControlFlow::Continue` with the value the next stage needs, or
//! `ControlFlow::Break` with a finished refusal:
//!
//! | Stage | Refuses when | Sources on refusal |
//! |-------|--------------|--------------------|
//! | [`check_question`](AnswerPolicy::check_question) | more than `max_question_marks` `?` | empty |
//! | [`retrieve_passages`](AnswerPolicy::retrieve_passages) | nothing retrieved | empty |
//! | [`assemble_evidence`](AnswerPolicy::assemble_evidence) | evidence under `min_evidence_chars` | raw retrieval |
//! | [`generate_answer`](AnswerPolicy::generate_answer) | never (errors propagate) | raw retrieval |
//!
//! Refusals are ordinary [`AnswerResult`]s; only malformed input and
//! infrastructure failures come back as [`RagError`].

use std::ops::ControlFlow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{RagError, Result};
use crate::evidence::{build_evidence_with, DEFAULT_MAX_CHARS, DEFAULT_MIN_PASSAGE_CHARS};
use crate::generate::{GenerationParams, Generator};
use crate::models::{AnswerResult, Refusal, RetrievalResult};
use crate::prompt::build_prompt;
use crate::retrieve::{Retriever, DEFAULT_TOP_K};

/// Evidence shorter than this is not worth a generation.
pub const DEFAULT_MIN_EVIDENCE_CHARS: usize = 50;

/// Questions may contain at most this many `?`.
pub const DEFAULT_MAX_QUESTION_MARKS: usize = 1;

/// Outcome of one stage: keep going with `T`, or stop with a refusal.
pub type Stage<T> = ControlFlow<AnswerResult, T>;

/// Tunable thresholds for the answer policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Passages fetched per question.
    pub top_k: usize,
    /// Evidence budget in characters.
    pub max_evidence_chars: usize,
    /// Passages shorter than this are dropped from evidence.
    pub min_passage_chars: usize,
    /// Evidence shorter than this triggers the not-found refusal.
    pub min_evidence_chars: usize,
    /// More `?` than this triggers the multi-question refusal.
    pub max_question_marks: usize,
    /// Results scoring below this are left out of evidence (still reported
    /// as sources).
    pub min_score: Option<f32>,
    /// Decoding parameters for the generator.
    pub generation: GenerationParams,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            max_evidence_chars: DEFAULT_MAX_CHARS,
            min_passage_chars: DEFAULT_MIN_PASSAGE_CHARS,
            min_evidence_chars: DEFAULT_MIN_EVIDENCE_CHARS,
            max_question_marks: DEFAULT_MAX_QUESTION_MARKS,
            min_score: None,
            generation: GenerationParams::default(),
        }
    }
}

/// Orchestrates retrieval, evidence, prompt, and generation for one
/// question at a time.
///
/// Cheap to share behind an `Arc`; all state is read-only apart from the
/// generation gate.
pub struct AnswerPolicy {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    config: PolicyConfig,
    /// Held for the duration of a generation when the backend cannot
    /// serve concurrent calls.
    generation_gate: Mutex<()>,
}

impl AnswerPolicy {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, config: PolicyConfig) -> Self {
        Self {
            retriever,
            generator,
            config,
            generation_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    /// Retrieval without generation, for diagnostics and source display.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        self.retriever.retrieve(query, top_k).await
    }

    /// Answer one exam question from the book.
    ///
    /// The question reaches the embedder and the prompt exactly as given.
    pub async fn answer(&self, question: &str) -> Result<AnswerResult> {
        if let ControlFlow::Break(refusal) = self.check_question(question)? {
            return Ok(refusal);
        }

        let sources = match self.retrieve_passages(question).await? {
            ControlFlow::Continue(sources) => sources,
            ControlFlow::Break(refusal) => return Ok(refusal),
        };

        let evidence = match self.assemble_evidence(&sources) {
            ControlFlow::Continue(evidence) => evidence,
            ControlFlow::Break(refusal) => return Ok(refusal),
        };

        let text = self.generate_answer(&evidence, question).await?;
        Ok(AnswerResult::generated(text, sources))
    }

    /// Stage 1: reject blank input and compound questions.
    pub fn check_question(&self, question: &str) -> Result<Stage<()>> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidRequest(
                "question must not be empty".to_string(),
            ));
        }

        let marks = question.matches('?').count();
        if marks > self.config.max_question_marks {
            tracing::info!(marks, "refusing compound question");
            return Ok(ControlFlow::Break(AnswerResult::refused(
                Refusal::MultipleQuestions,
                Vec::new(),
            )));
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Stage 2: fetch `top_k` passages; refuse when there are none.
    pub async fn retrieve_passages(&self, question: &str) -> Result<Stage<Vec<RetrievalResult>>> {
        let sources = self.retriever.retrieve(question, self.config.top_k).await?;
        if sources.is_empty() {
            tracing::info!("refusing: retrieval returned no passages");
            return Ok(ControlFlow::Break(AnswerResult::refused(
                Refusal::NotFound,
                Vec::new(),
            )));
        }
        Ok(ControlFlow::Continue(sources))
    }

    /// Stage 3: build bounded evidence; refuse when it is too thin.
    ///
    /// The refusal carries the raw retrieval so callers can see what was
    /// considered.
    pub fn assemble_evidence(&self, sources: &[RetrievalResult]) -> Stage<String> {
        let relevant: Vec<RetrievalResult> = match self.config.min_score {
            Some(floor) => sources.iter().filter(|r| r.score >= floor).cloned().collect(),
            None => sources.to_vec(),
        };

        let evidence = build_evidence_with(
            &relevant,
            self.config.max_evidence_chars,
            self.config.min_passage_chars,
        );
        let len = evidence.chars().count();
        if len < self.config.min_evidence_chars {
            tracing::info!(
                evidence_chars = len,
                min = self.config.min_evidence_chars,
                "refusing: insufficient evidence"
            );
            return ControlFlow::Break(AnswerResult::refused(Refusal::NotFound, sources.to_vec()));
        }
        ControlFlow::Continue(evidence)
    }

    /// Stage 4: prompt the generator and trim its output.
    ///
    /// The trimmed completion is the answer, even when it is empty.
    /// Generator failures are [`RagError::Generation`] and are never turned
    /// into refusal text.
    pub async fn generate_answer(&self, evidence: &str, question: &str) -> Result<String> {
        let prompt = build_prompt(evidence, question);

        let _permit = if self.generator.supports_concurrent_calls() {
            None
        } else {
            Some(self.generation_gate.lock().await)
        };

        tracing::debug!(
            generator = self.generator.name(),
            prompt_chars = prompt.chars().count(),
            "generating answer"
        );
        let raw = self
            .generator
            .generate(&prompt, &self.config.generation)
            .await
            .map_err(|e| RagError::Generation(format!("{:#}", e)))?;

        let text = raw.trim();
        if text.is_empty() {
            tracing::warn!(
                generator = self.generator.name(),
                "generator returned an empty completion"
            );
        }
        Ok(text.to_string())
    }
}
