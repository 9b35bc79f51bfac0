//! # Exam RAG Core
//!
//! The retrieval-augmented answering pipeline, free of network clients,
//! file formats, and CLI concerns:
//!
//! ```text
//! question ──▶ validate ──▶ retrieve ──▶ assemble evidence ──▶ prompt ──▶ generate
//!                 │             │               │
//!                 ▼             ▼               ▼
//!             refusal       refusal         refusal
//! ```
//!
//! Concrete embedders, generators, and knowledge-base loaders are supplied
//! by the application through the [`embedding::Embedder`],
//! [`generate::Generator`], [`index::EmbeddingIndex`], and
//! [`store::PassageStore`] traits.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | `Chunk`, `RetrievalResult`, `AnswerResult` |
//! | [`error`] | `RagError` taxonomy |
//! | [`embedding`] | Embedder trait and vector utilities |
//! | [`index`] | Embedding index trait and exact inner-product index |
//! | [`store`] | Passage store trait and in-memory store |
//! | [`retrieve`] | Query embedding + index search + store join |
//! | [`evidence`] | Bounded evidence assembly |
//! | [`prompt`] | Fixed teaching prompt template |
//! | [`generate`] | Text-completion trait and decoding parameters |
//! | [`policy`] | Staged answer policy with refusal rules |

pub mod embedding;
pub mod error;
pub mod evidence;
pub mod generate;
pub mod index;
pub mod models;
pub mod policy;
pub mod prompt;
pub mod retrieve;
pub mod store;

pub use error::{RagError, Result};
pub use models::{AnswerResult, Chunk, Refusal, RetrievalResult};
pub use policy::{AnswerPolicy, PolicyConfig};
pub use retrieve::Retriever;
