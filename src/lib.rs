//! # Exam RAG
//!
//! Retrieval-augmented exam question answering over a fixed textbook
//! corpus. A question is embedded, matched against a pre-built index of
//! textbook chunks, and answered by a language model that is only shown
//! the retrieved book text. Questions the book cannot support are refused.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌─────────────┐
//! │ Knowledge    │──▶│ exam-rag-core  │──▶│  Generator  │
//! │ base (files/ │   │ retrieve+policy│   │ llama.cpp/  │
//! │ sqlite)      │   └───────┬────────┘   │ ollama/...  │
//! └──────────────┘           │            └─────────────┘
//!                 ┌──────────┴────────┐
//!                 ▼                   ▼
//!            ┌──────────┐       ┌──────────┐
//!            │   CLI    │       │   HTTP   │
//!            │  (exam)  │       │  (axum)  │
//!            └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! exam kb stats                               # check the knowledge base loads
//! exam ask "What is photosynthesis?"
//! exam retrieve "chlorophyll" --top-k 3
//! exam serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`knowledge`] | Knowledge base loaders (files, sqlite) |
//! | [`db`] | Read-only SQLite connection |
//! | [`embedding`] | Query embedding providers |
//! | [`generator`] | Completion backends |
//! | [`context`] | Process-wide application state |
//! | [`ask`] | Terminal ask / repl / retrieve commands |
//! | [`server`] | HTTP server |
//! | [`stats`] | Knowledge base statistics |

pub mod ask;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod generator;
pub mod knowledge;
pub mod server;
pub mod stats;
