//! Knowledge base loading.
//!
//! Reads a pre-built knowledge base into the in-memory structures the core
//! retriever searches. Two on-disk layouts are supported:
//!
//! | `format` | Layout |
//! |----------|--------|
//! | `files` | `chunks_path` JSON array of `{text, source?}` + `index_path` `EXIX` flat index |
//! | `sqlite` | `chunks(id, text, source, embedding)` table, one row per chunk |
//!
//! Loading is all-or-nothing: any missing file, malformed record, or
//! chunk/vector count mismatch fails startup.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use exam_rag_core::embedding::blob_to_vec;
use exam_rag_core::index::{EmbeddingIndex, FlatIndex};
use exam_rag_core::models::Chunk;
use exam_rag_core::store::{InMemoryPassageStore, PassageStore};
use exam_rag_core::retrieve::KnowledgeBase;

use crate::config::KnowledgeBaseConfig;
use crate::db;

/// One record of the chunk file. Its array position is its id.
#[derive(Debug, Deserialize)]
struct ChunkRecord {
    text: String,
    #[serde(default)]
    source: Option<String>,
}

/// Load the knowledge base described by `[knowledge_base]`.
pub async fn load_knowledge_base(config: &KnowledgeBaseConfig) -> Result<KnowledgeBase> {
    let kb = match config.format.as_str() {
        "files" => {
            let chunks_path = required(&config.chunks_path, "chunks_path")?;
            let index_path = required(&config.index_path, "index_path")?;
            load_files(chunks_path, index_path)?
        }
        "sqlite" => {
            let sqlite_path = required(&config.sqlite_path, "sqlite_path")?;
            load_sqlite(sqlite_path).await?
        }
        other => bail!("Unknown knowledge_base.format: '{}'", other),
    };

    tracing::info!(
        format = %config.format,
        chunks = kb.store().len(),
        dims = kb.index().dims(),
        "knowledge base loaded"
    );
    Ok(kb)
}

fn required<'a>(path: &'a Option<PathBuf>, key: &str) -> Result<&'a Path> {
    path.as_deref()
        .ok_or_else(|| anyhow::anyhow!("knowledge_base.{} is not set", key))
}

/// Load a chunk JSON file and its parallel flat index.
pub fn load_files(chunks_path: &Path, index_path: &Path) -> Result<KnowledgeBase> {
    let raw = std::fs::read_to_string(chunks_path)
        .with_context(|| format!("Failed to read chunk file: {}", chunks_path.display()))?;
    let records: Vec<ChunkRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse chunk file: {}", chunks_path.display()))?;

    let store = InMemoryPassageStore::from_records(
        records
            .into_iter()
            .map(|r| (r.text, r.source.unwrap_or_default())),
    );

    let bytes = std::fs::read(index_path)
        .with_context(|| format!("Failed to read index file: {}", index_path.display()))?;
    let index = FlatIndex::from_bytes(&bytes)
        .with_context(|| format!("Failed to parse index file: {}", index_path.display()))?;

    Ok(KnowledgeBase::new(Arc::new(index), Arc::new(store))?)
}

/// Load chunks and their embeddings from a SQLite database.
pub async fn load_sqlite(path: &Path) -> Result<KnowledgeBase> {
    let pool = db::connect_readonly(path).await?;

    let rows = sqlx::query("SELECT id, text, source, embedding FROM chunks ORDER BY id")
        .fetch_all(&pool)
        .await
        .with_context(|| format!("Failed to read chunks table from {}", path.display()))?;
    pool.close().await;

    let mut chunks = Vec::with_capacity(rows.len());
    let mut vectors = Vec::with_capacity(rows.len());

    for row in &rows {
        let id: i64 = row.get("id");
        let blob: Vec<u8> = row.get("embedding");
        if blob.is_empty() || blob.len() % 4 != 0 {
            bail!(
                "chunk {} has a malformed embedding blob ({} bytes)",
                id,
                blob.len()
            );
        }
        let id = usize::try_from(id).with_context(|| format!("negative chunk id {}", id))?;

        chunks.push(Chunk {
            id,
            text: row.get("text"),
            source: row.get::<Option<String>, _>("source").unwrap_or_default(),
        });
        vectors.push(blob_to_vec(&blob));
    }

    let Some(dims) = vectors.first().map(Vec::len) else {
        bail!("chunks table in {} is empty", path.display());
    };

    let store = InMemoryPassageStore::from_chunks(chunks)?;
    let index = FlatIndex::from_vectors(dims, &vectors)?;

    Ok(KnowledgeBase::new(Arc::new(index), Arc::new(store))?)
}
