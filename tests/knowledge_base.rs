//! Knowledge base loader tests for both on-disk formats.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempDir;

use exam_rag::config::KnowledgeBaseConfig;
use exam_rag::knowledge::{load_files, load_knowledge_base, load_sqlite};
use exam_rag_core::embedding::vec_to_blob;
use exam_rag_core::index::FlatIndex;

fn write_files_kb(dir: &Path, chunks: &str, vectors: &[Vec<f32>]) -> (PathBuf, PathBuf) {
    let chunks_path = dir.join("chunks.json");
    let index_path = dir.join("index.bin");
    fs::write(&chunks_path, chunks).unwrap();
    let index = FlatIndex::from_vectors(2, vectors).unwrap();
    fs::write(&index_path, index.to_bytes()).unwrap();
    (chunks_path, index_path)
}

async fn write_sqlite_kb(path: &Path, rows: &[(i64, &str, Option<&str>, Vec<u8>)]) {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE chunks (id INTEGER PRIMARY KEY, text TEXT NOT NULL, source TEXT, embedding BLOB NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();

    for (id, text, source, blob) in rows {
        sqlx::query("INSERT INTO chunks (id, text, source, embedding) VALUES (?, ?, ?, ?)")
            .bind(*id)
            .bind(*text)
            .bind(*source)
            .bind(blob.as_slice())
            .execute(&pool)
            .await
            .unwrap();
    }
    pool.close().await;
}

// ─── files ──────────────────────────────────────────────────────────

#[test]
fn test_load_files_assigns_positions() {
    let tmp = TempDir::new().unwrap();
    let (chunks, index) = write_files_kb(
        tmp.path(),
        r#"[{"text": "Leaves are green.", "source": "bio p.1"}, {"text": "Roots absorb water."}]"#,
        &[vec![1.0, 0.0], vec![0.0, 1.0]],
    );

    let kb = load_files(&chunks, &index).unwrap();
    assert_eq!(kb.store().len(), 2);
    assert_eq!(kb.index().dims(), 2);
    let second = kb.store().get(1).unwrap();
    assert_eq!(second.id, 1);
    assert_eq!(second.text, "Roots absorb water.");
    assert_eq!(second.source, "");
}

#[test]
fn test_load_files_count_mismatch_fails() {
    let tmp = TempDir::new().unwrap();
    let (chunks, index) = write_files_kb(
        tmp.path(),
        r#"[{"text": "only one"}]"#,
        &[vec![1.0, 0.0], vec![0.0, 1.0]],
    );

    let err = load_files(&chunks, &index).unwrap_err();
    assert!(format!("{:#}", err).contains("index holds 2 vectors but store holds 1 chunks"));
}

#[test]
fn test_load_files_missing_index_fails() {
    let tmp = TempDir::new().unwrap();
    let chunks = tmp.path().join("chunks.json");
    fs::write(&chunks, r#"[{"text": "a"}]"#).unwrap();

    let err = load_files(&chunks, &tmp.path().join("nope.bin")).unwrap_err();
    assert!(err.to_string().contains("Failed to read index file"));
}

#[test]
fn test_load_files_corrupt_index_fails() {
    let tmp = TempDir::new().unwrap();
    let chunks = tmp.path().join("chunks.json");
    let index = tmp.path().join("index.bin");
    fs::write(&chunks, r#"[{"text": "a"}]"#).unwrap();
    fs::write(&index, b"FAISSxxxxxxxxxxxxxxxxxxx").unwrap();

    let err = load_files(&chunks, &index).unwrap_err();
    assert!(err.to_string().contains("Failed to parse index file"));
}

#[test]
fn test_load_files_empty_fails() {
    let tmp = TempDir::new().unwrap();
    let (chunks, index) = write_files_kb(tmp.path(), "[]", &[]);
    assert!(load_files(&chunks, &index).is_err());
}

#[tokio::test]
async fn test_load_knowledge_base_dispatches_on_format() {
    let tmp = TempDir::new().unwrap();
    let (chunks, index) = write_files_kb(
        tmp.path(),
        r#"[{"text": "Leaves are green."}]"#,
        &[vec![1.0, 0.0]],
    );
    let config = KnowledgeBaseConfig {
        format: "files".to_string(),
        chunks_path: Some(chunks),
        index_path: Some(index),
        sqlite_path: None,
    };

    let kb = load_knowledge_base(&config).await.unwrap();
    assert_eq!(kb.store().len(), 1);
}

// ─── sqlite ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_load_sqlite() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("kb.sqlite");
    write_sqlite_kb(
        &db,
        &[
            (0, "Leaves are green.", Some("bio p.1"), vec_to_blob(&[1.0, 0.0, 0.0])),
            (1, "Roots absorb water.", None, vec_to_blob(&[0.0, 1.0, 0.0])),
        ],
    )
    .await;

    let kb = load_sqlite(&db).await.unwrap();
    assert_eq!(kb.store().len(), 2);
    assert_eq!(kb.index().dims(), 3);
    assert_eq!(kb.store().get(0).unwrap().source, "bio p.1");
    assert_eq!(kb.store().get(1).unwrap().source, "");
}

#[tokio::test]
async fn test_load_sqlite_rejects_gaps_in_ids() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("kb.sqlite");
    write_sqlite_kb(
        &db,
        &[
            (0, "a", None, vec_to_blob(&[1.0, 0.0])),
            (2, "b", None, vec_to_blob(&[0.0, 1.0])),
        ],
    )
    .await;

    let err = load_sqlite(&db).await.unwrap_err();
    assert!(err.to_string().contains("contiguous"));
}

#[tokio::test]
async fn test_load_sqlite_rejects_mixed_dims() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("kb.sqlite");
    write_sqlite_kb(
        &db,
        &[
            (0, "a", None, vec_to_blob(&[1.0, 0.0])),
            (1, "b", None, vec_to_blob(&[0.0, 1.0, 0.0])),
        ],
    )
    .await;

    assert!(load_sqlite(&db).await.is_err());
}

#[tokio::test]
async fn test_load_sqlite_empty_table_fails() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("kb.sqlite");
    write_sqlite_kb(&db, &[]).await;

    let err = load_sqlite(&db).await.unwrap_err();
    assert!(err.to_string().contains("is empty"));
}

#[tokio::test]
async fn test_load_sqlite_missing_file_fails() {
    let tmp = TempDir::new().unwrap();
    let err = load_sqlite(&tmp.path().join("absent.sqlite")).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}
