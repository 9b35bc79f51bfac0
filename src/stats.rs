//! Knowledge base statistics.
//!
//! Used by `exam kb stats` to confirm the knowledge base loads and looks
//! the way the build step intended: chunk count, vector dimensions, and a
//! per-source breakdown.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::Path;

use exam_rag_core::retrieve::KnowledgeBase;

use crate::config::Config;
use crate::knowledge::load_knowledge_base;

/// Summary of a loaded knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct KbStats {
    pub chunks: usize,
    pub dims: usize,
    pub total_chars: usize,
    /// Chunk count per source label, most chunks first. Unlabelled chunks
    /// are reported under `(none)`.
    pub by_source: Vec<(String, usize)>,
}

pub fn collect_stats(kb: &KnowledgeBase) -> KbStats {
    let chunks = kb.store().chunks();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut total_chars = 0;
    for chunk in chunks {
        let label = if chunk.source.is_empty() {
            "(none)"
        } else {
            chunk.source.as_str()
        };
        *counts.entry(label).or_default() += 1;
        total_chars += chunk.text.chars().count();
    }

    let mut by_source: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(source, n)| (source.to_string(), n))
        .collect();
    // Stable: ties keep alphabetical order from the BTreeMap
    by_source.sort_by(|a, b| b.1.cmp(&a.1));

    KbStats {
        chunks: chunks.len(),
        dims: kb.index().dims(),
        total_chars,
        by_source,
    }
}

/// Run the stats command: load the knowledge base and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let kb = load_knowledge_base(&config.knowledge_base).await?;
    let stats = collect_stats(&kb);
    let kb_config = &config.knowledge_base;

    println!("Exam RAG — Knowledge Base Stats");
    println!("===============================");
    println!();
    println!("  Format:      {}", kb_config.format);
    for path in [
        &kb_config.chunks_path,
        &kb_config.index_path,
        &kb_config.sqlite_path,
    ]
    .into_iter()
    .flatten()
    {
        println!("  File:        {} ({})", path.display(), file_size(path));
    }
    println!();
    println!("  Chunks:      {}", stats.chunks);
    println!("  Dimensions:  {}", stats.dims);
    println!(
        "  Avg chars:   {}",
        if stats.chunks > 0 {
            stats.total_chars / stats.chunks
        } else {
            0
        }
    );

    if !stats.by_source.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<48} {:>8}", "SOURCE", "CHUNKS");
        println!("  {}", "-".repeat(58));
        for (source, count) in &stats.by_source {
            println!("  {:<48} {:>8}", source, count);
        }
    }

    println!();
    Ok(())
}

fn file_size(path: &Path) -> String {
    std::fs::metadata(path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "missing".to_string())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_rag_core::index::FlatIndex;
    use exam_rag_core::store::InMemoryPassageStore;
    use std::sync::Arc;

    #[test]
    fn test_collect_stats_groups_sources() {
        let store = InMemoryPassageStore::from_records(vec![
            ("abcd", "bio:ch1"),
            ("ef", "bio:ch2"),
            ("gh", "bio:ch2"),
            ("ij", ""),
        ]);
        let index = FlatIndex::from_vectors(2, &vec![vec![1.0, 0.0]; 4]).unwrap();
        let kb = KnowledgeBase::new(Arc::new(index), Arc::new(store)).unwrap();

        let stats = collect_stats(&kb);
        assert_eq!(stats.chunks, 4);
        assert_eq!(stats.dims, 2);
        assert_eq!(stats.total_chars, 10);
        assert_eq!(stats.by_source[0], ("bio:ch2".to_string(), 2));
        assert!(stats.by_source.contains(&("(none)".to_string(), 1)));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
