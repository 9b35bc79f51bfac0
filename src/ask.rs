//! Terminal front end: `exam ask`, `exam repl`, and `exam retrieve`.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use exam_rag_core::{AnswerResult, RetrievalResult};

use crate::context::AppContext;

/// Answer one question and print the answer followed by its sources.
pub async fn run_ask(ctx: &AppContext, question: &str) -> Result<()> {
    let result = ctx.policy.answer(question).await?;
    print!("{}", format_answer(&result));
    Ok(())
}

/// Read questions from stdin until `exit`, `quit`, or end of input.
///
/// A failed question is reported on stderr and the loop continues.
pub async fn run_repl(ctx: &AppContext) -> Result<()> {
    println!("📘 Exam Helper ready. Type 'exit' to stop.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n❓ Question: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        match ctx.policy.answer(question).await {
            Ok(result) => print!("\n{}", format_answer(&result)),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    Ok(())
}

/// Print raw retrieval results without generating an answer.
pub async fn run_retrieve(ctx: &AppContext, query: &str, top_k: Option<usize>) -> Result<()> {
    let top_k = top_k.unwrap_or(ctx.policy.config().top_k);
    let results = ctx.policy.retrieve(query, top_k).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        println!("{}. {}", i + 1, format_source(r));
        println!("   {}", snippet(&r.text, 160));
    }
    Ok(())
}

pub fn format_answer(result: &AnswerResult) -> String {
    let mut out = format!("{}\n", result.text);
    if !result.sources.is_empty() {
        out.push_str("\nSources:\n");
        for r in &result.sources {
            out.push_str(&format!("  {}\n", format_source(r)));
        }
    }
    out
}

/// `source | chunk N | score 0.xxx`
pub fn format_source(r: &RetrievalResult) -> String {
    let source = if r.source.is_empty() {
        "unknown"
    } else {
        r.source.as_str()
    };
    format!("{} | chunk {} | score {:.3}", source, r.chunk_id, r.score)
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
