//! Bounded evidence ("book answer") assembly.
//!
//! Retrieved passages are cleaned, filtered, and concatenated in retrieval
//! order into a single string no longer than `max_chars`. Lengths are
//! counted in `char`s, and the single-space separators count toward the
//! budget.
//!
//! # Algorithm
//!
//! 1. Collapse each passage's whitespace runs to one space and trim.
//! 2. Skip passages shorter than `min_passage_chars`.
//! 3. Append whole passages while they fit.
//! 4. The first passage that does not fit is cut to fill the remaining
//!    budget exactly; nothing after it is considered.

use crate::models::RetrievalResult;

/// Default evidence budget.
pub const DEFAULT_MAX_CHARS: usize = 600;

/// Passages shorter than this (after cleanup) are treated as noise.
pub const DEFAULT_MIN_PASSAGE_CHARS: usize = 40;

/// Assemble evidence with the default minimum passage length.
///
/// # Example
///
/// ```rust
/// use exam_rag_core::evidence::build_evidence;
/// use exam_rag_core::models::RetrievalResult;
///
/// let short = RetrievalResult {
///     chunk_id: 0,
///     text: "short".into(),
///     source: String::new(),
///     score: 0.9,
/// };
/// assert_eq!(build_evidence(&[short], 600), "");
/// ```
pub fn build_evidence(results: &[RetrievalResult], max_chars: usize) -> String {
    build_evidence_with(results, max_chars, DEFAULT_MIN_PASSAGE_CHARS)
}

/// Assemble evidence with an explicit minimum passage length.
///
/// # Guarantees
///
/// - `output.chars().count() <= max_chars`.
/// - Passages keep their relative input order.
/// - Every whole passage in the output has at least `min_passage_chars`
///   characters.
pub fn build_evidence_with(
    results: &[RetrievalResult],
    max_chars: usize,
    min_passage_chars: usize,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut used = 0usize;

    for result in results {
        let text = collapse_whitespace(&result.text);
        let len = text.chars().count();
        if len == 0 || len < min_passage_chars {
            continue;
        }

        let sep = usize::from(!parts.is_empty());
        let remaining = max_chars.saturating_sub(used + sep);
        if len > remaining {
            if remaining > 0 {
                parts.push(text.chars().take(remaining).collect());
            }
            break;
        }

        used += sep + len;
        parts.push(text);
        if used >= max_chars {
            break;
        }
    }

    parts.join(" ")
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
