//! Teaching prompt template.
//!
//! One fixed, instruction-tuned template binds the evidence and the question
//! and tells the model which four sections to produce. There is no
//! content-dependent branching; the refusal instruction is enforced in
//! code by the answer policy as well.

/// Section heading: restatement of the book evidence.
pub const BOOK_ANSWER_MARKER: &str = "📘 Book Answer:";
/// Section heading: plain-language explanation.
pub const EXPLANATION_MARKER: &str = "🧠 Teacher Explanation:";
/// Section heading: worked example.
pub const EXAMPLE_MARKER: &str = "✏️ Solved Example:";
/// Section heading: explicit final answer.
pub const FINAL_ANSWER_MARKER: &str = "✅ Final Answer:";

/// The four output section headings, in order.
pub const FORMAT_MARKERS: [&str; 4] = [
    BOOK_ANSWER_MARKER,
    EXPLANATION_MARKER,
    EXAMPLE_MARKER,
    FINAL_ANSWER_MARKER,
];

const SYSTEM_DIRECTIVE: &str = "You are a strict school teacher.
Only use the BOOK ANSWER.
If the BOOK ANSWER does not contain the answer, say exactly: NOT FOUND IN BOOK.
Explain simply like a teacher.";

/// Compose the full prompt for `evidence` and `question`.
///
/// Both are embedded verbatim; any budgeting happened during evidence
/// assembly.
///
/// ```rust
/// use exam_rag_core::prompt::{build_prompt, FORMAT_MARKERS};
///
/// let prompt = build_prompt("Plants make food from light.", "What is photosynthesis?");
/// assert!(prompt.contains("QUESTION:\nWhat is photosynthesis?"));
/// assert!(FORMAT_MARKERS.iter().all(|m| prompt.contains(m)));
/// ```
pub fn build_prompt(evidence: &str, question: &str) -> String {
    format!(
        "<s>[SYSTEM]\n{system}\n[/SYSTEM]\n[USER]\nBOOK ANSWER:\n{evidence}\n\nQUESTION:\n{question}\n\nFORMAT:\n{format}\n[/USER]\n[ASSISTANT]\n",
        system = SYSTEM_DIRECTIVE,
        evidence = evidence,
        question = question,
        format = FORMAT_MARKERS.join("\n"),
    )
}

/// True when `text` contains all four section headings.
pub fn has_all_sections(text: &str) -> bool {
    FORMAT_MARKERS.iter().all(|m| text.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_inputs_verbatim() {
        let evidence = "Line one.  Odd   spacing {braces} kept.";
        let question = "Why?  ";
        let prompt = build_prompt(evidence, question);
        assert!(prompt.contains(&format!("BOOK ANSWER:\n{}\n", evidence)));
        assert!(prompt.contains(&format!("QUESTION:\n{}\n", question)));
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let prompt = build_prompt("e", "q");
        let positions: Vec<usize> = FORMAT_MARKERS
            .iter()
            .map(|m| prompt.find(m).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
        assert!(prompt.find("BOOK ANSWER:").unwrap() < prompt.find("QUESTION:").unwrap());
    }

    #[test]
    fn test_prompt_is_deterministic() {
        assert_eq!(build_prompt("e", "q"), build_prompt("e", "q"));
    }

    #[test]
    fn test_prompt_carries_refusal_directive() {
        let prompt = build_prompt("", "");
        assert!(prompt.contains("NOT FOUND IN BOOK."));
        assert!(prompt.ends_with("[ASSISTANT]\n"));
    }

    #[test]
    fn test_has_all_sections() {
        let full = FORMAT_MARKERS.join(" text ");
        assert!(has_all_sections(&full));
        assert!(!has_all_sections(BOOK_ANSWER_MARKER));
    }
}
