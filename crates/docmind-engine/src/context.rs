//! Context assembly for answer composition.
//!
//! Retrieved passages are rendered as numbered, source-attributed blocks so
//! an answer can cite them by number.

use serde::{Deserialize, Serialize};

/// Answer returned when retrieval comes back empty.
pub const NO_RESULTS_ANSWER: &str =
    "I couldn't find relevant information in the ingested documents to answer this question.";

/// One retrieved passage with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePassage {
    pub text: String,
    pub source: String,
    pub page: Option<u32>,
    pub score: f32,
}

impl SourcePassage {
    fn citation(&self) -> String {
        match self.page {
            Some(page) => format!("{}, page {}", self.source, page),
            None => self.source.clone(),
        }
    }
}

/// Render passages as numbered context blocks.
pub fn render_context(passages: &[SourcePassage]) -> String {
    let mut out = String::new();
    for (i, passage) in passages.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&format!("[{}] ({}) {}", i + 1, passage.citation(), passage.text));
    }
    out
}

/// Compose an extractive answer: the retrieved passages in rank order,
/// followed by a source list.
pub fn compose_answer(question: &str, passages: &[SourcePassage]) -> String {
    if passages.is_empty() {
        return NO_RESULTS_ANSWER.to_string();
    }

    let mut answer = format!(
        "Here is what the ingested documents say about \"{}\":\n\n{}",
        question,
        render_context(passages)
    );

    answer.push_str("\n\nSources: ");
    let citations: Vec<String> = passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] {}", i + 1, p.citation()))
        .collect();
    answer.push_str(&citations.join("; "));
    answer
}
