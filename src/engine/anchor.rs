//! Anchor resolution against the live body text.
//!
//! Candidates are gathered per patch from the current paragraph texts, so a
//! patch sees the text produced by the patches applied before it.

use crate::engine::errors::ReviseError;
use crate::plan::Patch;

/// Indices shown when an anchor stays ambiguous after question filtering.
const AMBIGUITY_PREVIEW_LIMIT: usize = 8;

/// A uniquely resolved anchor: the paragraph to rewrite plus the question
/// context recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorHit {
    pub paragraph_index: usize,
    pub question: String,
}

/// Resolve a patch against body paragraph texts to exactly one paragraph.
pub fn resolve(texts: &[String], patch: &Patch) -> Result<AnchorHit, ReviseError> {
    let mut candidates: Vec<(usize, String)> = Vec::new();
    for (index, text) in texts.iter().enumerate() {
        if patch.anchor_match.matches(text, &patch.anchor) {
            candidates.push((index, question_context(texts, index)));
        }
    }

    if let Some(question_anchor) = &patch.question_anchor {
        candidates.retain(|(_, question)| patch.question_match.matches(question, question_anchor));
    }

    match candidates.len() {
        0 => Err(ReviseError::AnchorNotFound {
            label: patch.label.clone(),
            anchor: patch.anchor.clone(),
            question_anchor: patch.question_anchor.clone(),
        }),
        1 => {
            let (paragraph_index, question) = candidates.swap_remove(0);
            Ok(AnchorHit {
                paragraph_index,
                question,
            })
        }
        count => {
            let preview = candidates
                .iter()
                .take(AMBIGUITY_PREVIEW_LIMIT)
                .map(|(index, _)| index.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            Err(ReviseError::AmbiguousAnchor {
                label: patch.label.clone(),
                count,
                preview,
            })
        }
    }
}

/// Trimmed text of the nearest preceding non-empty paragraph, or an empty
/// string at the top of the document.
pub fn question_context(texts: &[String], index: usize) -> String {
    texts[..index]
        .iter()
        .rev()
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_default()
}
