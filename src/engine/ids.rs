//! Identifier scans over existing document state.
//!
//! New footnotes and tracked changes extend whatever numbering the document
//! already carries, so every allocation starts from a scan of the live trees.

use crate::dom::{wml, XmlElement};
use std::collections::{BTreeMap, BTreeSet};

/// Highest non-negative footnote id among the direct footnote entries, or 0
/// when none parse. Separator footnotes use negative ids and never count.
pub fn max_footnote_id(footnotes: &XmlElement) -> i64 {
    wml::footnote_entries(footnotes)
        .filter_map(wml::footnote_id)
        .filter(|id| *id >= 0)
        .max()
        .unwrap_or(0)
}

/// Non-negative footnote ids currently defined by the footnote collection.
pub fn existing_footnote_ids(footnotes: &XmlElement) -> BTreeSet<i64> {
    wml::footnote_entries(footnotes)
        .filter_map(wml::footnote_id)
        .filter(|id| *id >= 0)
        .collect()
}

/// Trimmed text of each non-negative footnote entry keyed by id. A duplicate
/// id keeps the last entry, matching reader behavior for malformed parts.
pub fn footnote_text_map(footnotes: &XmlElement) -> BTreeMap<i64, String> {
    let mut texts = BTreeMap::new();
    for entry in wml::footnote_entries(footnotes) {
        if let Some(id) = wml::footnote_id(entry) {
            if id >= 0 {
                texts.insert(id, wml::footnote_text(entry));
            }
        }
    }
    texts
}

/// Next free tracked-change id: one past the highest id on any insertion or
/// deletion element anywhere in the document, or 1 for a clean document.
pub fn next_change_id(document: &XmlElement) -> i64 {
    document
        .descendants()
        .filter(|element| element.is("ins") || element.is("del"))
        .filter_map(|element| element.attr("id"))
        .filter_map(|raw| raw.parse::<i64>().ok())
        .max()
        .map_or(1, |highest| highest + 1)
}

/// Counts of tracked insertion and deletion elements in a document part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedChangeCounts {
    pub insertions: usize,
    pub deletions: usize,
}

impl TrackedChangeCounts {
    pub fn any(&self) -> bool {
        self.insertions > 0 || self.deletions > 0
    }
}

pub fn tracked_change_counts(document: &XmlElement) -> TrackedChangeCounts {
    let mut counts = TrackedChangeCounts {
        insertions: 0,
        deletions: 0,
    };
    for element in document.descendants() {
        if element.is("ins") {
            counts.insertions += 1;
        } else if element.is("del") {
            counts.deletions += 1;
        }
    }
    counts
}
