//! End-to-end application of a patch plan to a document.

use crate::dom::{self, wml, DocxPackage, XmlElement, DOCUMENT_PART, FOOTNOTES_PART};
use crate::engine::audit::{self, AuditRecord};
use crate::engine::errors::ReviseError;
use crate::engine::{anchor, ids, policy, writer};
use crate::plan::{tokenize, PatchPlan};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;

/// Author name stamped on tracked changes when none is supplied.
pub const DEFAULT_AUTHOR: &str = "docx-reviser";

/// Current UTC time in the ISO-8601 format tracked changes carry.
pub fn default_date() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Revision metadata for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviseOptions {
    pub author: String,
    pub date: String,
    /// Permit revising a document that already carries tracked changes.
    pub allow_incremental: bool,
}

impl ReviseOptions {
    pub fn new(author: Option<String>, date: Option<String>, allow_incremental: bool) -> Self {
        Self {
            author: author.unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            date: date.unwrap_or_else(default_date),
            allow_incremental,
        }
    }
}

/// A footnote created for a plan key during one revision pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFootnote {
    pub key: String,
    pub id: i64,
}

/// Record of one successfully applied patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedPatch {
    pub label: String,
    pub paragraph_index: usize,
    pub question: String,
    pub old_text: String,
    /// Paragraph text after the edit. Footnote references carry no text of
    /// their own, so this is the inserted prose without citation markers.
    pub new_text: String,
}

/// Everything a caller needs to report or persist after a revision pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviseOutcome {
    pub applied: Vec<AppliedPatch>,
    pub new_footnotes: Vec<NewFootnote>,
    pub audit: Vec<AuditRecord>,
}

/// Apply a plan to in-memory document and footnote trees.
///
/// Ordering is fixed: plan policy, then the prior-revision guard, then
/// footnote materialization, then patches in plan order. Each patch resolves
/// its anchor against the paragraph text as left by the patches before it.
pub fn revise_trees(
    document: &mut XmlElement,
    footnotes: &mut XmlElement,
    plan: &PatchPlan,
    options: &ReviseOptions,
) -> Result<ReviseOutcome, ReviseError> {
    let existing_ids = ids::existing_footnote_ids(footnotes);
    let existing_texts = ids::footnote_text_map(footnotes);
    let new_keys = policy::validate_plan(plan, &existing_ids)?;

    let counts = ids::tracked_change_counts(document);
    if counts.any() && !options.allow_incremental {
        return Err(ReviseError::AlreadyRevised {
            ins_count: counts.insertions,
            del_count: counts.deletions,
        });
    }

    let mut next_footnote_id = ids::max_footnote_id(footnotes) + 1;
    let mut new_footnote_ids: BTreeMap<String, i64> = BTreeMap::new();
    let mut new_footnotes: Vec<NewFootnote> = Vec::new();
    for key in new_keys {
        if let Some(text) = plan.footnote_sources.get(&key) {
            footnotes.push(wml::footnote_entry(next_footnote_id, text));
            new_footnote_ids.insert(key.clone(), next_footnote_id);
            new_footnotes.push(NewFootnote {
                key,
                id: next_footnote_id,
            });
            next_footnote_id += 1;
        }
    }

    let mut change_cursor = ids::next_change_id(document);
    let body = wml::body_mut(document).ok_or(ReviseError::MissingBody)?;

    let mut applied: Vec<AppliedPatch> = Vec::new();
    let mut audit_rows: Vec<AuditRecord> = Vec::new();
    for patch in &plan.patches {
        let texts = wml::paragraph_texts(body);
        let hit = anchor::resolve(&texts, patch)?;
        let segments = tokenize(&patch.replacement);

        let paragraph = wml::paragraph_at_mut(body, hit.paragraph_index).ok_or(
            ReviseError::ParagraphOutOfRange {
                index: hit.paragraph_index,
            },
        )?;
        let old_text = wml::paragraph_text(paragraph);
        change_cursor = writer::apply_tracked_replacement(
            paragraph,
            &patch.label,
            &segments,
            &new_footnote_ids,
            change_cursor,
            &options.author,
            &options.date,
        )?;
        let new_text = wml::paragraph_text(paragraph);

        audit_rows.push(audit::build_record(
            patch,
            &hit.question,
            &segments,
            &new_footnote_ids,
            &plan.footnote_sources,
            &existing_texts,
        )?);
        applied.push(AppliedPatch {
            label: patch.label.clone(),
            paragraph_index: hit.paragraph_index,
            question: hit.question,
            old_text,
            new_text,
        });
    }

    Ok(ReviseOutcome {
        applied,
        new_footnotes,
        audit: audit_rows,
    })
}

/// Apply a plan to a package on disk, writing the revised package to
/// `output`. The input package is never modified; unrelated archive members
/// are copied through byte for byte.
pub fn revise_package(
    input: &Path,
    output: &Path,
    plan: &PatchPlan,
    options: &ReviseOptions,
) -> Result<ReviseOutcome, ReviseError> {
    let mut package = DocxPackage::open(input)?;
    let mut document = package.read_part(DOCUMENT_PART)?;
    let mut footnotes = package.read_part(FOOTNOTES_PART)?;

    let outcome = revise_trees(&mut document, &mut footnotes, plan, options)?;

    let mut replacements: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    replacements.insert(DOCUMENT_PART.to_string(), dom::serialize(&document)?);
    replacements.insert(FOOTNOTES_PART.to_string(), dom::serialize(&footnotes)?);
    package.save_with_replacements(output, &replacements)?;

    Ok(outcome)
}
