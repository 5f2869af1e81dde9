//! Audit trail rows for applied patches.
//!
//! One row per patch, written as a CSV with a UTF-8 byte order mark and CRLF
//! line endings so spreadsheet tools open it without an import dialog.

use crate::engine::errors::ReviseError;
use crate::plan::{FootnoteRef, Patch, Segment};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    #[serde(rename = "Patch_Label")]
    pub patch_label: String,
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Reason_One_Sentence")]
    pub reason: String,
    #[serde(rename = "Source_Refs")]
    pub source_refs: String,
    #[serde(rename = "Source_Footnote_IDs")]
    pub source_footnote_ids: String,
    #[serde(rename = "Source_Details")]
    pub source_details: String,
}

/// Build the audit row for one applied patch.
///
/// `new_footnote_ids` maps new footnote keys to their assigned ids and
/// `existing_texts` carries the text of footnotes already in the document;
/// an existing id with no recorded text contributes an empty detail, which
/// the detail join then drops.
pub fn build_record(
    patch: &Patch,
    question: &str,
    segments: &[Segment],
    new_footnote_ids: &BTreeMap<String, i64>,
    new_sources: &BTreeMap<String, String>,
    existing_texts: &BTreeMap<i64, String>,
) -> Result<AuditRecord, ReviseError> {
    let mut refs: Vec<String> = Vec::new();
    let mut ids: Vec<String> = Vec::new();
    let mut details: Vec<String> = Vec::new();

    for segment in segments {
        let reference = match segment {
            Segment::Text(_) => continue,
            Segment::Footnote(reference) => reference,
        };
        match reference {
            FootnoteRef::New { key } => {
                let id = new_footnote_ids.get(key).copied().ok_or_else(|| {
                    ReviseError::UnknownFootnoteKey {
                        label: patch.label.clone(),
                        key: key.clone(),
                    }
                })?;
                refs.push(format!("fn:{key}"));
                ids.push(id.to_string());
                details.push(new_sources.get(key).cloned().unwrap_or_default());
            }
            FootnoteRef::Existing { id } => {
                let parsed = id
                    .parse::<i64>()
                    .map_err(|_| ReviseError::InvalidFootnoteId {
                        label: patch.label.clone(),
                        value: id.clone(),
                    })?;
                refs.push(format!("fnid:{parsed}"));
                ids.push(parsed.to_string());
                details.push(existing_texts.get(&parsed).cloned().unwrap_or_default());
            }
        }
    }

    Ok(AuditRecord {
        patch_label: patch.label.clone(),
        question: question.to_string(),
        reason: patch.reason.clone(),
        source_refs: refs.join(","),
        source_footnote_ids: ids.join(","),
        source_details: details
            .into_iter()
            .filter(|detail| !detail.is_empty())
            .collect::<Vec<_>>()
            .join(" | "),
    })
}

/// Write audit rows to `path`, prefixed with a UTF-8 byte order mark.
pub fn write_audit_csv(path: &Path, records: &[AuditRecord]) -> Result<(), ReviseError> {
    let mut encoded: Vec<u8> = vec![0xef, 0xbb, 0xbf];
    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::CRLF)
            .from_writer(&mut encoded);
        writer
            .write_record([
                "Patch_Label",
                "Question",
                "Reason_One_Sentence",
                "Source_Refs",
                "Source_Footnote_IDs",
                "Source_Details",
            ])
            .map_err(|source| ReviseError::AuditCsv { source })?;
        for record in records {
            writer
                .serialize(record)
                .map_err(|source| ReviseError::AuditCsv { source })?;
        }
        writer.flush().map_err(|source| ReviseError::AuditIo {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, &encoded).map_err(|source| ReviseError::AuditIo {
        path: path.to_path_buf(),
        source,
    })
}
