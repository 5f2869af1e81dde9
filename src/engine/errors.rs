use crate::dom::DomError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating or applying a revision plan.
///
/// Every variant is deterministic for a given document and plan; nothing
/// here is retryable. Validation and resolution failures surface before any
/// output is written.
#[derive(Error, Debug)]
pub enum ReviseError {
    #[error("every patch must include a non-empty label")]
    EmptyLabel,

    #[error("duplicate patch label: {label}")]
    DuplicateLabel { label: String },

    #[error("patch '{label}' has an empty anchor")]
    EmptyAnchor { label: String },

    #[error("patch '{label}' has an empty replacement")]
    EmptyReplacement { label: String },

    #[error("patch '{label}' has an empty reason")]
    EmptyReason { label: String },

    #[error("patch '{label}' references unknown footnote key '{key}'; define it under footnote_sources in the patch plan")]
    UnknownFootnoteKey { label: String, key: String },

    #[error("patch '{label}' has a non-numeric existing footnote id: {value}")]
    InvalidFootnoteId { label: String, value: String },

    #[error("patch '{label}' references missing existing footnote id: {id}")]
    MissingFootnoteId { label: String, id: i64 },

    #[error("patch '{label}' has no verifiable source footnote reference")]
    UnverifiedEdit { label: String },

    #[error("patch '{label}' did not match any paragraph for anchor '{anchor}'{}", question_suffix(.question_anchor))]
    AnchorNotFound {
        label: String,
        anchor: String,
        question_anchor: Option<String>,
    },

    #[error("patch '{label}' matched {count} paragraphs (indices {preview}); refine the anchor or question anchor, or use exact match mode")]
    AmbiguousAnchor {
        label: String,
        count: usize,
        preview: String,
    },

    #[error("document already contains tracked revisions (insertions: {ins_count}, deletions: {del_count}); revise the clean baseline or allow incremental patching")]
    AlreadyRevised { ins_count: usize, del_count: usize },

    #[error("document has no body element")]
    MissingBody,

    #[error("paragraph index {index} is out of range")]
    ParagraphOutOfRange { index: usize },

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error("failed to build audit table: {source}")]
    AuditCsv { source: csv::Error },

    #[error("failed to write audit table {path}: {source}")]
    AuditIo {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn question_suffix(question_anchor: &Option<String>) -> String {
    match question_anchor {
        Some(question) => format!(" and question anchor '{question}'"),
        None => String::new(),
    }
}
