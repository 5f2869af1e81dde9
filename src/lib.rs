//! Docx Reviser: evidence-gated tracked revisions for DOCX documents
//!
//! A review automation engine built on tracked-change primitives
//! (`w:del` / `w:ins`) with footnote citation plumbing, a pre-apply
//! patch policy, a question-to-source mapper, and run-scoped artifact
//! manifests.
//!
//! # Architecture
//!
//! All edits compile down to a single primitive: a tracked replacement
//! of one paragraph's text, expressed as a delete block for the old
//! run content followed by an insert block carrying the replacement
//! text with footnote references interleaved. Intelligence lives in
//! patch validation and anchor resolution, not in the XML surgery.
//!
//! # Safety
//!
//! - Every patch is validated against the whole-plan policy before any
//!   tree is touched
//! - Inputs that already carry tracked revisions are rejected unless
//!   incremental mode is requested
//! - Atomic file writes (tempfile + persist) for packages and manifests
//! - Unmatched or ambiguous anchors abort the run with the candidate
//!   paragraph indices in the error
//!
//! # Example
//!
//! ```no_run
//! use docx_reviser::{revise_package, ReviseOptions};
//! use docx_reviser::plan::load_from_path;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let plan = load_from_path(Path::new("patch_spec.json"))?;
//! let options = ReviseOptions::new(None, None, false);
//! let outcome = revise_package(
//!     Path::new("input.docx"),
//!     Path::new("revised.docx"),
//!     &plan,
//!     &options,
//! )?;
//! println!("applied {} patches", outcome.applied.len());
//! # Ok(())
//! # }
//! ```

pub mod dom;
pub mod engine;
pub mod gate;
pub mod plan;
pub mod qmap;
pub mod runs;

// Re-exports
pub use engine::{
    default_date, revise_package, revise_trees, write_audit_csv, AppliedPatch, AuditRecord,
    NewFootnote, ReviseError, ReviseOptions, ReviseOutcome, DEFAULT_AUTHOR,
};
pub use gate::{
    CheckResult, GateConfig, GateError, GateReport, SourceChecker, SourceSpec, SourceTier,
};
pub use plan::{
    load_from_path, load_from_str, tokenize, FootnoteRef, MatchMode, Patch, PatchPlan, PlanError,
    Segment,
};
pub use qmap::{
    build_question_map, query_package_question, write_question_map_csv, QmapError, QueryOutcome,
    QuestionRow, QuestionSources,
};
