//! Tracked-revision engine.
//!
//! Applies a validated patch plan to a document as tracked deletions and
//! insertions, materializes cited footnotes, and produces an audit row per
//! patch. The submodules run in a fixed pipeline: [`policy`] validates the
//! plan, [`ids`] scans existing numbering, [`anchor`] resolves each patch to
//! one paragraph, [`writer`] rewrites it, and [`audit`] records what changed.

pub mod anchor;
pub mod applicator;
pub mod audit;
pub mod errors;
pub mod ids;
pub mod policy;
pub mod writer;

pub use applicator::{
    default_date, revise_package, revise_trees, AppliedPatch, NewFootnote, ReviseOptions,
    ReviseOutcome, DEFAULT_AUTHOR,
};
pub use audit::{write_audit_csv, AuditRecord};
pub use errors::ReviseError;
