//! Patch plan: JSON schema, loading, and replacement tokenization.

pub mod loader;
pub mod schema;
pub mod tokens;

pub use loader::{load_from_path, load_from_str, PlanError};
pub use schema::{MatchMode, Patch, PatchPlan};
pub use tokens::{tokenize, FootnoteRef, Segment};
