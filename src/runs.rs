//! Run-scoped artifact management.
//!
//! Every pipeline invocation gets a fresh run id and an isolated directory
//! tree. Artifacts are hashed into tab-separated manifests, runs are tracked
//! in a global index, and a lock file keeps invocations from overlapping.
//! Nothing in a run directory is ever overwritten; a reused path is an error.

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::dom::package::atomic_write;

/// Marker stamped into every manifest row so stray copies can be traced
/// back to this tool.
pub const DEFAULT_MARKER: &str = "REVISE_DOCX_PURGED_20260214";

/// Version of the artifact layout produced by this module.
pub const POLICY_VERSION: &str = "1.0";

/// Default retention policy label recorded with each run.
pub const RETENTION_POLICY: &str = "hot30_cold180";

/// Subdirectories created inside every run directory.
pub const RUN_SUBDIRS: [&str; 9] = [
    "intake",
    "sources_raw",
    "sources_parsed",
    "scope",
    "verify",
    "revision",
    "reports",
    "manifests",
    "tmp",
];

pub const SYNC_FIELDS: [&str; 9] = [
    "marker",
    "run_id",
    "phase",
    "file",
    "role",
    "status",
    "sha256",
    "size_bytes",
    "created_at",
];

pub const DELETED_FIELDS: [&str; 7] = [
    "marker",
    "run_id",
    "reason",
    "status_before",
    "status_after",
    "path",
    "deleted_at",
];

pub const ARTIFACT_FIELDS: [&str; 7] = [
    "marker",
    "run_id",
    "artifact_type",
    "path",
    "producer_script",
    "upstream_sources",
    "retention_tier",
];

pub const RUN_INDEX_FIELDS: [&str; 16] = [
    "marker",
    "run_id",
    "status",
    "run_dir",
    "started_at",
    "finished_at",
    "retention_policy",
    "manifest_sync",
    "manifest_deleted",
    "manifest_artifact",
    "source_gate_report",
    "revised_docx",
    "q_source_map",
    "revision_change_audit",
    "archive_path",
    "notes",
];

#[derive(Error, Debug)]
pub enum RunError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid run id format: {run_id}")]
    InvalidRunId { run_id: String },

    #[error("marker must be non-empty")]
    EmptyMarker,

    #[error("run directory already exists (run id reuse is not allowed): {path}")]
    RunDirExists { path: PathBuf },

    #[error("refusing to overwrite existing file: {path}")]
    Exists { path: PathBuf },

    #[error("another pipeline run appears to be active; lock file exists: {path}")]
    LockHeld { path: PathBuf },

    #[error("run index record is missing a run_id")]
    MissingRunId,

    #[error("failed to read table {path}: {source}")]
    TsvRead { path: PathBuf, source: csv::Error },

    #[error("failed to build table {path}: {source}")]
    TsvWrite { path: PathBuf, source: csv::Error },

    #[error("failed to encode run record: {source}")]
    Encode { source: serde_json::Error },
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> RunError + '_ {
    move |source| RunError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn utc_now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Mint a run id: a UTC second timestamp plus six random hex characters,
/// such as `20260214T093011Z_4FA21C`.
pub fn make_run_id() -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let noise: [u8; 3] = rand::thread_rng().gen();
    let mut suffix = String::with_capacity(6);
    for byte in noise {
        let _ = write!(suffix, "{byte:02X}");
    }
    format!("{stamp}_{suffix}")
}

/// Check the `YYYYMMDDTHHMMSSZ_XXXXXX` shape without interpreting the
/// timestamp fields.
pub fn is_valid_run_id(run_id: &str) -> bool {
    let bytes = run_id.as_bytes();
    if bytes.len() != 23 {
        return false;
    }
    bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'T'
        && bytes[9..15].iter().all(u8::is_ascii_digit)
        && bytes[15] == b'Z'
        && bytes[16] == b'_'
        && bytes[17..].iter().all(u8::is_ascii_alphanumeric)
}

/// Recover the UTC timestamp encoded in a run id prefix.
pub fn parse_run_id_time(run_id: &str) -> Result<DateTime<Utc>, RunError> {
    let invalid = || RunError::InvalidRunId {
        run_id: run_id.to_string(),
    };
    if !is_valid_run_id(run_id) {
        return Err(invalid());
    }
    NaiveDateTime::parse_from_str(&run_id[..16], "%Y%m%dT%H%M%SZ")
        .map(|naive| naive.and_utc())
        .map_err(|_| invalid())
}

pub fn validate_marker(marker: &str) -> Result<(), RunError> {
    if marker.trim().is_empty() {
        return Err(RunError::EmptyMarker);
    }
    Ok(())
}

/// Create a fresh run directory with the standard subdirectory layout.
pub fn ensure_run_layout(run_dir: &Path) -> Result<(), RunError> {
    if run_dir.exists() {
        return Err(RunError::RunDirExists {
            path: run_dir.to_path_buf(),
        });
    }
    fs::create_dir_all(run_dir).map_err(io_error(run_dir))?;
    for name in RUN_SUBDIRS {
        let subdir = run_dir.join(name);
        fs::create_dir_all(&subdir).map_err(io_error(&subdir))?;
    }
    Ok(())
}

/// SHA-256 hex digest of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String, RunError> {
    let mut file = fs::File::open(path).map_err(io_error(path))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(io_error(path))?;
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}

fn file_meta(path: &Path) -> Result<(String, u64), RunError> {
    let sha256 = sha256_file(path)?;
    let size = fs::metadata(path).map_err(io_error(path))?.len();
    Ok((sha256, size))
}

/// A manifest or index row. Fields absent from a row are written empty.
pub type TsvRow = BTreeMap<String, String>;

/// Build a row from field name and value pairs.
pub fn tsv_row(pairs: &[(&str, &str)]) -> TsvRow {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Write a tab-separated table atomically: the bytes are staged in a
/// temporary file next to the target and renamed into place.
pub fn write_tsv(path: &Path, fields: &[&str], rows: &[TsvRow]) -> Result<(), RunError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut encoded: Vec<u8> = Vec::new();
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .terminator(csv::Terminator::CRLF)
            .from_writer(&mut encoded);
        writer
            .write_record(fields)
            .map_err(|source| RunError::TsvWrite {
                path: path.to_path_buf(),
                source,
            })?;
        for row in rows {
            let values: Vec<&str> = fields
                .iter()
                .map(|field| row.get(*field).map(String::as_str).unwrap_or(""))
                .collect();
            writer
                .write_record(&values)
                .map_err(|source| RunError::TsvWrite {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        writer.flush().map_err(io_error(path))?;
    }
    atomic_write(path, &encoded).map_err(io_error(path))
}

/// Read a tab-separated table into rows keyed by header name. A missing
/// file reads as an empty table.
pub fn read_tsv(path: &Path) -> Result<Vec<TsvRow>, RunError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .map_err(|source| RunError::TsvRead {
            path: path.to_path_buf(),
            source,
        })?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| RunError::TsvRead {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| RunError::TsvRead {
            path: path.to_path_buf(),
            source,
        })?;
        let row: TsvRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.clone(), value.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Copy `src` to `dst`, creating parent directories and refusing to clobber.
pub fn copy_new(src: &Path, dst: &Path) -> Result<(), RunError> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    if dst.exists() {
        return Err(RunError::Exists {
            path: dst.to_path_buf(),
        });
    }
    fs::copy(src, dst).map_err(io_error(dst))?;
    Ok(())
}

/// Fail if a path that this run is about to produce already exists.
pub fn ensure_absent(path: &Path) -> Result<(), RunError> {
    if path.exists() {
        return Err(RunError::Exists {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Exclusive-create lock file holding the owning process id. Dropping the
/// guard removes the file.
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self, RunError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
        }
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(RunError::LockHeld {
                    path: path.to_path_buf(),
                })
            }
            Err(source) => {
                return Err(RunError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        writeln!(file, "{}", std::process::id()).map_err(io_error(path))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Terminal and in-flight states recorded in the run index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Succeeded,
    FailedGate,
    FailedRevise,
    FailedQmap,
    FailedInternal,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::FailedGate => "FAILED_GATE",
            RunStatus::FailedRevise => "FAILED_REVISE",
            RunStatus::FailedQmap => "FAILED_QMAP",
            RunStatus::FailedInternal => "FAILED_INTERNAL",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical artifact paths inside one run directory.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub run_dir: PathBuf,
    pub intake_copy: PathBuf,
    pub patch_spec_copy: PathBuf,
    pub source_report: PathBuf,
    pub run_context: PathBuf,
    pub revised_docx: PathBuf,
    pub revision_audit: PathBuf,
    pub q_source_map: PathBuf,
    pub claim_verdicts: PathBuf,
    pub sync_manifest: PathBuf,
    pub deleted_manifest: PathBuf,
    pub artifact_manifest: PathBuf,
}

impl RunPaths {
    pub fn new(run_dir: &Path, run_id: &str) -> Self {
        Self {
            run_dir: run_dir.to_path_buf(),
            intake_copy: run_dir.join("intake").join(format!("input_{run_id}.docx")),
            patch_spec_copy: run_dir.join("scope").join(format!("patch_spec_{run_id}.json")),
            source_report: run_dir
                .join("reports")
                .join(format!("source_gate_report_{run_id}.json")),
            run_context: run_dir
                .join("reports")
                .join(format!("run_context_{run_id}.json")),
            revised_docx: run_dir.join("revision").join(format!("revised_{run_id}.docx")),
            revision_audit: run_dir
                .join("revision")
                .join(format!("revision_change_audit_{run_id}.csv")),
            q_source_map: run_dir
                .join("reports")
                .join(format!("q_source_map_{run_id}.csv")),
            claim_verdicts: run_dir
                .join("verify")
                .join(format!("claim_verdicts_{run_id}.jsonl")),
            sync_manifest: run_dir
                .join("manifests")
                .join(format!("revise_sync_manifest_{run_id}.tsv")),
            deleted_manifest: run_dir
                .join("manifests")
                .join(format!("deleted_docx_manifest_{run_id}.tsv")),
            artifact_manifest: run_dir
                .join("manifests")
                .join(format!("artifact_manifest_{run_id}.tsv")),
        }
    }

    /// Paths the pipeline will create, checked up front so a partially
    /// populated directory cannot be silently extended.
    pub fn produced_paths(&self) -> [&Path; 9] {
        [
            &self.source_report,
            &self.run_context,
            &self.revised_docx,
            &self.revision_audit,
            &self.q_source_map,
            &self.claim_verdicts,
            &self.sync_manifest,
            &self.deleted_manifest,
            &self.artifact_manifest,
        ]
    }
}

/// Descriptive record written next to a run's artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub run_id: String,
    pub marker: String,
    pub run_dir: String,
    pub started_at: String,
    pub policy_version: String,
    pub retention_policy: String,
    pub patch_spec: String,
}

/// Write the run context as pretty JSON with a trailing newline.
pub fn write_run_context(path: &Path, context: &RunContext) -> Result<(), RunError> {
    let mut encoded = serde_json::to_string_pretty(context)
        .map_err(|source| RunError::Encode { source })?;
    encoded.push('\n');
    fs::write(path, encoded).map_err(io_error(path))
}

#[derive(Serialize)]
struct ClaimVerdictsPlaceholder<'a> {
    run_id: &'a str,
    status: &'a str,
    message: &'a str,
    created_at: &'a str,
}

/// Reserve the claim-verdicts artifact path with a single placeholder line
/// until a claim verifier produces real rows.
pub fn write_claim_verdicts_placeholder(
    path: &Path,
    run_id: &str,
    created_at: &str,
) -> Result<(), RunError> {
    let placeholder = ClaimVerdictsPlaceholder {
        run_id,
        status: "placeholder",
        message: "claim verifier not yet integrated; reserved artifact path",
        created_at,
    };
    let mut encoded =
        serde_json::to_string(&placeholder).map_err(|source| RunError::Encode { source })?;
    encoded.push('\n');
    fs::write(path, encoded).map_err(io_error(path))
}

pub fn no_deletions_row(marker: &str, run_id: &str, deleted_at: &str) -> TsvRow {
    tsv_row(&[
        ("marker", marker),
        ("run_id", run_id),
        ("reason", "no_deletions"),
        ("status_before", "n/a"),
        ("status_after", "n/a"),
        ("path", "n/a"),
        ("deleted_at", deleted_at),
    ])
}

/// Collects artifact and sync manifest rows for one run. Artifacts that do
/// not exist on disk are skipped, so failed phases leave gaps rather than
/// errors.
pub struct ArtifactLedger {
    marker: String,
    run_id: String,
    created_at: String,
    pub artifact_rows: Vec<TsvRow>,
    pub sync_rows: Vec<TsvRow>,
    indexed: usize,
}

impl ArtifactLedger {
    pub fn new(marker: &str, run_id: &str, created_at: &str) -> Self {
        Self {
            marker: marker.to_string(),
            run_id: run_id.to_string(),
            created_at: created_at.to_string(),
            artifact_rows: Vec::new(),
            sync_rows: Vec::new(),
            indexed: 0,
        }
    }

    pub fn indexed(&self) -> usize {
        self.indexed
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_artifact(
        &mut self,
        artifact_type: &str,
        path: &Path,
        phase: &str,
        producer: &str,
        upstream_sources: &str,
        retention_tier: &str,
        role: &str,
    ) -> Result<(), RunError> {
        if !path.exists() {
            return Ok(());
        }
        let rendered = path.display().to_string();
        self.artifact_rows.push(tsv_row(&[
            ("marker", &self.marker),
            ("run_id", &self.run_id),
            ("artifact_type", artifact_type),
            ("path", &rendered),
            ("producer_script", producer),
            ("upstream_sources", upstream_sources),
            ("retention_tier", retention_tier),
        ]));
        self.push_sync_row(phase, path, role)?;
        self.indexed += 1;
        Ok(())
    }

    /// Record a just-written manifest in the sync table only.
    pub fn record_manifest(&mut self, path: &Path, role: &str) -> Result<(), RunError> {
        self.push_sync_row("manifest", path, role)
    }

    fn push_sync_row(&mut self, phase: &str, path: &Path, role: &str) -> Result<(), RunError> {
        let (sha256, size) = file_meta(path)?;
        let rendered = path.display().to_string();
        let size = size.to_string();
        self.sync_rows.push(tsv_row(&[
            ("marker", &self.marker),
            ("run_id", &self.run_id),
            ("phase", phase),
            ("file", &rendered),
            ("role", role),
            ("status", "created"),
            ("sha256", &sha256),
            ("size_bytes", &size),
            ("created_at", &self.created_at),
        ]));
        Ok(())
    }
}

/// Insert or update one run's record in the global index, preserving the
/// order runs first appeared. An update overlays the supplied fields onto
/// the stored row.
pub fn upsert_run_record(index_path: &Path, record: &TsvRow) -> Result<(), RunError> {
    let run_id = record
        .get("run_id")
        .map(String::as_str)
        .unwrap_or_default();
    if run_id.is_empty() {
        return Err(RunError::MissingRunId);
    }

    let rows = read_tsv(index_path)?;
    let mut order: Vec<String> = Vec::new();
    let mut by_id: BTreeMap<String, TsvRow> = BTreeMap::new();
    for row in rows {
        let id = row.get("run_id").cloned().unwrap_or_default();
        if id.is_empty() {
            continue;
        }
        if !by_id.contains_key(&id) {
            order.push(id.clone());
        }
        by_id.insert(id, row);
    }

    match by_id.get_mut(run_id) {
        Some(existing) => {
            for (key, value) in record {
                existing.insert(key.clone(), value.clone());
            }
        }
        None => {
            let projected: TsvRow = RUN_INDEX_FIELDS
                .iter()
                .map(|field| {
                    (
                        field.to_string(),
                        record.get(*field).cloned().unwrap_or_default(),
                    )
                })
                .collect();
            by_id.insert(run_id.to_string(), projected);
            order.push(run_id.to_string());
        }
    }

    let output: Vec<TsvRow> = order
        .iter()
        .filter_map(|id| by_id.get(id).cloned())
        .collect();
    write_tsv(index_path, &RUN_INDEX_FIELDS, &output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_make_run_id_is_valid_and_uppercase_hex() {
        let run_id = make_run_id();
        assert!(is_valid_run_id(&run_id), "generated id {run_id}");
        let suffix = &run_id[17..];
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn test_run_id_validation_rejects_malformed_ids() {
        assert!(is_valid_run_id("20260214T093011Z_4FA21C"));
        assert!(!is_valid_run_id("20260214T093011Z_4FA21"));
        assert!(!is_valid_run_id("20260214X093011Z_4FA21C"));
        assert!(!is_valid_run_id("20260214T093011Z-4FA21C"));
        assert!(!is_valid_run_id("20260214T093011Z_4FA21Ca"));
        assert!(!is_valid_run_id(""));
    }

    #[test]
    fn test_parse_run_id_time_round_trips() {
        let parsed = parse_run_id_time("20260214T093011Z_4FA21C").unwrap();
        assert_eq!(parsed.format("%Y-%m-%dT%H:%M:%SZ").to_string(), "2026-02-14T09:30:11Z");

        let minted = make_run_id();
        let stamp = parse_run_id_time(&minted).unwrap();
        assert_eq!(minted[..16], stamp.format("%Y%m%dT%H%M%SZ").to_string());
    }

    #[test]
    fn test_parse_run_id_time_rejects_bad_ids() {
        assert!(matches!(
            parse_run_id_time("not-a-run-id"),
            Err(RunError::InvalidRunId { .. })
        ));
        // Right shape, impossible calendar date.
        assert!(matches!(
            parse_run_id_time("20261399T093011Z_4FA21C"),
            Err(RunError::InvalidRunId { .. })
        ));
    }

    #[test]
    fn test_validate_marker() {
        assert!(validate_marker(DEFAULT_MARKER).is_ok());
        assert!(matches!(validate_marker("  "), Err(RunError::EmptyMarker)));
    }

    #[test]
    fn test_run_layout_creates_subdirs_once() {
        let dir = TempDir::new().unwrap();
        let run_dir = dir.path().join("20260214T093011Z_4FA21C");
        ensure_run_layout(&run_dir).unwrap();
        for name in RUN_SUBDIRS {
            assert!(run_dir.join(name).is_dir(), "missing {name}");
        }
        assert!(matches!(
            ensure_run_layout(&run_dir),
            Err(RunError::RunDirExists { .. })
        ));
    }

    #[test]
    fn test_sha256_file_known_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_tsv_round_trip_with_missing_and_awkward_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.tsv");
        let rows = vec![
            tsv_row(&[("a", "plain"), ("b", "has\ttab")]),
            tsv_row(&[("a", "second")]),
        ];
        write_tsv(&path, &["a", "b"], &rows).unwrap();

        let read = read_tsv(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].get("b").map(String::as_str), Some("has\ttab"));
        assert_eq!(read[1].get("b").map(String::as_str), Some(""));

        assert!(read_tsv(&dir.path().join("missing.tsv")).unwrap().is_empty());
    }

    #[test]
    fn test_copy_new_refuses_to_clobber() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        fs::write(&src, b"payload").unwrap();
        let dst = dir.path().join("nested").join("dst.bin");
        copy_new(&src, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"payload");
        assert!(matches!(
            copy_new(&src, &dst),
            Err(RunError::Exists { .. })
        ));
    }

    #[test]
    fn test_lock_excludes_second_holder_and_releases_on_drop() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join(".pipeline.lock");
        let lock = RunLock::acquire(&lock_path).unwrap();
        let contents = fs::read_to_string(&lock_path).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());

        assert!(matches!(
            RunLock::acquire(&lock_path),
            Err(RunError::LockHeld { .. })
        ));

        drop(lock);
        assert!(!lock_path.exists());
        let _again = RunLock::acquire(&lock_path).unwrap();
    }

    #[test]
    fn test_run_paths_use_run_scoped_names() {
        let paths = RunPaths::new(Path::new("runs/20260214T093011Z_4FA21C"), "20260214T093011Z_4FA21C");
        assert!(paths
            .revised_docx
            .ends_with("revision/revised_20260214T093011Z_4FA21C.docx"));
        assert!(paths
            .sync_manifest
            .ends_with("manifests/revise_sync_manifest_20260214T093011Z_4FA21C.tsv"));
        assert!(paths
            .claim_verdicts
            .ends_with("verify/claim_verdicts_20260214T093011Z_4FA21C.jsonl"));
        assert_eq!(paths.produced_paths().len(), 9);
    }

    #[test]
    fn test_upsert_preserves_first_seen_order_and_merges() {
        let dir = TempDir::new().unwrap();
        let index = dir.path().join("run_index.tsv");

        let mut first = tsv_row(&[
            ("marker", DEFAULT_MARKER),
            ("run_id", "20260214T093011Z_AAAAAA"),
            ("status", "RUNNING"),
            ("run_dir", "runs/a"),
            ("unknown_extra", "dropped"),
        ]);
        first.insert("started_at".to_string(), "2026-02-14T09:30:11Z".to_string());
        upsert_run_record(&index, &first).unwrap();

        let second = tsv_row(&[
            ("marker", DEFAULT_MARKER),
            ("run_id", "20260214T100000Z_BBBBBB"),
            ("status", "RUNNING"),
        ]);
        upsert_run_record(&index, &second).unwrap();

        let update = tsv_row(&[
            ("run_id", "20260214T093011Z_AAAAAA"),
            ("status", "SUCCEEDED"),
            ("finished_at", "2026-02-14T09:31:00Z"),
        ]);
        upsert_run_record(&index, &update).unwrap();

        let rows = read_tsv(&index).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].get("run_id").map(String::as_str),
            Some("20260214T093011Z_AAAAAA")
        );
        assert_eq!(rows[0].get("status").map(String::as_str), Some("SUCCEEDED"));
        assert_eq!(rows[0].get("run_dir").map(String::as_str), Some("runs/a"));
        assert_eq!(
            rows[0].get("finished_at").map(String::as_str),
            Some("2026-02-14T09:31:00Z")
        );
        assert_eq!(rows[0].get("unknown_extra"), None);
        assert_eq!(
            rows[1].get("run_id").map(String::as_str),
            Some("20260214T100000Z_BBBBBB")
        );

        let no_id = tsv_row(&[("status", "RUNNING")]);
        assert!(matches!(
            upsert_run_record(&index, &no_id),
            Err(RunError::MissingRunId)
        ));
    }

    #[test]
    fn test_ledger_skips_missing_and_hashes_present_files() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("artifact.json");
        fs::write(&present, b"{}\n").unwrap();

        let mut ledger = ArtifactLedger::new(DEFAULT_MARKER, "20260214T093011Z_4FA21C", "2026-02-14T09:31:00Z");
        ledger
            .record_artifact(
                "source_gate_report",
                &dir.path().join("never_written.json"),
                "gate",
                "gate",
                "",
                "HOT",
                "source_gate_report",
            )
            .unwrap();
        assert_eq!(ledger.indexed(), 0);
        assert!(ledger.artifact_rows.is_empty());

        ledger
            .record_artifact(
                "run_context",
                &present,
                "reports",
                "pipeline",
                "",
                "PERMANENT",
                "run_context",
            )
            .unwrap();
        assert_eq!(ledger.indexed(), 1);
        assert_eq!(ledger.artifact_rows.len(), 1);
        assert_eq!(ledger.sync_rows.len(), 1);
        let sync = &ledger.sync_rows[0];
        assert_eq!(sync.get("status").map(String::as_str), Some("created"));
        assert_eq!(sync.get("size_bytes").map(String::as_str), Some("3"));
        assert_eq!(sync.get("sha256").map(|h| h.len()), Some(64));

        ledger.record_manifest(&present, "artifact_manifest").unwrap();
        assert_eq!(ledger.sync_rows.len(), 2);
        assert_eq!(
            ledger.sync_rows[1].get("phase").map(String::as_str),
            Some("manifest")
        );
        assert_eq!(ledger.indexed(), 1);
    }

    #[test]
    fn test_claim_placeholder_and_run_context_files() {
        let dir = TempDir::new().unwrap();
        let verdicts = dir.path().join("claim_verdicts.jsonl");
        write_claim_verdicts_placeholder(&verdicts, "20260214T093011Z_4FA21C", "2026-02-14T09:31:00Z").unwrap();
        let line = fs::read_to_string(&verdicts).unwrap();
        assert!(line.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(parsed["status"], "placeholder");
        assert_eq!(parsed["run_id"], "20260214T093011Z_4FA21C");

        let context_path = dir.path().join("run_context.json");
        let context = RunContext {
            run_id: "20260214T093011Z_4FA21C".to_string(),
            marker: DEFAULT_MARKER.to_string(),
            run_dir: "runs/20260214T093011Z_4FA21C".to_string(),
            started_at: "2026-02-14T09:30:11Z".to_string(),
            policy_version: POLICY_VERSION.to_string(),
            retention_policy: RETENTION_POLICY.to_string(),
            patch_spec: "scope/patch_spec.json".to_string(),
        };
        write_run_context(&context_path, &context).unwrap();
        let text = fs::read_to_string(&context_path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["policy_version"], "1.0");
        assert_eq!(parsed["retention_policy"], "hot30_cold180");
    }

    #[test]
    fn test_no_deletions_row_shape() {
        let row = no_deletions_row(DEFAULT_MARKER, "20260214T093011Z_4FA21C", "2026-02-14T09:31:00Z");
        assert_eq!(row.get("reason").map(String::as_str), Some("no_deletions"));
        assert_eq!(row.get("path").map(String::as_str), Some("n/a"));
        assert_eq!(row.len(), DELETED_FIELDS.len());
    }
}
