//! Integration tests for the CLI
//!
//! Shells out to the binary for the revise, gate, qmap, query, and pipeline
//! commands and checks output paths, console reporting, and exit codes.

mod common;

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_cli(args: &[&str]) -> Output {
    let mut full = vec!["run", "--quiet", "--"];
    full.extend_from_slice(args);
    Command::new("cargo").args(&full).output().unwrap()
}

/// Run the binary with `dir` as the working directory. The pipeline command
/// lays out `runs/`, `archive/`, and `reports/` relative to where it runs.
fn run_cli_in(dir: &Path, args: &[&str]) -> Output {
    let manifest = concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml");
    let mut full = vec!["run", "--quiet", "--manifest-path", manifest, "--"];
    full.extend_from_slice(args);
    Command::new("cargo")
        .args(&full)
        .current_dir(dir)
        .output()
        .unwrap()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_revise_help() {
    let output = run_cli(&["revise", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Apply tracked revisions"));
    assert!(stdout.contains("--allow-incremental"));
}

#[test]
fn test_revise_basic() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.docx");
    let output_docx = dir.path().join("revised.docx");
    let audit_csv = dir.path().join("audit.csv");
    common::write_faq_docx(&input);
    let spec = dir.path().join("patch_spec.json");
    fs::write(&spec, common::faq_patch_spec()).unwrap();

    let output = run_cli(&[
        "revise",
        "--input-docx",
        path_str(&input),
        "--patch-spec",
        path_str(&spec),
        "--output-docx",
        path_str(&output_docx),
        "--audit-csv",
        path_str(&audit_csv),
        "--date",
        "2026-02-12T12:00:00Z",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Applied patches: p1, p2"));
    assert!(stdout.contains("New footnotes: report=3"));

    assert!(output_docx.exists());
    let audit = fs::read_to_string(&audit_csv).unwrap();
    assert!(audit.contains("Patch_Label"));
    assert!(audit.contains("fn:report"));
}

#[test]
fn test_revise_refuses_revised_input_with_exit_code_three() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.docx");
    let first = dir.path().join("first.docx");
    let second = dir.path().join("second.docx");
    common::write_faq_docx(&input);
    let spec = dir.path().join("patch_spec.json");
    fs::write(&spec, common::faq_patch_spec()).unwrap();

    let output = run_cli(&[
        "revise",
        "--input-docx",
        path_str(&input),
        "--patch-spec",
        path_str(&spec),
        "--output-docx",
        path_str(&first),
    ]);
    assert!(output.status.success());

    let output = run_cli(&[
        "revise",
        "--input-docx",
        path_str(&first),
        "--patch-spec",
        path_str(&spec),
        "--output-docx",
        path_str(&second),
    ]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already contains tracked revisions"));
    assert!(stderr.contains("--allow-incremental"));
    assert!(!second.exists());
}

#[test]
fn test_revise_rejects_citation_less_patch() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.docx");
    common::write_faq_docx(&input);
    let spec = dir.path().join("patch_spec.json");
    fs::write(
        &spec,
        r#"{
  "patches": [
    {
      "label": "uncited",
      "anchor": "Risk is low.",
      "replacement": "Risk is moderate.",
      "reason": "No evidence attached."
    }
  ]
}"#,
    )
    .unwrap();

    let output_docx = dir.path().join("revised.docx");
    let output = run_cli(&[
        "revise",
        "--input-docx",
        path_str(&input),
        "--patch-spec",
        path_str(&spec),
        "--output-docx",
        path_str(&output_docx),
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("uncited"));
    assert!(!output_docx.exists());
}

#[test]
fn test_qmap_and_query_on_revised_document() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.docx");
    let revised = dir.path().join("revised.docx");
    common::write_faq_docx(&input);
    let spec = dir.path().join("patch_spec.json");
    fs::write(&spec, common::faq_patch_spec()).unwrap();

    let output = run_cli(&[
        "revise",
        "--input-docx",
        path_str(&input),
        "--patch-spec",
        path_str(&spec),
        "--output-docx",
        path_str(&revised),
    ]);
    assert!(output.status.success());

    let map_csv = dir.path().join("q_source_map.csv");
    let output = run_cli(&[
        "qmap",
        "--input-docx",
        path_str(&revised),
        "--output-csv",
        path_str(&map_csv),
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Q count: 2"));
    let map = fs::read_to_string(&map_csv).unwrap();
    assert!(map.contains("Q_no,Question,Footnote_IDs,Sources,Has_Source"));
    assert!(map.contains("YES"));

    let output = run_cli(&["query", "--input-docx", path_str(&revised), "--q", "1"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Q1: Q1. What is the current risk level?"));
    assert!(stdout.contains("[3] Supervisory Review 2026, section 3.1."));

    let output = run_cli(&["query", "--input-docx", path_str(&revised), "--q", "9"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Q9 out of range. Available: Q1..Q2"));
}

#[test]
fn test_gate_fails_on_unreachable_required_source() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("sources.json");
    fs::write(
        &config,
        r#"{
  "required_sources": {
    "annual_report": {
      "type": "local_pdf",
      "path": "/nonexistent/annual_report.pdf",
      "must_include": ["independent review"]
    }
  }
}"#,
    )
    .unwrap();

    let report_json = dir.path().join("gate_report.json");
    let output = run_cli(&[
        "gate",
        "--config",
        path_str(&config),
        "--output-json",
        path_str(&report_json),
    ]);
    assert_eq!(output.status.code(), Some(2));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_json).unwrap()).unwrap();
    assert_eq!(report["all_required_passed"], false);
    assert_eq!(report["required_failed_count"], 1);
    assert_eq!(report["results"][0]["source_id"], "annual_report");
    assert_eq!(report["results"][0]["reachable"], false);
}

#[test]
fn test_gate_passes_when_no_required_source_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("sources.json");
    fs::write(
        &config,
        r#"{
  "optional_sources": {
    "nice_to_have": {
      "type": "local_pdf",
      "path": "/nonexistent/optional.pdf",
      "must_include": ["context"]
    }
  }
}"#,
    )
    .unwrap();

    let output = run_cli(&["gate", "--config", path_str(&config)]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"all_required_passed\": true"));
}

#[test]
fn test_pipeline_run_succeeds_and_records_index_row() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.docx");
    common::write_faq_docx(&input);
    let spec = dir.path().join("patch_spec.json");
    fs::write(&spec, common::faq_patch_spec()).unwrap();
    let sources = dir.path().join("sources.json");
    fs::write(&sources, "{}").unwrap();

    let run_id = "20260214T093011Z_4FA21C";
    let output = run_cli_in(
        dir.path(),
        &[
            "pipeline",
            "--input-docx",
            path_str(&input),
            "--patch-spec",
            path_str(&spec),
            "--source-config",
            path_str(&sources),
            "--run-id",
            run_id,
            "--date",
            "2026-02-14T09:30:11Z",
        ],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("Run ID: {run_id}")));
    assert!(stdout.contains("Status: SUCCEEDED"));

    let run_dir = dir.path().join("runs").join(run_id);
    assert!(run_dir
        .join("revision")
        .join(format!("revised_{run_id}.docx"))
        .exists());
    assert!(run_dir
        .join("reports")
        .join(format!("q_source_map_{run_id}.csv"))
        .exists());
    let verdicts = fs::read_to_string(
        run_dir
            .join("verify")
            .join(format!("claim_verdicts_{run_id}.jsonl")),
    )
    .unwrap();
    assert_eq!(verdicts.lines().count(), 1);
    assert!(verdicts.contains("\"placeholder\""));

    let deleted = fs::read_to_string(
        run_dir
            .join("manifests")
            .join(format!("deleted_docx_manifest_{run_id}.tsv")),
    )
    .unwrap();
    assert!(deleted.contains("no_deletions"));

    let index = fs::read_to_string(dir.path().join("reports").join("run_index.tsv")).unwrap();
    assert!(index.contains(run_id));
    assert!(index.contains("SUCCEEDED"));
    assert!(!index.contains("RUNNING"));

    // The single-run lock is released once the run reaches a terminal status.
    assert!(!dir.path().join(".pipeline.lock").exists());
}

#[test]
fn test_pipeline_gate_failure_reaches_failed_gate_status() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.docx");
    common::write_faq_docx(&input);
    let spec = dir.path().join("patch_spec.json");
    fs::write(&spec, common::faq_patch_spec()).unwrap();
    let sources = dir.path().join("sources.json");
    fs::write(
        &sources,
        r#"{
  "required_sources": {
    "annual_report": {
      "type": "local_pdf",
      "path": "/nonexistent/annual_report.pdf",
      "must_include": ["independent review"]
    }
  }
}"#,
    )
    .unwrap();

    let run_id = "20260214T101500Z_0B11EE";
    let output = run_cli_in(
        dir.path(),
        &[
            "pipeline",
            "--input-docx",
            path_str(&input),
            "--patch-spec",
            path_str(&spec),
            "--source-config",
            path_str(&sources),
            "--run-id",
            run_id,
        ],
    );
    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Status: FAILED_GATE"));

    let run_dir = dir.path().join("runs").join(run_id);
    assert!(!run_dir
        .join("revision")
        .join(format!("revised_{run_id}.docx"))
        .exists());

    let index = fs::read_to_string(dir.path().join("reports").join("run_index.tsv")).unwrap();
    assert!(index.contains(run_id));
    assert!(index.contains("FAILED_GATE"));
    assert!(!dir.path().join(".pipeline.lock").exists());
}
