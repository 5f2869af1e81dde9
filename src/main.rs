use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use docx_reviser::engine::{self, ReviseError, ReviseOptions, DEFAULT_AUTHOR};
use docx_reviser::gate::{self, GateConfig, SourceChecker};
use docx_reviser::plan;
use docx_reviser::qmap::{self, QueryOutcome};
use docx_reviser::runs::{self, RunPaths, RunStatus};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};

const RUNS_ROOT: &str = "runs";
const ARCHIVE_DIR: &str = "archive";
const REPORTS_DIR: &str = "reports";
const RUN_INDEX_FILE: &str = "run_index.tsv";
const LOCK_FILE: &str = ".pipeline.lock";

#[derive(Parser)]
#[command(name = "docx-reviser")]
#[command(about = "Evidence-gated tracked revisions for DOCX documents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply tracked revisions from a patch plan to a DOCX document
    Revise(ReviseArgs),

    /// Check the evidence sources named by a gate config
    Gate(GateArgs),

    /// Build the question-to-source map from a revised DOCX
    Qmap(QmapArgs),

    /// Show the cited sources for one question
    Query(QueryArgs),

    /// Run gate, revise, and qmap as one locked, indexed run
    Pipeline(PipelineArgs),
}

#[derive(Args)]
struct ReviseArgs {
    /// Input DOCX to revise
    #[arg(long)]
    input_docx: PathBuf,

    /// Patch plan JSON with patches and source footnote texts
    #[arg(long)]
    patch_spec: PathBuf,

    /// Output DOCX path. Defaults to <run-dir>/revision/revised_<run-id>.docx
    /// when --run-dir and --run-id are set
    #[arg(long)]
    output_docx: Option<PathBuf>,

    /// Extra copy destination for the revised DOCX
    #[arg(long)]
    copy_to: Option<PathBuf>,

    /// Run directory root used to derive default output paths
    #[arg(long)]
    run_dir: Option<PathBuf>,

    /// Run id in YYYYMMDDTHHMMSSZ_XXXXXX form
    #[arg(long)]
    run_id: Option<String>,

    /// Per-change audit table. Defaults next to the output DOCX
    #[arg(long)]
    audit_csv: Option<PathBuf>,

    /// Permit an input DOCX that already contains tracked revisions
    #[arg(long)]
    allow_incremental: bool,

    /// Author recorded on every tracked change
    #[arg(long, default_value = DEFAULT_AUTHOR)]
    author: String,

    /// Revision timestamp in ISO-8601, e.g. 2026-02-12T12:00:00Z.
    /// Defaults to the current UTC time
    #[arg(long)]
    date: Option<String>,

    /// Show a line diff of every revised paragraph
    #[arg(long)]
    diff: bool,
}

#[derive(Args)]
struct GateArgs {
    /// Gate config JSON with required and optional sources
    #[arg(long)]
    config: PathBuf,

    /// Report destination. Defaults to
    /// <run-dir>/reports/source_gate_report_<run-id>.json when --run-dir
    /// and --run-id are set
    #[arg(long)]
    output_json: Option<PathBuf>,

    /// Run directory root used to derive the default report path
    #[arg(long)]
    run_dir: Option<PathBuf>,

    /// Run id in YYYYMMDDTHHMMSSZ_XXXXXX form
    #[arg(long)]
    run_id: Option<String>,
}

#[derive(Args)]
struct QmapArgs {
    /// Input DOCX, normally a revised document
    #[arg(long)]
    input_docx: PathBuf,

    /// Output CSV path. Defaults to <run-dir>/reports/q_source_map_<run-id>.csv
    /// when --run-dir and --run-id are set
    #[arg(long)]
    output_csv: Option<PathBuf>,

    /// Run directory root used to derive the default output path
    #[arg(long)]
    run_dir: Option<PathBuf>,

    /// Run id in YYYYMMDDTHHMMSSZ_XXXXXX form
    #[arg(long)]
    run_id: Option<String>,
}

#[derive(Args)]
struct QueryArgs {
    /// Input DOCX, normally a revised document
    #[arg(long)]
    input_docx: PathBuf,

    /// Question order number in the document body (Q1..Qn)
    #[arg(long)]
    q: i64,
}

#[derive(Args)]
struct PipelineArgs {
    /// Input DOCX to revise
    #[arg(long)]
    input_docx: PathBuf,

    /// Patch plan JSON with patches and source footnote texts
    #[arg(long)]
    patch_spec: PathBuf,

    /// Run id to use instead of generating one
    #[arg(long)]
    run_id: Option<String>,

    /// Run directory. Must equal runs/<run-id> when given
    #[arg(long)]
    run_dir: Option<PathBuf>,

    /// Governance marker stamped into every manifest row
    #[arg(long, default_value = runs::DEFAULT_MARKER)]
    marker: String,

    /// Mirror directory for the run manifests
    #[arg(long, default_value = REPORTS_DIR)]
    manifest_dir: PathBuf,

    /// Retention policy recorded in the run index
    #[arg(long, default_value = runs::RETENTION_POLICY)]
    retention_policy: String,

    /// Gate config JSON with required and optional sources
    #[arg(long, default_value = "config/revise_sources.json")]
    source_config: PathBuf,

    /// Author recorded on every tracked change
    #[arg(long, default_value = DEFAULT_AUTHOR)]
    author: String,

    /// Revision timestamp in ISO-8601. Defaults to the current UTC time
    #[arg(long)]
    date: Option<String>,

    /// Continue into revision even when a required source fails the gate
    #[arg(long)]
    allow_required_fail: bool,

    /// Permit an input DOCX that already contains tracked revisions
    #[arg(long)]
    allow_incremental: bool,

    /// Optional extra copy destination for the revised DOCX
    #[arg(long)]
    output_docx: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Revise(args) => cmd_revise(args),

        Commands::Gate(args) => cmd_gate(args),

        Commands::Qmap(args) => cmd_qmap(args),

        Commands::Query(args) => cmd_query(args),

        Commands::Pipeline(args) => cmd_pipeline(args),
    }
}

/// Helper: Report a bad flag combination with the argument parser's exit code.
fn usage_error(message: &str) -> ! {
    eprintln!("error: {message}");
    std::process::exit(2);
}

/// Helper: Audit table path derived from the output DOCX name.
fn sibling_audit_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}_change_audit.csv"))
}

/// Helper: Stable form of a path for equality checks. Canonicalizes the path
/// itself or, for paths that do not exist yet, the parent directory.
fn resolved(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => parent.join(name),
            Err(_) => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// Helper: Show a line diff between the original and revised paragraph text.
fn display_diff(label: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {label} (original)").dimmed());
    println!("{}", format!("+++ {label} (revised)").dimmed());

    // Paragraph text carries no newline of its own; append one so the diff
    // renders each side as a full line.
    let original = format!("{original}\n");
    let modified = format!("{modified}\n");
    let diff = TextDiff::from_lines(&original, &modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{change}").red(),
            ChangeTag::Insert => format!("+{change}").green(),
            ChangeTag::Equal => format!(" {change}").normal(),
        };
        print!("{sign}");
    }
}

fn cmd_revise(args: ReviseArgs) -> Result<()> {
    // 1. Resolve the output and audit destinations
    if let Some(run_id) = args.run_id.as_deref() {
        if !runs::is_valid_run_id(run_id) {
            usage_error(&format!("Invalid --run-id format: {run_id}"));
        }
    }
    let output_docx = match args.output_docx {
        Some(path) => path,
        None => match (args.run_dir.as_deref(), args.run_id.as_deref()) {
            (Some(dir), Some(id)) => dir.join("revision").join(format!("revised_{id}.docx")),
            _ => usage_error(
                "--output-docx is required unless both --run-dir and --run-id are provided",
            ),
        },
    };

    if !args.input_docx.exists() {
        eprintln!("Input docx not found: {}", args.input_docx.display());
        std::process::exit(1);
    }
    if !args.patch_spec.exists() {
        eprintln!("Patch spec not found: {}", args.patch_spec.display());
        std::process::exit(1);
    }

    if let Some(parent) = output_docx.parent() {
        fs::create_dir_all(parent)?;
    }
    let audit_csv = match args.audit_csv {
        Some(path) => path,
        None => match (args.run_dir.as_deref(), args.run_id.as_deref()) {
            (Some(dir), Some(id)) => dir
                .join("revision")
                .join(format!("revision_change_audit_{id}.csv")),
            _ => sibling_audit_path(&output_docx),
        },
    };

    // 2. Load the patch plan
    let patch_plan = plan::load_from_path(&args.patch_spec)?;

    // 3. Apply tracked revisions
    let options = ReviseOptions::new(Some(args.author), args.date, args.allow_incremental);
    let outcome = match engine::revise_package(&args.input_docx, &output_docx, &patch_plan, &options)
    {
        Ok(outcome) => outcome,
        Err(ReviseError::AlreadyRevised {
            ins_count,
            del_count,
        }) => {
            eprintln!(
                "Input DOCX already contains tracked revisions \
                 (w:ins={ins_count}, w:del={del_count}). \
                 For a full re-cut, use the original clean baseline DOCX. \
                 If you intentionally want incremental patching, pass --allow-incremental."
            );
            std::process::exit(3);
        }
        Err(err) => return Err(err.into()),
    };

    // 4. Write the audit table
    if let Some(parent) = audit_csv.parent() {
        fs::create_dir_all(parent)?;
    }
    engine::write_audit_csv(&audit_csv, &outcome.audit)?;

    // 5. Optional extra copy
    if let Some(copy_to) = args.copy_to.as_deref() {
        if let Some(parent) = copy_to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&output_docx, copy_to)?;
    }

    // 6. Report per patch, then the output paths
    for applied in &outcome.applied {
        if applied.question.is_empty() {
            println!(
                "{} {}: paragraph {}",
                "✓".green(),
                applied.label,
                applied.paragraph_index
            );
        } else {
            println!(
                "{} {}: paragraph {} ({})",
                "✓".green(),
                applied.label,
                applied.paragraph_index,
                applied.question.dimmed()
            );
        }
        if args.diff {
            display_diff(&applied.label, &applied.old_text, &applied.new_text);
        }
    }
    println!();

    let labels: Vec<&str> = outcome
        .applied
        .iter()
        .map(|applied| applied.label.as_str())
        .collect();
    println!("Applied patches: {}", labels.join(", "));
    println!("Output: {}", output_docx.display());
    if let Some(copy_to) = args.copy_to.as_deref() {
        println!("Copy: {}", copy_to.display());
    }
    let new_footnotes: Vec<String> = outcome
        .new_footnotes
        .iter()
        .map(|footnote| format!("{}={}", footnote.key, footnote.id))
        .collect();
    if new_footnotes.is_empty() {
        println!("New footnotes: (none)");
    } else {
        println!("New footnotes: {}", new_footnotes.join(", "));
    }
    println!("Change audit: {}", audit_csv.display());

    Ok(())
}

fn cmd_gate(args: GateArgs) -> Result<()> {
    // 1. Resolve the report destination
    let mut output_json = args.output_json;
    if output_json.is_none() {
        if let Some(dir) = args.run_dir.as_deref() {
            let run_id = match args.run_id.as_deref() {
                Some(id) => id,
                None => {
                    usage_error("--run-id is required when --run-dir is used without --output-json")
                }
            };
            if !runs::is_valid_run_id(run_id) {
                usage_error(&format!("Invalid --run-id format: {run_id}"));
            }
            output_json = Some(
                dir.join("reports")
                    .join(format!("source_gate_report_{run_id}.json")),
            );
        }
    }

    // 2. Run the checks
    let config = GateConfig::load(&args.config)?;
    let checker = SourceChecker::new()?;
    let report = checker.run(&config);

    // 3. Print the report, persist it when a destination is set
    println!("{}", serde_json::to_string_pretty(&report)?);
    if let Some(path) = output_json.as_deref() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        gate::write_report(path, &report)?;
    }

    if !report.all_required_passed {
        std::process::exit(2);
    }
    Ok(())
}

fn cmd_qmap(args: QmapArgs) -> Result<()> {
    // 1. Resolve the output destination
    let output_csv = match args.output_csv {
        Some(path) => path,
        None => match (args.run_dir.as_deref(), args.run_id.as_deref()) {
            (Some(dir), Some(id)) => {
                if !runs::is_valid_run_id(id) {
                    usage_error(&format!("Invalid --run-id format: {id}"));
                }
                dir.join("reports").join(format!("q_source_map_{id}.csv"))
            }
            _ => usage_error(
                "--output-csv is required unless both --run-dir and --run-id are provided",
            ),
        },
    };

    // 2. Build and write the map
    let rows = qmap::build_question_map(&args.input_docx)?;
    if let Some(parent) = output_csv.parent() {
        fs::create_dir_all(parent)?;
    }
    qmap::write_question_map_csv(&output_csv, &rows)?;

    println!("Q count: {}", rows.len());
    println!("Output: {}", output_csv.display());
    Ok(())
}

fn cmd_query(args: QueryArgs) -> Result<()> {
    match qmap::query_package_question(&args.input_docx, args.q)? {
        QueryOutcome::Found(found) => {
            println!("Q{}: {}", found.number, found.question);
            if found.sources.is_empty() {
                println!("Sources: NONE");
                return Ok(());
            }
            println!("Sources:");
            for (id, text) in &found.sources {
                match text.as_deref() {
                    Some(text) if !text.is_empty() => println!("- [{id}] {text}"),
                    _ => println!("- [{id}] (not found in footnotes.xml)"),
                }
            }
            Ok(())
        }
        QueryOutcome::OutOfRange {
            requested,
            available,
        } => {
            println!("Q{requested} out of range. Available: Q1..Q{available}");
            std::process::exit(1);
        }
    }
}

fn cmd_pipeline(args: PipelineArgs) -> Result<()> {
    let code = run_pipeline(args)?;
    std::process::exit(code);
}

/// Validate the run identity, take the single-run lock, and drive one run to
/// a terminal status. Returns the process exit code; the lock is released
/// before the caller exits.
fn run_pipeline(args: PipelineArgs) -> Result<i32> {
    // 1. Root layout and run identity
    runs::validate_marker(&args.marker)?;

    let runs_root = PathBuf::from(RUNS_ROOT);
    fs::create_dir_all(&runs_root)?;
    fs::create_dir_all(ARCHIVE_DIR)?;
    fs::create_dir_all(&args.manifest_dir)?;

    let run_id = match args.run_id.clone() {
        Some(id) => id,
        None => runs::make_run_id(),
    };
    if !runs::is_valid_run_id(&run_id) {
        eprintln!("Invalid run_id format: {run_id}");
        return Ok(2);
    }

    let expected_run_dir = runs_root.join(&run_id);
    let run_dir = args
        .run_dir
        .clone()
        .unwrap_or_else(|| expected_run_dir.clone());
    if resolved(&run_dir) != resolved(&expected_run_dir) {
        eprintln!("run_dir must be exactly: {}", expected_run_dir.display());
        return Ok(2);
    }
    if run_dir.exists() {
        eprintln!(
            "Run directory already exists (run_id reuse not allowed): {}",
            run_dir.display()
        );
        return Ok(2);
    }
    if !args.patch_spec.exists() {
        eprintln!("Patch spec not found: {}", args.patch_spec.display());
        return Ok(2);
    }

    // 2. One pipeline at a time
    let lock_path = PathBuf::from(LOCK_FILE);
    let _lock = match runs::RunLock::acquire(&lock_path) {
        Ok(lock) => lock,
        Err(runs::RunError::LockHeld { path }) => {
            eprintln!(
                "Another pipeline process appears to be running. Lock file exists: {}",
                path.display()
            );
            return Ok(2);
        }
        Err(err) => return Err(err.into()),
    };

    let started_at = runs::utc_now_iso();
    let run_index = Path::new(REPORTS_DIR).join(RUN_INDEX_FILE);
    let paths = RunPaths::new(&run_dir, &run_id);

    // 3. Execute, capturing unexpected failures as FAILED_INTERNAL
    let mut started_record_written = false;
    let outcome = execute_run(
        &args,
        &paths,
        &run_id,
        &started_at,
        &run_index,
        &mut started_record_written,
    );
    let (status, notes, indexed) = match outcome {
        Ok(result) => result,
        Err(err) => (
            RunStatus::FailedInternal,
            format!("internal error: {err}"),
            0,
        ),
    };

    // 4. Finalize the index row
    if started_record_written {
        let finished_at = runs::utc_now_iso();
        let record = index_record(
            &args,
            &paths,
            &run_id,
            &started_at,
            Some((finished_at.as_str(), status, notes.as_str())),
        );
        runs::upsert_run_record(&run_index, &record)?;
    }

    // 5. Summary
    let status_text = if status == RunStatus::Succeeded {
        status.to_string().green()
    } else {
        status.to_string().red()
    };
    println!("Run ID: {run_id}");
    println!("Run dir: {}", run_dir.display());
    println!("Status: {status_text}");
    println!("Artifacts indexed: {indexed}");
    println!("Sync manifest: {}", paths.sync_manifest.display());
    println!("Deleted manifest: {}", paths.deleted_manifest.display());
    println!("Artifact manifest: {}", paths.artifact_manifest.display());
    println!("Run index: {}", run_index.display());

    Ok(if status == RunStatus::Succeeded { 0 } else { 2 })
}

/// Lay out the run directory, execute the gate, revise, and qmap phases,
/// and write the manifests. Phase failures come back as a terminal status
/// with notes; an `Err` means the run itself broke.
fn execute_run(
    args: &PipelineArgs,
    paths: &RunPaths,
    run_id: &str,
    started_at: &str,
    run_index: &Path,
    started_record_written: &mut bool,
) -> Result<(RunStatus, String, usize)> {
    // 1. Run layout plus immutable intake copies
    runs::ensure_run_layout(&paths.run_dir)?;
    runs::copy_new(&args.input_docx, &paths.intake_copy)?;
    runs::copy_new(&args.patch_spec, &paths.patch_spec_copy)?;
    for target in paths.produced_paths() {
        runs::ensure_absent(target)?;
    }

    // 2. Record the run as started
    let record = index_record(args, paths, run_id, started_at, None);
    runs::upsert_run_record(run_index, &record)?;
    *started_record_written = true;

    let context = runs::RunContext {
        run_id: run_id.to_string(),
        marker: args.marker.clone(),
        run_dir: paths.run_dir.display().to_string(),
        started_at: started_at.to_string(),
        policy_version: runs::POLICY_VERSION.to_string(),
        retention_policy: args.retention_policy.clone(),
        patch_spec: paths.patch_spec_copy.display().to_string(),
    };
    runs::write_run_context(&paths.run_context, &context)?;

    // 3. Gate, revise, and map phases in order
    let mut status = RunStatus::Succeeded;
    let mut notes = String::new();

    let gate_passed = run_gate_phase(&args.source_config, &paths.source_report)?;
    if !gate_passed && !args.allow_required_fail {
        eprintln!("{} gate: required source gate failed", "✗".red());
        status = RunStatus::FailedGate;
        notes = "required source gate failed".to_string();
    } else {
        if !gate_passed {
            println!(
                "{} gate: required failure overridden by --allow-required-fail",
                "⊙".yellow()
            );
        }
        let options = ReviseOptions::new(
            Some(args.author.clone()),
            args.date.clone(),
            args.allow_incremental,
        );
        match run_revise_phase(paths, &options) {
            Ok(()) => match run_qmap_phase(&paths.revised_docx, &paths.q_source_map) {
                Ok(()) => {}
                Err(message) => {
                    eprintln!("{} qmap: {message}", "✗".red());
                    status = RunStatus::FailedQmap;
                    notes = format!("question map failed: {message}");
                }
            },
            Err(message) => {
                eprintln!("{} revise: {message}", "✗".red());
                status = RunStatus::FailedRevise;
                notes = format!("revise failed: {message}");
            }
        }
    }

    // 4. Reserve the verification artifact, then write the manifests
    let now_iso = runs::utc_now_iso();
    runs::write_claim_verdicts_placeholder(&paths.claim_verdicts, run_id, &now_iso)?;

    let mut ledger = runs::ArtifactLedger::new(&args.marker, run_id, &now_iso);
    let input_docx = args.input_docx.display().to_string();
    let patch_spec = args.patch_spec.display().to_string();
    let source_config = args.source_config.display().to_string();
    let patch_spec_copy = paths.patch_spec_copy.display().to_string();
    let revised_docx = paths.revised_docx.display().to_string();

    ledger.record_artifact(
        "input_docx_copy",
        &paths.intake_copy,
        "intake",
        "pipeline",
        &input_docx,
        "HOT",
        "input",
    )?;
    ledger.record_artifact(
        "patch_spec_copy",
        &paths.patch_spec_copy,
        "scope",
        "pipeline",
        &patch_spec,
        "PERMANENT",
        "patch_spec",
    )?;
    ledger.record_artifact(
        "run_context",
        &paths.run_context,
        "reports",
        "pipeline",
        "",
        "PERMANENT",
        "run_context",
    )?;
    ledger.record_artifact(
        "source_gate_report",
        &paths.source_report,
        "gate",
        "gate",
        &source_config,
        "HOT",
        "source_gate_report",
    )?;
    ledger.record_artifact(
        "revised_docx",
        &paths.revised_docx,
        "revise",
        "revise",
        &patch_spec_copy,
        "PERMANENT",
        "revised_docx",
    )?;
    ledger.record_artifact(
        "revision_change_audit",
        &paths.revision_audit,
        "revise",
        "revise",
        &revised_docx,
        "PERMANENT",
        "change_audit",
    )?;
    ledger.record_artifact(
        "q_source_map",
        &paths.q_source_map,
        "reports",
        "qmap",
        &revised_docx,
        "PERMANENT",
        "q_source_map",
    )?;
    ledger.record_artifact(
        "claim_verdicts",
        &paths.claim_verdicts,
        "verify",
        "pipeline",
        "",
        "HOT",
        "claim_verdicts",
    )?;

    runs::write_tsv(
        &paths.deleted_manifest,
        &runs::DELETED_FIELDS,
        &[runs::no_deletions_row(&args.marker, run_id, &now_iso)],
    )?;
    runs::write_tsv(
        &paths.artifact_manifest,
        &runs::ARTIFACT_FIELDS,
        &ledger.artifact_rows,
    )?;
    ledger.record_manifest(&paths.deleted_manifest, "deleted_manifest")?;
    ledger.record_manifest(&paths.artifact_manifest, "artifact_manifest")?;
    runs::write_tsv(&paths.sync_manifest, &runs::SYNC_FIELDS, &ledger.sync_rows)?;

    // 5. Mirror the manifests and deliver the optional output copy
    if resolved(&args.manifest_dir) != resolved(&paths.run_dir.join("manifests")) {
        for src in [
            &paths.sync_manifest,
            &paths.deleted_manifest,
            &paths.artifact_manifest,
        ] {
            if let Some(name) = src.file_name() {
                runs::copy_new(src, &args.manifest_dir.join(name))?;
            }
        }
    }
    if let Some(output_docx) = args.output_docx.as_deref() {
        if paths.revised_docx.exists() {
            runs::copy_new(&paths.revised_docx, output_docx)?;
        }
    }

    Ok((status, notes, ledger.indexed()))
}

/// Run the source gate in-process. Returns whether all required sources
/// passed; a config that cannot be loaded counts as a failed gate.
fn run_gate_phase(source_config: &Path, report_path: &Path) -> Result<bool> {
    println!(
        "+ gate --config {} --output-json {}",
        source_config.display(),
        report_path.display()
    );
    let config = match GateConfig::load(source_config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} gate: {err}", "✗".red());
            return Ok(false);
        }
    };
    let checker = SourceChecker::new()?;
    let report = checker.run(&config);
    gate::write_report(report_path, &report)?;

    for result in &report.results {
        let marker = if result.ok { "✓".green() } else { "✗".red() };
        println!(
            "{} {} [{}] {}",
            marker, result.source_id, result.tier, result.detail
        );
    }
    Ok(report.all_required_passed)
}

/// Revise the intake copy into the run's revision artifacts. Any failure is
/// a phase failure, reported as the note text.
fn run_revise_phase(paths: &RunPaths, options: &ReviseOptions) -> std::result::Result<(), String> {
    let mut echo = format!(
        "+ revise --input-docx {} --output-docx {} --audit-csv {} --patch-spec {}",
        paths.intake_copy.display(),
        paths.revised_docx.display(),
        paths.revision_audit.display(),
        paths.patch_spec_copy.display()
    );
    if options.allow_incremental {
        echo.push_str(" --allow-incremental");
    }
    println!("{echo}");

    let patch_plan =
        plan::load_from_path(&paths.patch_spec_copy).map_err(|err| err.to_string())?;
    let outcome = engine::revise_package(
        &paths.intake_copy,
        &paths.revised_docx,
        &patch_plan,
        options,
    )
    .map_err(|err| err.to_string())?;
    engine::write_audit_csv(&paths.revision_audit, &outcome.audit)
        .map_err(|err| err.to_string())?;

    println!(
        "{} revise: applied {} patches, {} new footnotes",
        "✓".green(),
        outcome.applied.len(),
        outcome.new_footnotes.len()
    );
    Ok(())
}

/// Build the question map from the revised document.
fn run_qmap_phase(input: &Path, output: &Path) -> std::result::Result<(), String> {
    println!(
        "+ qmap --input-docx {} --output-csv {}",
        input.display(),
        output.display()
    );
    let rows = qmap::build_question_map(input).map_err(|err| err.to_string())?;
    qmap::write_question_map_csv(output, &rows).map_err(|err| err.to_string())?;

    println!("{} qmap: {} questions mapped", "✓".green(), rows.len());
    Ok(())
}

/// Build the full run-index row for this run. `finish` carries the terminal
/// timestamp, status, and notes; a starting row records RUNNING instead.
fn index_record(
    args: &PipelineArgs,
    paths: &RunPaths,
    run_id: &str,
    started_at: &str,
    finish: Option<(&str, RunStatus, &str)>,
) -> runs::TsvRow {
    let run_dir = paths.run_dir.display().to_string();
    let sync_manifest = paths.sync_manifest.display().to_string();
    let deleted_manifest = paths.deleted_manifest.display().to_string();
    let artifact_manifest = paths.artifact_manifest.display().to_string();
    let source_report = paths.source_report.display().to_string();
    let revised_docx = paths.revised_docx.display().to_string();
    let q_source_map = paths.q_source_map.display().to_string();
    let revision_audit = paths.revision_audit.display().to_string();
    let (finished_at, status, notes) = match finish {
        Some((finished_at, status, notes)) => (finished_at, status.as_str(), notes),
        None => ("", RunStatus::Running.as_str(), ""),
    };

    runs::tsv_row(&[
        ("marker", args.marker.as_str()),
        ("run_id", run_id),
        ("status", status),
        ("run_dir", &run_dir),
        ("started_at", started_at),
        ("finished_at", finished_at),
        ("retention_policy", args.retention_policy.as_str()),
        ("manifest_sync", &sync_manifest),
        ("manifest_deleted", &deleted_manifest),
        ("manifest_artifact", &artifact_manifest),
        ("source_gate_report", &source_report),
        ("revised_docx", &revised_docx),
        ("q_source_map", &q_source_map),
        ("revision_change_audit", &revision_audit),
        ("archive_path", ""),
        ("notes", notes),
    ])
}
