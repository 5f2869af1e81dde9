//! Evidence gate over external sources.
//!
//! Each configured source is fetched and searched for its evidence tokens.
//! Required sources must all pass for the gate to pass; optional sources are
//! checked and reported but never block. A fetch failure is a result row,
//! not an error, so one unreachable source cannot abort the whole report.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("failed to read gate config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse gate config {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid normalization pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to encode gate report: {source}")]
    Encode { source: serde_json::Error },

    #[error("failed to write gate report {path}: {source}")]
    Report {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One source to verify. The `type` field selects how the body is fetched;
/// an unrecognized type produces a failed result row rather than a config
/// error so the rest of the gate still runs.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    #[serde(rename = "type", default)]
    pub source_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub must_include: Vec<String>,
}

/// Gate configuration. Sources are checked in key order, required first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub required_sources: BTreeMap<String, SourceSpec>,
    #[serde(default)]
    pub optional_sources: BTreeMap<String, SourceSpec>,
}

impl GateConfig {
    pub fn load(path: &Path) -> Result<Self, GateError> {
        let raw = std::fs::read_to_string(path).map_err(|source| GateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| GateError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTier {
    Required,
    Optional,
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTier::Required => write!(f, "required"),
            SourceTier::Optional => write!(f, "optional"),
        }
    }
}

/// Outcome of checking one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub source_id: String,
    pub tier: SourceTier,
    pub ok: bool,
    pub reachable: bool,
    pub matched_tokens: usize,
    pub total_tokens: usize,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateReport {
    pub all_required_passed: bool,
    pub required_failed_count: usize,
    pub results: Vec<CheckResult>,
}

const FETCH_TIMEOUT: Duration = Duration::from_secs(25);
const PDF_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MISSING_TOKEN_PREVIEW: usize = 3;

/// Fetches sources and evaluates their evidence tokens.
pub struct SourceChecker {
    agent: ureq::Agent,
    hyphen_break: Regex,
    whitespace: Regex,
}

impl SourceChecker {
    pub fn new() -> Result<Self, GateError> {
        let agent = ureq::AgentBuilder::new()
            .timeout(FETCH_TIMEOUT)
            .user_agent("docx-reviser-source-check/1.0")
            .build();
        Ok(Self {
            agent,
            hyphen_break: Regex::new(r"([A-Za-z])-\s+([A-Za-z])")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Check every configured source and aggregate the gate verdict.
    pub fn run(&self, config: &GateConfig) -> GateReport {
        let mut results = Vec::new();
        for (source_id, spec) in &config.required_sources {
            results.push(self.check(source_id, spec, SourceTier::Required));
        }
        for (source_id, spec) in &config.optional_sources {
            results.push(self.check(source_id, spec, SourceTier::Optional));
        }

        let required_failed_count = results
            .iter()
            .filter(|result| result.tier == SourceTier::Required && !result.ok)
            .count();
        GateReport {
            all_required_passed: required_failed_count == 0,
            required_failed_count,
            results,
        }
    }

    /// Check a single source. Fetch and parse failures land in the result
    /// row as unreachable.
    pub fn check(&self, source_id: &str, spec: &SourceSpec, tier: SourceTier) -> CheckResult {
        let body = match self.fetch_body(spec) {
            Ok(body) => body,
            Err(detail) => {
                return CheckResult {
                    source_id: source_id.to_string(),
                    tier,
                    ok: false,
                    reachable: false,
                    matched_tokens: 0,
                    total_tokens: spec.must_include.len(),
                    detail,
                }
            }
        };
        self.evaluate_tokens(source_id, tier, &body, &spec.must_include)
    }

    fn fetch_body(&self, spec: &SourceSpec) -> Result<String, String> {
        match spec.source_type.trim() {
            "url_text" => {
                let url = spec.url.as_deref().ok_or("Source config missing url")?;
                let bytes = self.fetch_url_bytes(url, FETCH_TIMEOUT)?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            "remote_pdf" => {
                let url = spec.url.as_deref().ok_or("Source config missing url")?;
                let bytes = self.fetch_url_bytes(url, PDF_FETCH_TIMEOUT)?;
                pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|err| format!("Fetch/parse failed: {err}"))
            }
            "local_pdf" => {
                let path = spec.path.as_deref().ok_or("Source config missing path")?;
                if !Path::new(path).exists() {
                    return Err(format!("Local file not found: {path}"));
                }
                pdf_extract::extract_text(path)
                    .map_err(|err| format!("Fetch/parse failed: {err}"))
            }
            other => Err(format!("Unsupported source type: {other}")),
        }
    }

    fn fetch_url_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, String> {
        let response = self
            .agent
            .get(url)
            .timeout(timeout)
            .call()
            .map_err(|err| format!("Fetch/parse failed: {err}"))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|err| format!("Fetch/parse failed: {err}"))?;
        Ok(bytes)
    }

    /// Evaluate evidence tokens against already fetched body text.
    pub fn evaluate_tokens(
        &self,
        source_id: &str,
        tier: SourceTier,
        body: &str,
        must_include: &[String],
    ) -> CheckResult {
        let normalized_body = self.normalize(body);
        let missing: Vec<&String> = must_include
            .iter()
            .filter(|token| !normalized_body.contains(&self.normalize(token)))
            .collect();
        let matched_tokens = must_include.len() - missing.len();
        let ok = missing.is_empty();
        let detail = if ok {
            "all tokens matched".to_string()
        } else {
            let preview = missing
                .iter()
                .take(MISSING_TOKEN_PREVIEW)
                .map(|token| token.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            format!("missing evidence tokens: {preview}")
        };
        CheckResult {
            source_id: source_id.to_string(),
            tier,
            ok,
            reachable: true,
            matched_tokens,
            total_tokens: must_include.len(),
            detail,
        }
    }

    /// Lowercased single-spaced text with PDF line-wrap hyphenation joined,
    /// so "inde- pendent" matches "independent".
    fn normalize(&self, text: &str) -> String {
        let merged = self.hyphen_break.replace_all(text, "$1$2");
        self.whitespace
            .replace_all(&merged, " ")
            .trim()
            .to_lowercase()
    }
}

/// Write the report as pretty JSON with a trailing newline.
pub fn write_report(path: &Path, report: &GateReport) -> Result<(), GateError> {
    let mut encoded = serde_json::to_string_pretty(report)
        .map_err(|source| GateError::Encode { source })?;
    encoded.push('\n');
    std::fs::write(path, encoded).map_err(|source| GateError::Report {
        path: path.to_path_buf(),
        source,
    })
}
