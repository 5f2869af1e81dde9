use crate::plan::schema::PatchPlan;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("failed to read patch plan from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}", json_message(.path, .source))]
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },

    #[error("{}", invalid_message(.path, .message))]
    Invalid {
        path: Option<PathBuf>,
        message: String,
    },
}

fn json_message(path: &Option<PathBuf>, source: &serde_json::Error) -> String {
    match path {
        Some(path) => format!(
            "failed to parse patch plan JSON ({}): {source}",
            path.display()
        ),
        None => format!("failed to parse patch plan JSON: {source}"),
    }
}

fn invalid_message(path: &Option<PathBuf>, message: &str) -> String {
    match path {
        Some(path) => format!("invalid patch plan ({}): {message}", path.display()),
        None => format!("invalid patch plan: {message}"),
    }
}

impl PlanError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            PlanError::Json { path: None, source } => PlanError::Json {
                path: Some(path),
                source,
            },
            PlanError::Invalid {
                path: None,
                message,
            } => PlanError::Invalid {
                path: Some(path),
                message,
            },
            other => other,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<PatchPlan, PlanError> {
    let mut plan: PatchPlan =
        serde_json::from_str(input).map_err(|source| PlanError::Json { path: None, source })?;
    plan.normalize();
    if plan.patches.is_empty() {
        return Err(PlanError::Invalid {
            path: None,
            message: "patch plan must contain a non-empty patches list".to_string(),
        });
    }
    Ok(plan)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PatchPlan, PlanError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| PlanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}
