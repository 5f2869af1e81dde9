use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, parsing, or writing document packages.
#[derive(Error, Debug)]
pub enum DomError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("document package {} is not a readable archive: {source}", .path.display())]
    Archive {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("document package has no part named '{name}'")]
    MissingPart { name: String },

    #[error("failed to read package part '{name}': {source}")]
    PartIo { name: String, source: std::io::Error },

    #[error("{}", malformed_message(.part, .message))]
    MalformedXml {
        part: Option<String>,
        message: String,
    },

    #[error("failed to serialize XML part: {message}")]
    Serialize { message: String },
}

impl DomError {
    /// Attach the package part name to a parse error that lacks one.
    pub(crate) fn with_part(self, part: &str) -> Self {
        match self {
            DomError::MalformedXml {
                part: None,
                message,
            } => DomError::MalformedXml {
                part: Some(part.to_string()),
                message,
            },
            other => other,
        }
    }
}

fn malformed_message(part: &Option<String>, message: &str) -> String {
    match part {
        Some(part) => format!("package part '{part}' is not well-formed XML: {message}"),
        None => format!("input is not well-formed XML: {message}"),
    }
}
