use crate::models::summary_types::RunSummary;
use std::path::PathBuf;
use thiserror::Error;

/// Run-fatal failures. Anything here aborts the pipeline and maps to a
/// non-zero exit code.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input folder not found or not a directory: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Captioning model unavailable: {0}")]
    ModelUnavailable(String),

    /// The model dropped out mid-run. Carries everything done up to that point.
    #[error("Captioning model became unavailable mid-run: {reason}")]
    Aborted {
        reason: String,
        summary: Box<RunSummary>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// The three failure kinds a captioning backend may report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptionError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("caption generation failed: {0}")]
    Generation(String),

    #[error("corrupt image: {0}")]
    CorruptImage(String),
}

impl CaptionError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptionError::ModelUnavailable(_))
    }
}

impl From<reqwest::Error> for CaptionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            CaptionError::ModelUnavailable(err.to_string())
        } else {
            CaptionError::Generation(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("target {} already exists and is a different file", .0.display())]
    Conflict(PathBuf),

    #[error("{} is already claimed by {} in this run", .0.display(), .1)]
    DuplicateTarget(PathBuf, String),
}

/// Per-item filesystem failure while renaming or writing.
#[derive(Debug, Error)]
#[error("failed to {action} {}: {source}", path.display())]
pub struct WriteError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl WriteError {
    pub fn new(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WriteError {
            action,
            path: path.into(),
            source,
        }
    }
}
