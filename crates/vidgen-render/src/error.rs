//! Error types for render operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{0} not found in PATH")]
    BinaryNotFound(String),

    #[error("{program} failed: {message}")]
    CommandFailed {
        program: String,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Composition not found: {0}")]
    CompositionNotFound(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("FFprobe failed: {0}")]
    ProbeFailed(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Unexpected output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    pub fn command_failed(
        program: impl Into<String>,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::CommandFailed {
            program: program.into(),
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }
}
