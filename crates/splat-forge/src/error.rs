//! Error types for the conversion pipeline and the splat codec

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::processing::JobStatus;

/// Result type alias for splat-forge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message stored on a job whose tool exited cleanly but wrote no model
pub const MISSING_OUTPUT_MESSAGE: &str = "output artifact not found after execution";

/// Message stored on a job whose tool failed without any stderr output
pub const UNKNOWN_TOOL_ERROR: &str = "unknown error";

/// splat-forge errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// External tool exited with a non-zero status
    #[error("External tool failed ({status}): {stderr}")]
    ExternalTool { status: String, stderr: String },

    /// External tool succeeded but the expected model is absent
    #[error("output artifact not found after execution: {}", .0.display())]
    MissingOutput(PathBuf),

    /// External tool could not be started or did not exit normally
    #[error("Execution error: {0}")]
    Execution(String),

    /// Malformed point-cloud input
    #[error("Format error: {0}")]
    Format(String),

    /// Rejected status change
    #[error("Invalid transition for job {id}: {from:?} -> {to:?}")]
    InvalidTransition {
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },

    /// Job not found
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// Model artifact not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an external tool error
    pub fn external_tool(status: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::ExternalTool {
            status: status.into(),
            stderr: stderr.into(),
        }
    }

    /// Text recorded on a failed job.
    ///
    /// Tool diagnostics are stored verbatim so clients see exactly what the
    /// reconstruction tool printed.
    pub fn job_message(&self) -> String {
        match self {
            Error::ExternalTool { stderr, .. } if stderr.is_empty() => {
                UNKNOWN_TOOL_ERROR.to_string()
            }
            Error::ExternalTool { stderr, .. } => stderr.clone(),
            Error::MissingOutput(_) => MISSING_OUTPUT_MESSAGE.to_string(),
            Error::Execution(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
