//! Error types for the image deployer

use std::time::Duration;

use thiserror::Error;

use crate::models::job::Stage;

/// Main error type for the image deployer
#[derive(Error, Debug)]
pub enum DeployError {
    /// The backend answered with a non-success HTTP status
    #[error("Transport error during {operation}: {status} - {body}")]
    Transport {
        operation: String,
        status: http::StatusCode,
        body: String,
    },

    /// The request never produced an HTTP response. Built with
    /// [`DeployError::http`] so the request URL is stripped.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// A job reached a terminal state without success
    #[error("{stage} job failed: {message}")]
    JobFailed { stage: Stage, message: String },

    /// The image is locked by a previously started diff
    #[error("Image locked by diff {diff_id}")]
    LockConflict { diff_id: String },

    #[error("Pipeline invariant violated: {0}")]
    PipelineInvariant(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{stage} stage did not finish within {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("Deployment cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Credentials error: {0}")]
    CredentialsError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DeployError {
    /// Whether the error came from the HTTP layer rather than from a job
    pub fn is_transport(&self) -> bool {
        matches!(self, DeployError::Transport { .. } | DeployError::Http(_))
    }

    /// Wrap a client error without its URL, which may carry the
    /// credentialed source URL in its query
    pub fn http(error: reqwest::Error) -> Self {
        DeployError::Http(error.without_url())
    }

    /// Shorthand for a fatal job failure
    pub fn job_failed(stage: Stage, message: impl Into<String>) -> Self {
        DeployError::JobFailed {
            stage,
            message: message.into(),
        }
    }
}
