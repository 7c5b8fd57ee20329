//! Recovery from image locks held by a stale diff

use tracing::{info, warn};

use crate::errors::DeployError;
use crate::http::stages::StageClient;
use crate::models::job::{Job, Stage};

/// Message prefix the backend uses when an open diff locks the image
pub const LOCK_PREFIX: &str = "image locked by diffid:";

/// Classification of a failed update job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateFailure {
    /// An earlier diff holds the image lock and can be rejected
    LockConflict { diff_id: String },

    /// Anything else, carrying the backend message verbatim
    Fatal { message: String },
}

/// Classify a terminal, unsuccessful update job.
///
/// A populated `joberror` is always fatal. Otherwise the error message is
/// matched against `image locked by diffid: <id>`; the id is the literal
/// text after the prefix, trimmed of whitespace.
pub fn classify_update_failure(job: &Job) -> UpdateFailure {
    if let Some(job_error) = &job.job_error {
        return UpdateFailure::Fatal {
            message: job_error.clone(),
        };
    }

    let Some(message) = job.error_message.as_deref() else {
        return UpdateFailure::Fatal {
            message: job.failure_message(),
        };
    };

    match parse_locked_diff_id(message) {
        Some(diff_id) => UpdateFailure::LockConflict { diff_id },
        None => UpdateFailure::Fatal {
            message: message.to_string(),
        },
    }
}

/// Extract the diff id from a lock conflict message
pub fn parse_locked_diff_id(message: &str) -> Option<String> {
    let start = message.find(LOCK_PREFIX)? + LOCK_PREFIX.len();
    let diff_id = message[start..].trim();
    if diff_id.is_empty() || diff_id.contains(char::is_whitespace) {
        return None;
    }
    Some(diff_id.to_string())
}

/// Outcome of a successful recovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// The blocking diff was rejected; the update may be retried
    Recovered { rejected_diff_id: String },
}

/// Rejects the diff blocking an update job
pub struct ConflictResolver<'a, C: StageClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: StageClient + ?Sized> ConflictResolver<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Try to recover from a failed update job.
    ///
    /// Returns `JobFailed` for unrecoverable failures and propagates
    /// transport errors from the reject call unchanged.
    pub async fn resolve(&self, account_id: &str, job: &Job) -> Result<Recovery, DeployError> {
        if !job.is_terminal() || job.success {
            return Err(DeployError::PipelineInvariant(format!(
                "cannot classify update job in state {} (success={})",
                job.state, job.success
            )));
        }

        match classify_update_failure(job) {
            UpdateFailure::Fatal { message } => Err(DeployError::job_failed(Stage::Update, message)),
            UpdateFailure::LockConflict { diff_id } => {
                warn!(
                    diff_id = %diff_id,
                    "Image update job failed: {}. Rejecting diff",
                    job.error_message.as_deref().unwrap_or_default()
                );
                self.client.reject_diff(account_id, &diff_id, false).await?;
                info!(diff_id = %diff_id, "Image diff rejected");
                Ok(Recovery::Recovered {
                    rejected_diff_id: diff_id,
                })
            }
        }
    }
}
