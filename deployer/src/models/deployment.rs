//! Deployment models

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::models::diff::SummaryLine;

/// Input of a pipeline run, immutable for its duration
#[derive(Debug)]
pub struct DeploymentRequest {
    /// Account service the image belongs to
    pub account_id: String,

    /// Machine the image is built on
    pub build_machine_id: String,

    /// Image receiving the new build
    pub target_image_id: String,

    /// Build/version label
    pub version_label: String,

    /// Credentialed pointer to the uploaded artifact
    pub source_url: SecretString,

    /// Caller asked for a full rebuild
    pub force_full_build: bool,
}

/// Parameters of an image update job
#[derive(Clone, PartialEq, Eq)]
pub struct UpdateJobParams {
    pub account_id: String,
    pub image_id: String,
    pub machine_id: String,
    pub description: String,
    pub source_url: String,
}

impl From<&DeploymentRequest> for UpdateJobParams {
    fn from(request: &DeploymentRequest) -> Self {
        Self {
            account_id: request.account_id.clone(),
            image_id: request.target_image_id.clone(),
            machine_id: request.build_machine_id.clone(),
            description: request.version_label.clone(),
            source_url: request.source_url.expose_secret().to_string(),
        }
    }
}

impl std::fmt::Debug for UpdateJobParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateJobParams")
            .field("account_id", &self.account_id)
            .field("image_id", &self.image_id)
            .field("machine_id", &self.machine_id)
            .field("description", &self.description)
            .field("source_url", &"[REDACTED]")
            .finish()
    }
}

/// Parameters of an image diff job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffJobParams {
    pub account_id: String,
    pub image_id: String,
    pub machine_id: String,
}

impl From<&DeploymentRequest> for DiffJobParams {
    fn from(request: &DeploymentRequest) -> Self {
        Self {
            account_id: request.account_id.clone(),
            image_id: request.target_image_id.clone(),
            machine_id: request.build_machine_id.clone(),
        }
    }
}

/// Parameters of an image version job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionJobParams {
    pub account_id: String,
    pub diff_id: String,
    pub game_build: String,

    /// Rebuild the image from scratch instead of applying the diff
    pub full: bool,

    pub restart: bool,

    /// Install time expression understood by the backend
    pub install_at: String,

    /// Install even over existing allocations
    pub force: bool,
}

impl VersionJobParams {
    /// Install time meaning "immediately"
    pub const INSTALL_NOW: &'static str = "NOW()";
}

/// Fleet-wide install progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallStatus {
    pub pending_install_count: usize,
}

impl InstallStatus {
    pub fn is_complete(&self) -> bool {
        self.pending_install_count == 0
    }
}

/// Outcome of a completed pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// Id of the final image version job
    pub image_version_id: String,

    pub success: bool,

    /// Whether the version was committed as a full build
    pub full_build: bool,

    pub diff_summary: Vec<SummaryLine>,
}
