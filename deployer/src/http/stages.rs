//! Image job endpoints

use async_trait::async_trait;
use cfp_api::{InstallStatusResponse, JobResponse, RejectDiffResponse};
use tracing::{debug, info};

use crate::errors::DeployError;
use crate::http::client::CfpClient;
use crate::models::deployment::{DiffJobParams, InstallStatus, UpdateJobParams, VersionJobParams};
use crate::models::job::{Job, Stage};

/// Remote operations the pipeline is built from.
///
/// Every method fails with a transport error on a non-success HTTP
/// outcome and never retries.
#[async_trait]
pub trait StageClient: Send + Sync {
    async fn create_update_job(&self, params: &UpdateJobParams) -> Result<Job, DeployError>;

    async fn fetch_update_status(&self, account_id: &str, update_id: &str) -> Result<Job, DeployError>;

    async fn create_diff_job(&self, params: &DiffJobParams) -> Result<Job, DeployError>;

    async fn fetch_diff_status(&self, account_id: &str, diff_id: &str) -> Result<Job, DeployError>;

    /// Reject an open diff, releasing the image lock it holds
    async fn reject_diff(&self, account_id: &str, diff_id: &str, reinstall: bool) -> Result<(), DeployError>;

    async fn create_version_job(&self, params: &VersionJobParams) -> Result<Job, DeployError>;

    async fn fetch_version_status(
        &self,
        account_id: &str,
        image_version_id: &str,
    ) -> Result<Job, DeployError>;

    async fn fetch_install_status(&self, account_id: &str) -> Result<InstallStatus, DeployError>;
}

fn flag(value: bool) -> String {
    String::from(if value { "1" } else { "0" })
}

#[async_trait]
impl StageClient for CfpClient {
    async fn create_update_job(&self, params: &UpdateJobParams) -> Result<Job, DeployError> {
        info!("Creating image update job...");
        let query = [
            ("imageid", params.image_id.clone()),
            ("desc", params.description.clone()),
            ("machineid", params.machine_id.clone()),
            ("accountserviceid", params.account_id.clone()),
            ("url", params.source_url.clone()),
        ];
        let response: JobResponse = self.get("create image update", "/imageupdate/create", &query).await?;
        Job::from_response(Stage::Update, response)
    }

    async fn fetch_update_status(&self, account_id: &str, update_id: &str) -> Result<Job, DeployError> {
        let path = format!("/imageupdate/{}/status", update_id);
        let query = [("accountserviceid", account_id.to_string())];
        let response: JobResponse = self.get("image update status", &path, &query).await?;
        Job::from_response(Stage::Update, response)
    }

    async fn create_diff_job(&self, params: &DiffJobParams) -> Result<Job, DeployError> {
        info!("Creating image diff job...");
        let query = [
            ("accountserviceid", params.account_id.clone()),
            ("imageid", params.image_id.clone()),
            ("machineid", params.machine_id.clone()),
        ];
        let response: JobResponse = self.get("create image diff", "/imagediff/create", &query).await?;
        Job::from_response(Stage::Diff, response)
    }

    async fn fetch_diff_status(&self, account_id: &str, diff_id: &str) -> Result<Job, DeployError> {
        let path = format!("/imagediff/{}/status", diff_id);
        let query = [("accountserviceid", account_id.to_string())];
        let response: JobResponse = self.get("image diff status", &path, &query).await?;
        Job::from_response(Stage::Diff, response)
    }

    async fn reject_diff(&self, account_id: &str, diff_id: &str, reinstall: bool) -> Result<(), DeployError> {
        let path = format!("/imagediff/{}/reject", diff_id);
        let query = [
            ("accountserviceid", account_id.to_string()),
            ("diffid", diff_id.to_string()),
            ("reinstall", flag(reinstall)),
        ];
        let response: RejectDiffResponse = self.get("reject image diff", &path, &query).await?;
        debug!(
            diff_id,
            success = response.success,
            message = ?response.error_message,
            "Image diff rejected"
        );
        Ok(())
    }

    async fn create_version_job(&self, params: &VersionJobParams) -> Result<Job, DeployError> {
        info!("Creating image version job...");
        let query = [
            ("diffid", params.diff_id.clone()),
            ("restart", flag(params.restart)),
            ("accountserviceid", params.account_id.clone()),
            ("install_at", params.install_at.clone()),
            ("full", flag(params.full)),
            ("game_build", params.game_build.clone()),
            ("force", flag(params.force)),
        ];
        let response: JobResponse = self.get("create image version", "/imageversion/create", &query).await?;
        Job::from_response(Stage::Version, response)
    }

    async fn fetch_version_status(
        &self,
        account_id: &str,
        image_version_id: &str,
    ) -> Result<Job, DeployError> {
        let path = format!("/imageversion/{}/status", image_version_id);
        let query = [("accountserviceid", account_id.to_string())];
        let response: JobResponse = self.get("image version status", &path, &query).await?;
        Job::from_response(Stage::Version, response)
    }

    async fn fetch_install_status(&self, account_id: &str) -> Result<InstallStatus, DeployError> {
        let query = [("accountserviceid", account_id.to_string())];
        let response: InstallStatusResponse =
            self.get("image install status", "/imageinstall/status", &query).await?;
        Ok(InstallStatus {
            pending_install_count: response.installs.len(),
        })
    }
}
