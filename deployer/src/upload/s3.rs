//! Artifact upload to an S3 bucket through the `aws` CLI

use std::path::Path;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tracing::info;

use crate::errors::DeployError;
use crate::utils::uri_encode;

/// Bucket location of one uploaded build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPath {
    bucket: String,
    key: String,
}

impl BucketPath {
    /// `s3://<bucket>/dedicated-server-<version>`
    pub fn for_version(bucket: &str, version: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: format!("dedicated-server-{}", version),
        }
    }

    pub fn s3_url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    /// URL carrying the bucket credentials, for the backend to download from.
    ///
    /// Temporary (STS) credentials are not accepted by the backend.
    pub fn credentialed_url(&self, access_key: &SecretString, secret_key: &SecretString) -> SecretString {
        SecretString::from(format!(
            "s3://{}:{}@{}/{}",
            uri_encode(access_key.expose_secret()),
            uri_encode(secret_key.expose_secret()),
            self.bucket,
            self.key
        ))
    }
}

/// Uploads a build directory
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(&self, source: &Path, destination: &BucketPath) -> Result<(), DeployError>;
}

/// Uploader shelling out to `aws s3 sync`
#[derive(Debug, Clone, Default)]
pub struct AwsCliUploader;

#[async_trait]
impl ArtifactUploader for AwsCliUploader {
    async fn upload(&self, source: &Path, destination: &BucketPath) -> Result<(), DeployError> {
        if !source.exists() {
            return Err(DeployError::UploadError(format!(
                "Server path does not exist: {}",
                source.display()
            )));
        }

        let target = destination.s3_url();
        info!("Uploading {} to {}", source.display(), target);

        let status = Command::new("aws")
            .arg("s3")
            .arg("sync")
            .arg(source)
            .arg(&target)
            .args(["--no-progress", "--only-show-errors"])
            .status()
            .await
            .map_err(|e| DeployError::UploadError(format!("Failed to run aws s3 sync: {}", e)))?;

        if !status.success() {
            return Err(DeployError::UploadError(format!(
                "aws s3 sync to {} failed with {}",
                target, status
            )));
        }

        info!("Upload to {} complete", target);
        Ok(())
    }
}
