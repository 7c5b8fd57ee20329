//! Application configuration options

use std::path::PathBuf;

use crate::config::settings::{ApiSettings, ImageSlot};
use crate::pipeline::poller::PollOptions;

/// Options for one deployment run
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Directory holding the dedicated server build
    pub server_path: PathBuf,

    /// Version label of the build
    pub version: String,

    /// Bucket used as intermediate storage
    pub bucket_name: String,

    /// Image slot to deploy to
    pub image: ImageSlot,

    /// Force a full image version even when a diff exists
    pub full_deploy: bool,

    /// Secrets Manager secret holding the credentials. Falls back to the
    /// environment when absent.
    pub secret_name: Option<String>,

    /// Remote API settings
    pub api: ApiSettings,

    /// Poller settings shared by every stage
    pub poll: PollOptions,
}

impl DeployOptions {
    pub fn new(
        server_path: impl Into<PathBuf>,
        version: impl Into<String>,
        bucket_name: impl Into<String>,
        image: ImageSlot,
    ) -> Self {
        Self {
            server_path: server_path.into(),
            version: version.into(),
            bucket_name: bucket_name.into(),
            image,
            full_deploy: false,
            secret_name: None,
            api: ApiSettings::default(),
            poll: PollOptions::default(),
        }
    }
}
