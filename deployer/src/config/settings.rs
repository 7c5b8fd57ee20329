//! Deployment configuration, resolved once at startup

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::credentials::Credentials;
use crate::errors::DeployError;
use crate::pipeline::poller::PollOptions;

/// Image API host
pub const DEFAULT_API_HOST: &str = "api.multiplay.co.uk";

/// Signing region of the image API
pub const DEFAULT_API_REGION: &str = "eu-west-1";

/// Signing service name of the image API (Clanforge)
pub const DEFAULT_API_SERVICE: &str = "cf";

/// Image slot to deploy to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageSlot {
    A,
    B,
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSlot::A => f.write_str("a"),
            ImageSlot::B => f.write_str("b"),
        }
    }
}

/// Image ids per slot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSlots {
    pub a: Option<String>,
    pub b: Option<String>,
}

impl ImageSlots {
    /// Image id configured for `slot`
    pub fn resolve(&self, slot: ImageSlot) -> Result<String, DeployError> {
        let id = match slot {
            ImageSlot::A => self.a.as_deref(),
            ImageSlot::B => self.b.as_deref(),
        };
        id.filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DeployError::ConfigError(format!("No image id configured for image {}", slot)))
    }
}

/// Remote API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub host: String,
    pub region: String,
    pub service: String,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_API_HOST.to_string(),
            region: DEFAULT_API_REGION.to_string(),
            service: DEFAULT_API_SERVICE.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything the pipeline needs besides credentials
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub api: ApiSettings,

    pub poll: PollOptions,

    pub account_service_id: String,

    pub build_machine_id: String,

    /// Image id of the selected slot
    pub target_image_id: String,
}

impl DeployConfig {
    /// Resolve ids from the loaded credentials and the chosen slot
    pub fn resolve(
        credentials: &Credentials,
        slot: ImageSlot,
        api: ApiSettings,
        poll: PollOptions,
    ) -> Result<Self, DeployError> {
        let account_service_id = required("account_service_id", &credentials.account_service_id)?;
        let build_machine_id = required("build_machine_id", &credentials.build_machine_id)?;
        let target_image_id = credentials.images.resolve(slot)?;

        Ok(Self {
            api,
            poll,
            account_service_id,
            build_machine_id,
            target_image_id,
        })
    }
}

fn required(name: &str, value: &Option<String>) -> Result<String, DeployError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DeployError::ConfigError(format!("Missing required setting: {}", name)))
}
