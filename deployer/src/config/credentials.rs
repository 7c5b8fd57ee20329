//! Credential loading from the environment or AWS Secrets Manager

use async_trait::async_trait;
use cfp_api::lenient_id;
use secrecy::SecretString;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::settings::ImageSlots;
use crate::errors::DeployError;

/// Secrets and ids handed out during onboarding
#[derive(Debug)]
pub struct Credentials {
    /// Key pair the backend uses to download the artifact from the bucket
    pub storage_access_key: SecretString,
    pub storage_secret_key: SecretString,

    /// Key pair used to sign API requests
    pub api_access_key: String,
    pub api_secret_key: SecretString,

    pub account_service_id: Option<String>,
    pub build_machine_id: Option<String>,
    pub images: ImageSlots,
}

/// Source of deployment credentials
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn load(&self) -> Result<Credentials, DeployError>;
}

/// Raw credential fields, keyed the way the secret stores them
#[derive(Debug, Default, Deserialize)]
struct CredentialFields {
    aws_access_key: Option<String>,
    aws_secret_access_key: Option<String>,
    multiplay_access_key: Option<String>,
    multiplay_secret_access_key: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    account_service_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    build_machine_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    image_a_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    image_b_id: Option<String>,
}

impl CredentialFields {
    fn into_credentials(self) -> Result<Credentials, DeployError> {
        Ok(Credentials {
            storage_access_key: secret("aws_access_key", self.aws_access_key)?,
            storage_secret_key: secret("aws_secret_access_key", self.aws_secret_access_key)?,
            api_access_key: present("multiplay_access_key", self.multiplay_access_key)?,
            api_secret_key: secret("multiplay_secret_access_key", self.multiplay_secret_access_key)?,
            account_service_id: self.account_service_id,
            build_machine_id: self.build_machine_id,
            images: ImageSlots {
                a: self.image_a_id,
                b: self.image_b_id,
            },
        })
    }
}

fn present(name: &str, value: Option<String>) -> Result<String, DeployError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DeployError::CredentialsError(format!("Missing credential: {}", name)))
}

fn secret(name: &str, value: Option<String>) -> Result<SecretString, DeployError> {
    present(name, value).map(SecretString::from)
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads credentials from environment variables
pub struct EnvCredentials {
    lookup: Lookup,
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvCredentials {
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Use a custom variable lookup instead of the process environment
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
    }
}

#[async_trait]
impl CredentialSource for EnvCredentials {
    async fn load(&self) -> Result<Credentials, DeployError> {
        debug!("Reading credentials from environment");
        CredentialFields {
            aws_access_key: self.var("AWS_ACCESS_KEY"),
            aws_secret_access_key: self.var("AWS_SECRET_ACCESS_KEY"),
            multiplay_access_key: self.var("MULTIPLAY_ACCESS_KEY"),
            multiplay_secret_access_key: self.var("MULTIPLAY_SECRET_ACCESS_KEY"),
            account_service_id: self.var("ACCOUNT_SERVICE_ID"),
            build_machine_id: self.var("BUILD_MACHINE_ID"),
            image_a_id: self.var("IMAGE_A_ID"),
            image_b_id: self.var("IMAGE_B_ID"),
        }
        .into_credentials()
    }
}

/// Reads credentials from an AWS Secrets Manager secret via the `aws` CLI
pub struct SecretsManagerCredentials {
    secret_name: String,
}

impl SecretsManagerCredentials {
    pub fn new(secret_name: impl Into<String>) -> Self {
        Self {
            secret_name: secret_name.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for SecretsManagerCredentials {
    async fn load(&self) -> Result<Credentials, DeployError> {
        info!("Retrieving secrets from {}...", self.secret_name);

        let output = Command::new("aws")
            .args([
                "secretsmanager",
                "get-secret-value",
                "--secret-id",
                &self.secret_name,
                "--output",
                "json",
                "--query",
                "SecretString",
            ])
            .output()
            .await
            .map_err(|e| DeployError::CredentialsError(format!("Failed to run aws CLI: {}", e)))?;

        if !output.status.success() {
            return Err(DeployError::CredentialsError(format!(
                "aws secretsmanager exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_secret_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Decode `--query SecretString` output: a JSON string holding a JSON object
pub fn parse_secret_output(stdout: &str) -> Result<Credentials, DeployError> {
    let secret_string: String = serde_json::from_str(stdout.trim())?;
    let fields: CredentialFields = serde_json::from_str(&secret_string)?;
    fields.into_credentials()
}
