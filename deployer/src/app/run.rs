//! Main deployment run

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};

use crate::app::options::DeployOptions;
use crate::authn::sigv4::SigV4Signer;
use crate::config::credentials::{CredentialSource, EnvCredentials, SecretsManagerCredentials};
use crate::config::settings::DeployConfig;
use crate::errors::DeployError;
use crate::http::client::CfpClient;
use crate::models::deployment::{DeploymentRequest, DeploymentResult};
use crate::pipeline::orchestrator::{Orchestrator, PipelineReporter};
use crate::pipeline::poller::JobPoller;
use crate::upload::s3::{ArtifactUploader, AwsCliUploader, BucketPath};

/// Run a full deployment: credentials, upload, then the image pipeline.
///
/// Returns `Cancelled` if `shutdown_signal` resolves first. Jobs already
/// submitted keep running remotely.
pub async fn run(
    options: DeployOptions,
    reporter: Arc<dyn PipelineReporter>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<DeploymentResult, DeployError> {
    tokio::select! {
        result = deploy(&options, reporter) => result,
        _ = shutdown_signal => {
            error!("Shutdown signal received, abandoning deployment");
            Err(DeployError::Cancelled)
        }
    }
}

async fn deploy(
    options: &DeployOptions,
    reporter: Arc<dyn PipelineReporter>,
) -> Result<DeploymentResult, DeployError> {
    let source: Box<dyn CredentialSource> = match &options.secret_name {
        Some(name) => Box::new(SecretsManagerCredentials::new(name.clone())),
        None => Box::new(EnvCredentials::new()),
    };
    info!("Retrieving secrets...");
    let credentials = source.load().await?;

    let config = DeployConfig::resolve(
        &credentials,
        options.image,
        options.api.clone(),
        options.poll.clone(),
    )?;

    let bucket_path = BucketPath::for_version(&options.bucket_name, &options.version);
    info!(
        "Deploying dedicated server version \"{}\" from \"{}\" to image \"{}\". Intermediate storage at: \"{}\"",
        options.version,
        options.server_path.display(),
        config.target_image_id,
        bucket_path.s3_url()
    );

    AwsCliUploader
        .upload(&options.server_path, &bucket_path)
        .await?;

    let source_url = bucket_path.credentialed_url(
        &credentials.storage_access_key,
        &credentials.storage_secret_key,
    );

    let signer = SigV4Signer::new(
        credentials.api_access_key,
        credentials.api_secret_key,
        config.api.region.clone(),
        config.api.service.clone(),
    );
    let client = CfpClient::new(&config.api.host, Arc::new(signer), config.api.request_timeout)?;

    let request = DeploymentRequest {
        account_id: config.account_service_id.clone(),
        build_machine_id: config.build_machine_id.clone(),
        target_image_id: config.target_image_id.clone(),
        version_label: options.version.clone(),
        source_url,
        force_full_build: options.full_deploy,
    };

    let orchestrator = Orchestrator::with_reporter(
        Arc::new(client),
        JobPoller::new(config.poll.clone()),
        reporter,
    );
    orchestrator.run(&request).await
}
