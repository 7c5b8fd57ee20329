//! Four-stage deployment pipeline

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::errors::DeployError;
use crate::http::stages::StageClient;
use crate::models::deployment::{
    DeploymentRequest, DeploymentResult, DiffJobParams, InstallStatus, UpdateJobParams,
    VersionJobParams,
};
use crate::models::diff::{DiffResult, SummaryLine};
use crate::models::job::{Job, Stage};
use crate::pipeline::conflict::{classify_update_failure, ConflictResolver, Recovery, UpdateFailure};
use crate::pipeline::fsm::{PipelineEvent, PipelineFsm, PipelineState};
use crate::pipeline::poller::JobPoller;

/// Receives the operator-facing output of a run
pub trait PipelineReporter: Send + Sync {
    /// Called once with the sorted diff summary
    fn diff_summary(&self, lines: &[SummaryLine]);

    /// Called when a stage's job completed successfully
    fn stage_completed(&self, job: &Job);
}

/// Reporter that only logs
pub struct LogReporter;

impl PipelineReporter for LogReporter {
    fn diff_summary(&self, lines: &[SummaryLine]) {
        for line in lines {
            info!("{}", line);
        }
    }

    fn stage_completed(&self, job: &Job) {
        info!(id = %job.id, "Completed {} job", job.stage);
    }
}

/// Runs update, diff, version and install-wait strictly in order
pub struct Orchestrator<C: StageClient> {
    client: Arc<C>,
    poller: JobPoller,
    reporter: Arc<dyn PipelineReporter>,
    fsm: RwLock<PipelineFsm>,
}

impl<C: StageClient> Orchestrator<C> {
    /// Create a new orchestrator
    pub fn new(client: Arc<C>, poller: JobPoller) -> Self {
        Self::with_reporter(client, poller, Arc::new(LogReporter))
    }

    pub fn with_reporter(
        client: Arc<C>,
        poller: JobPoller,
        reporter: Arc<dyn PipelineReporter>,
    ) -> Self {
        Self {
            client,
            poller,
            reporter,
            fsm: RwLock::new(PipelineFsm::new()),
        }
    }

    /// Get the current pipeline state
    pub async fn state(&self) -> PipelineState {
        self.fsm.read().await.state().clone()
    }

    /// Number of update jobs submitted so far
    pub async fn update_attempts(&self) -> u32 {
        self.fsm.read().await.update_attempts()
    }

    /// Run the whole pipeline once.
    ///
    /// Any error moves the pipeline to `FailedFatally` and is returned
    /// unchanged.
    pub async fn run(&self, request: &DeploymentRequest) -> Result<DeploymentResult, DeployError> {
        info!(
            image_id = %request.target_image_id,
            version = %request.version_label,
            full = request.force_full_build,
            "Starting deployment pipeline"
        );

        match self.run_stages(request).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Deployment pipeline failed: {}", e);
                let mut fsm = self.fsm.write().await;
                // Already failed or finished states reject the event
                let _ = fsm.process(PipelineEvent::Fail(e.to_string()));
                Err(e)
            }
        }
    }

    async fn run_stages(&self, request: &DeploymentRequest) -> Result<DeploymentResult, DeployError> {
        self.transition(PipelineEvent::StartUpdate).await?;
        self.update(request).await?;

        self.transition(PipelineEvent::UpdateSucceeded).await?;
        let diff = self.diff(request).await?;

        let summary = diff.summary();
        self.reporter.diff_summary(&summary);

        self.transition(PipelineEvent::DiffSucceeded).await?;
        let full_build = request.force_full_build || !diff.diffs_present();
        let (image_version_id, version_job) = self.version(request, &diff, full_build).await?;

        self.transition(PipelineEvent::VersionSucceeded).await?;
        self.await_installs(request).await?;

        self.transition(PipelineEvent::InstallsComplete).await?;
        info!(image_version_id = %image_version_id, "Deployment pipeline completed");

        Ok(DeploymentResult {
            image_version_id,
            success: version_job.success,
            full_build,
            diff_summary: summary,
        })
    }

    async fn transition(&self, event: PipelineEvent) -> Result<(), DeployError> {
        let mut fsm = self.fsm.write().await;
        fsm.process(event).map_err(DeployError::PipelineInvariant)
    }

    /// Update stage with the one-shot lock-conflict retry
    async fn update(&self, request: &DeploymentRequest) -> Result<Job, DeployError> {
        let params = UpdateJobParams::from(request);

        let job = self.run_update_job(&params).await?;
        if job.success {
            self.reporter.stage_completed(&job);
            return Ok(job);
        }

        let resolver = ConflictResolver::new(self.client.as_ref());
        let Recovery::Recovered { rejected_diff_id } = resolver.resolve(&request.account_id, &job).await?;

        warn!(diff_id = %rejected_diff_id, "Retrying image update after rejecting blocking diff");
        self.transition(PipelineEvent::LockRecovered).await?;

        let retry = self.run_update_job(&params).await?;
        if !retry.success {
            // A second lock is not retried
            return Err(match classify_update_failure(&retry) {
                UpdateFailure::LockConflict { diff_id } => DeployError::LockConflict { diff_id },
                UpdateFailure::Fatal { message } => DeployError::job_failed(Stage::Update, message),
            });
        }

        self.reporter.stage_completed(&retry);
        Ok(retry)
    }

    async fn run_update_job(&self, params: &UpdateJobParams) -> Result<Job, DeployError> {
        let created = self.client.create_update_job(params).await?;
        let client = self.client.as_ref();
        let account_id = params.account_id.as_str();
        let update_id = created.id.clone();

        self.poller
            .poll_until_terminal(created, || client.fetch_update_status(account_id, &update_id))
            .await
    }

    async fn diff(&self, request: &DeploymentRequest) -> Result<DiffResult, DeployError> {
        let params = DiffJobParams::from(request);
        let created = self.client.create_diff_job(&params).await?;
        let client = self.client.as_ref();
        let account_id = params.account_id.as_str();
        let diff_id = created.id.clone();

        let job = self
            .poller
            .poll_until_terminal(created, || client.fetch_diff_status(account_id, &diff_id))
            .await?;

        if !job.success {
            return Err(DeployError::job_failed(Stage::Diff, job.failure_message()));
        }

        self.reporter.stage_completed(&job);
        DiffResult::from_job(&diff_id, &job)
    }

    async fn version(
        &self,
        request: &DeploymentRequest,
        diff: &DiffResult,
        full_build: bool,
    ) -> Result<(String, Job), DeployError> {
        if diff.diff_id.is_empty() {
            return Err(DeployError::PipelineInvariant(
                "version stage requires a diff id".to_string(),
            ));
        }

        let params = VersionJobParams {
            account_id: request.account_id.clone(),
            diff_id: diff.diff_id.clone(),
            game_build: request.version_label.clone(),
            full: full_build,
            restart: true,
            install_at: VersionJobParams::INSTALL_NOW.to_string(),
            force: true,
        };

        let created = self.client.create_version_job(&params).await?;
        let client = self.client.as_ref();
        let account_id = params.account_id.as_str();
        let image_version_id = created.id.clone();

        let job = self
            .poller
            .poll_until_terminal(created, || {
                client.fetch_version_status(account_id, &image_version_id)
            })
            .await?;

        if !job.success {
            return Err(DeployError::job_failed(Stage::Version, job.failure_message()));
        }

        // Status snapshots may omit the id returned on creation
        let image_version_id = if job.id.is_empty() {
            image_version_id
        } else {
            job.id.clone()
        };

        self.reporter.stage_completed(&job);
        Ok((image_version_id, job))
    }

    async fn await_installs(&self, request: &DeploymentRequest) -> Result<InstallStatus, DeployError> {
        let client = self.client.as_ref();
        let account_id = request.account_id.as_str();

        self.poller
            .poll_until(
                Stage::Install,
                || client.fetch_install_status(account_id),
                InstallStatus::is_complete,
            )
            .await
    }
}
