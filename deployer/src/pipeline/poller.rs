//! Create-then-poll primitive shared by every stage

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::DeployError;
use crate::models::deployment::InstallStatus;
use crate::models::job::{Job, Stage};

/// Poller options
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Wait between two status fetches
    pub interval: Duration,

    /// Give up on a stage after this long. `None` polls forever.
    pub deadline: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            deadline: None,
        }
    }
}

/// Snapshot that reports progress each time it is fetched
pub trait Observed {
    fn observe(&self);
}

impl Observed for Job {
    fn observe(&self) {
        info!(
            stage = %self.stage,
            id = %self.id,
            progress = self.progress,
            state = %self.state_name,
            "{}% {}",
            self.progress,
            self.state_name
        );
    }
}

impl Observed for InstallStatus {
    fn observe(&self) {
        info!(
            pending = self.pending_install_count,
            "Image install status: {} pending",
            self.pending_install_count
        );
    }
}

/// Polls remote status until a predicate says the snapshot is final
#[derive(Debug, Clone, Default)]
pub struct JobPoller {
    options: PollOptions,
}

impl JobPoller {
    pub fn new(options: PollOptions) -> Self {
        Self { options }
    }

    /// Re-fetch a job until it reaches a terminal state.
    ///
    /// An already terminal job is returned without fetching. The job's
    /// `success` flag is left for the caller to interpret.
    pub async fn poll_until_terminal<F, Fut>(&self, initial: Job, fetch: F) -> Result<Job, DeployError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Job, DeployError>>,
    {
        let stage = initial.stage;
        self.poll(stage, Some(initial), fetch, Job::is_terminal).await
    }

    /// Fetch at least once, then keep fetching until `is_done` holds
    pub async fn poll_until<T, F, Fut, P>(
        &self,
        stage: Stage,
        fetch: F,
        is_done: P,
    ) -> Result<T, DeployError>
    where
        T: Observed,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DeployError>>,
        P: Fn(&T) -> bool,
    {
        self.poll(stage, None, fetch, is_done).await
    }

    async fn poll<T, F, Fut, P>(
        &self,
        stage: Stage,
        initial: Option<T>,
        fetch: F,
        is_done: P,
    ) -> Result<T, DeployError>
    where
        T: Observed,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DeployError>>,
        P: Fn(&T) -> bool,
    {
        let polling = self.poll_loop(initial, fetch, is_done);

        match self.options.deadline {
            Some(deadline) => tokio::time::timeout(deadline, polling)
                .await
                .map_err(|_| DeployError::Timeout {
                    stage,
                    after: deadline,
                })?,
            None => polling.await,
        }
    }

    async fn poll_loop<T, F, Fut, P>(
        &self,
        initial: Option<T>,
        mut fetch: F,
        is_done: P,
    ) -> Result<T, DeployError>
    where
        T: Observed,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DeployError>>,
        P: Fn(&T) -> bool,
    {
        let mut current = initial;
        let mut fetches: u64 = 0;

        loop {
            current = match current {
                Some(snapshot) if is_done(&snapshot) => {
                    debug!(fetches, "Polling finished");
                    return Ok(snapshot);
                }
                other => other,
            };

            if fetches > 0 {
                tokio::time::sleep(self.options.interval).await;
            }

            let snapshot = fetch().await?;
            fetches += 1;
            snapshot.observe();
            current = Some(snapshot);
        }
    }
}
