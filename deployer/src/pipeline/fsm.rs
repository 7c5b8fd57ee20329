//! Finite State Machine for the deployment pipeline

use serde::{Deserialize, Serialize};

/// Update attempts allowed when the first one hits an image lock
pub const MAX_UPDATE_ATTEMPTS: u32 = 2;

/// Pipeline state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Nothing submitted yet
    Start,

    /// Image update job in flight
    Updating,

    /// Image diff job in flight
    Diffing,

    /// Image version job in flight
    Versioning,

    /// Waiting for the fleet to install the new version
    AwaitingInstall,

    /// Every stage succeeded
    Done,

    /// A stage failed and the pipeline was abandoned
    FailedFatally,
}

/// Pipeline event
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Submit the update job
    StartUpdate,

    /// The blocking diff was rejected, submit the update job again
    LockRecovered,

    /// Update succeeded, submit the diff job
    UpdateSucceeded,

    /// Diff succeeded, submit the version job
    DiffSucceeded,

    /// Version committed, wait for installs
    VersionSucceeded,

    /// No installs left
    InstallsComplete,

    /// Unrecoverable error
    Fail(String),
}

/// Pipeline FSM
#[derive(Debug, Clone)]
pub struct PipelineFsm {
    state: PipelineState,
    error: Option<String>,
    update_attempts: u32,
}

impl PipelineFsm {
    /// Create a new FSM in the start state
    pub fn new() -> Self {
        Self {
            state: PipelineState::Start,
            error: None,
            update_attempts: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of update jobs submitted so far
    pub fn update_attempts(&self) -> u32 {
        self.update_attempts
    }

    /// Whether a lock conflict may still be retried
    pub fn can_retry_update(&self) -> bool {
        self.state == PipelineState::Updating && self.update_attempts < MAX_UPDATE_ATTEMPTS
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: PipelineEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (PipelineState::Start, PipelineEvent::StartUpdate) => {
                self.update_attempts = 1;
                PipelineState::Updating
            }

            (PipelineState::Updating, PipelineEvent::LockRecovered) if self.can_retry_update() => {
                self.update_attempts += 1;
                PipelineState::Updating
            }
            (PipelineState::Updating, PipelineEvent::UpdateSucceeded) => PipelineState::Diffing,
            (PipelineState::Diffing, PipelineEvent::DiffSucceeded) => PipelineState::Versioning,
            (PipelineState::Versioning, PipelineEvent::VersionSucceeded) => PipelineState::AwaitingInstall,
            (PipelineState::AwaitingInstall, PipelineEvent::InstallsComplete) => PipelineState::Done,

            // Any in-flight state may fail
            (
                PipelineState::Start
                | PipelineState::Updating
                | PipelineState::Diffing
                | PipelineState::Versioning
                | PipelineState::AwaitingInstall,
                PipelineEvent::Fail(err),
            ) => {
                self.error = Some(err.clone());
                PipelineState::FailedFatally
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for PipelineFsm {
    fn default() -> Self {
        Self::new()
    }
}
