//! Remote job models

use std::fmt;

use cfp_api::{FileChanges, JobResponse};
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Pipeline stage a job belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Update,
    Diff,
    Version,
    Install,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Update => "Image update",
            Stage::Diff => "Image diff",
            Stage::Version => "Image version",
            Stage::Install => "Image install",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a remote job, mapped 1:1 to the wire `jobstateid`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Created,
    Pending,
    Queued,
    Running,
    Complete,
    Failed,
    Squashed,
}

impl JobState {
    const TABLE: [(i64, JobState); 7] = [
        (1, JobState::Created),
        (2, JobState::Pending),
        (3, JobState::Queued),
        (4, JobState::Running),
        (5, JobState::Complete),
        (6, JobState::Failed),
        (7, JobState::Squashed),
    ];

    /// Wire code of this state
    pub fn code(&self) -> i64 {
        Self::TABLE
            .iter()
            .find(|(_, state)| state == self)
            .map(|(code, _)| *code)
            .unwrap_or_default()
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::TABLE
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, state)| *state)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed | JobState::Squashed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Created => "Created",
            JobState::Pending => "Pending",
            JobState::Queued => "Queued",
            JobState::Running => "Running",
            JobState::Complete => "Complete",
            JobState::Failed => "Failed",
            JobState::Squashed => "Squashed",
        }
    }
}

impl TryFrom<i64> for JobState {
    type Error = DeployError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        JobState::from_code(code)
            .ok_or_else(|| DeployError::InvalidResponse(format!("unknown jobstateid {}", code)))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// File-level changes reported by a diff job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: FileChanges,
    pub modified: FileChanges,
    pub removed: FileChanges,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Immutable snapshot of a remote job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Stage-specific id (update id, diff id or image version id)
    pub id: String,

    pub stage: Stage,

    pub state: JobState,

    /// Name reported by the backend, falls back to the state name
    pub state_name: String,

    /// Advisory percent complete
    pub progress: u8,

    /// Authoritative outcome, only meaningful once terminal
    pub success: bool,

    pub error_code: Option<i64>,

    pub error_message: Option<String>,

    pub job_error: Option<String>,

    /// Only populated by diff jobs
    pub changes: Option<ChangeSet>,
}

impl Job {
    /// Convert a wire response into a snapshot for the given stage.
    ///
    /// A response without `jobstateid` is only accepted when it reports an
    /// error, in which case the job is considered to have failed on creation.
    pub fn from_response(stage: Stage, response: JobResponse) -> Result<Self, DeployError> {
        let state = match response.jobstateid {
            Some(code) => JobState::try_from(code)?,
            None if response.error || !response.success => JobState::Failed,
            None => {
                return Err(DeployError::InvalidResponse(format!(
                    "{} response carries no jobstateid",
                    stage
                )))
            }
        };

        let id = match stage {
            Stage::Update => response.updateid,
            Stage::Diff => response.diffid,
            Stage::Version => response.imageversionid,
            Stage::Install => None,
        };
        let id = match id {
            Some(id) => id,
            None if state.is_terminal() => String::new(),
            None => {
                return Err(DeployError::InvalidResponse(format!(
                    "{} job in state {} has no id",
                    stage, state
                )))
            }
        };

        let changes = (stage == Stage::Diff).then(|| ChangeSet {
            added: response.added,
            modified: response.modified,
            removed: response.removed,
        });

        Ok(Self {
            id,
            stage,
            state,
            state_name: response.jobstatename.unwrap_or_else(|| state.name().to_string()),
            progress: response.jobprogress.unwrap_or_default(),
            success: response.success,
            error_code: response.error_code,
            error_message: response.error_message,
            job_error: response.joberror,
            changes,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Best available failure description, verbatim from the backend
    pub fn failure_message(&self) -> String {
        self.job_error
            .clone()
            .or_else(|| self.error_message.clone())
            .unwrap_or_else(|| format!("job ended in state {}", self.state_name))
    }
}
