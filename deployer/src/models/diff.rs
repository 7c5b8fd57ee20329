//! Diff stage result and its operator summary

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::models::job::{ChangeSet, Job, Stage};

/// Kind of change a summary line describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn marker(&self) -> char {
        match self {
            ChangeKind::Added => '+',
            ChangeKind::Modified => '*',
            ChangeKind::Removed => '-',
        }
    }
}

/// One line of the diff summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub kind: ChangeKind,
    pub path: String,
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.marker(), self.path)
    }
}

/// Output of a successful diff job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Diff resource id, required by the version stage
    pub diff_id: String,

    pub changes: ChangeSet,
}

impl DiffResult {
    /// Build the result from the terminal diff snapshot.
    ///
    /// `created_id` is the id returned on creation; the final snapshot may
    /// omit it.
    pub fn from_job(created_id: &str, job: &Job) -> Result<Self, DeployError> {
        if job.stage != Stage::Diff {
            return Err(DeployError::PipelineInvariant(format!(
                "expected a diff job, got {}",
                job.stage
            )));
        }

        let diff_id = if job.id.is_empty() { created_id } else { &job.id };
        if diff_id.is_empty() {
            return Err(DeployError::PipelineInvariant(
                "diff job completed without a diff id".to_string(),
            ));
        }

        Ok(Self {
            diff_id: diff_id.to_string(),
            changes: job.changes.clone().unwrap_or_default(),
        })
    }

    /// Whether the diff contains at least one added, modified or removed path
    pub fn diffs_present(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Summary lines grouped added, modified, removed and sorted by path
    /// within each group
    pub fn summary(&self) -> Vec<SummaryLine> {
        let groups = [
            (ChangeKind::Added, &self.changes.added),
            (ChangeKind::Modified, &self.changes.modified),
            (ChangeKind::Removed, &self.changes.removed),
        ];

        groups
            .into_iter()
            .flat_map(|(kind, paths)| {
                // BTreeMap keys iterate in lexicographic order
                paths.keys().map(move |path| SummaryLine {
                    kind,
                    path: path.clone(),
                })
            })
            .collect()
    }
}
