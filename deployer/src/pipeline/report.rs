//! Operator-facing console output

use colored::Colorize;

use crate::models::deployment::DeploymentResult;
use crate::models::diff::{ChangeKind, SummaryLine};
use crate::models::job::Job;
use crate::pipeline::orchestrator::PipelineReporter;

const BANNER_RULE: &str = "################";

/// Prints the diff summary and stage completions to stdout
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Render one summary line, colourised by change kind
    pub fn render_line(line: &SummaryLine) -> String {
        let text = line.to_string();
        match line.kind {
            ChangeKind::Added => text.green().to_string(),
            ChangeKind::Modified => text.yellow().to_string(),
            ChangeKind::Removed => text.red().to_string(),
        }
    }

    /// Final success banner
    pub fn banner(result: &DeploymentResult) -> String {
        format!(
            "\n{rule}\n{rule}\n{}\nImage version: {}{}\n{rule}\n{rule}",
            "Successfully Completed Deploy".green().bold(),
            result.image_version_id,
            if result.full_build { " (full build)" } else { "" },
            rule = BANNER_RULE,
        )
    }
}

impl PipelineReporter for ConsoleReporter {
    fn diff_summary(&self, lines: &[SummaryLine]) {
        if lines.is_empty() {
            println!("{}", "No changes detected, creating a full image version".yellow());
            return;
        }
        for line in lines {
            println!("{}", Self::render_line(line));
        }
    }

    fn stage_completed(&self, job: &Job) {
        println!("Completed {} Job: {}\n", job.stage, job.id);
    }
}
