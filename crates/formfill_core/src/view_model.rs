use std::time::Duration;

use crate::format::{format_duration, format_progress};
use crate::progress::{display_progress, estimate_remaining};
use crate::{Job, JobId, JobStage};

/// Presentation-ready summary of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub job_id: JobId,
    pub stage: JobStage,
    pub stage_label: &'static str,
    pub progress: f64,
    pub progress_text: String,
    pub message: Option<String>,
    pub timing_text: String,
    pub remaining: Option<Duration>,
    pub error_text: Option<String>,
}

impl JobView {
    pub fn new(job: &Job, elapsed: Duration) -> Self {
        let progress = display_progress(job);
        let remaining = if job.is_terminal() {
            None
        } else {
            estimate_remaining(progress, elapsed)
        };
        let timing_text = match (job.is_terminal(), remaining) {
            (true, _) => format!("Completed in {}", format_duration(elapsed)),
            (false, Some(left)) => format!(
                "Processing for {} (~{} remaining)",
                format_duration(elapsed),
                format_duration(left)
            ),
            (false, None) => format!("Processing for {}", format_duration(elapsed)),
        };

        Self {
            job_id: job.id.clone(),
            stage: job.status,
            stage_label: job.status.label(),
            progress,
            progress_text: format_progress(progress),
            message: job.message.clone(),
            timing_text,
            remaining,
            error_text: job.error.as_ref().map(ToString::to_string),
        }
    }
}
