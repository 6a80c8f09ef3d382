//! Text rendering for terminal output. Pure functions over core view models.

use std::time::Duration;

use chrono::Local;
use formfill_core::{format_duration, HistoryEntry, Job, JobView, Settings};
use formfill_engine::ApiError;

pub fn job_line(job: &Job, elapsed: Duration) -> String {
    let view = JobView::new(job, elapsed);
    let mut line = format!(
        "{}  {:<24} {:>4}  {}",
        view.job_id, view.stage_label, view.progress_text, view.timing_text
    );
    if let Some(message) = &view.message {
        line.push_str("  ");
        line.push_str(message);
    }
    if let Some(error) = &view.error_text {
        line.push_str("  error: ");
        line.push_str(error);
    }
    line
}

/// Multi-line detail for a single status check.
pub fn status_block(job: &Job) -> String {
    let view = JobView::new(job, Duration::ZERO);
    let mut lines = vec![
        format!("job       {}", view.job_id),
        format!("stage     {} ({})", view.stage_label, job.status.description()),
        format!("progress  {}", view.progress_text),
    ];
    if let Some(message) = &view.message {
        lines.push(format!("message   {message}"));
    }
    if let Some(location) = job.ready_location() {
        lines.push(format!("result    {location}"));
    }
    if let Some(error) = &view.error_text {
        lines.push(format!("error     {error}"));
    }
    lines.join("\n")
}

pub fn transient_notice(job: Option<&Job>, error: &ApiError) -> String {
    match job {
        Some(job) => format!(
            "{}  status check failed ({}); still showing {}",
            job.id,
            error,
            job.status.label()
        ),
        None => format!("status check failed ({error}); retrying"),
    }
}

pub fn history_table(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No finished jobs.".to_string();
    }
    entries
        .iter()
        .map(|entry| {
            let outcome = match &entry.job.error {
                Some(error) => format!("failed: {error}"),
                None => entry.job.status.label().to_string(),
            };
            format!(
                "{}  {}  {:>8}  {}",
                entry.completed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                entry.job.id,
                format_duration(entry.duration),
                outcome
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn settings_block(settings: &Settings) -> String {
    format!(
        "backend_url      {}\npoll_interval_ms {}",
        settings.backend_url(),
        settings.poll_interval_ms()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use formfill_core::{JobError, JobId, JobStage};
    use formfill_engine::TransportKind;
    use pretty_assertions::assert_eq;

    const ID: &str = "0123456789abcdef0123456789abcdef";

    fn job(status: JobStage, progress: f64) -> Job {
        Job::new(JobId::parse(ID).unwrap(), status, progress)
    }

    #[test]
    fn job_line_shows_stage_percent_and_timing() {
        let mut detecting = job(JobStage::Detecting, 0.5);
        detecting.message = Some("page 3 of 6".into());
        let line = job_line(&detecting, Duration::from_secs(12));

        assert!(line.starts_with(ID));
        assert!(line.contains("Detecting form fields"));
        assert!(line.contains("50%"));
        assert!(line.contains("page 3 of 6"));
    }

    #[test]
    fn failed_job_line_carries_error() {
        let mut failed = job(JobStage::Failed, 0.3);
        failed.error = Some(JobError {
            kind: "RenderError".into(),
            detail: Some("page 2 is encrypted".into()),
        });
        let line = job_line(&failed, Duration::from_secs(4));
        assert!(line.contains("error: RenderError"));
        assert!(line.contains("page 2 is encrypted"));
    }

    #[test]
    fn status_block_shows_result_only_when_ready() {
        let mut ready = job(JobStage::Ready, 1.0);
        ready.download_location = Some(format!("/jobs/{ID}/result"));
        assert!(status_block(&ready).contains("result    /jobs/"));

        let mut writing = job(JobStage::Writing, 0.9);
        writing.download_location = Some(format!("/jobs/{ID}/result"));
        let block = status_block(&writing);
        assert!(!block.contains("result"));
        assert!(block.contains("90%"));
    }

    #[test]
    fn transient_notice_keeps_last_known_stage() {
        let error = ApiError::Transport {
            kind: TransportKind::Timeout,
            message: "timed out".into(),
        };
        let notice = transient_notice(Some(&job(JobStage::Rendering, 0.0)), &error);
        assert!(notice.contains("status check failed"));
        assert!(notice.contains(JobStage::Rendering.label()));
    }

    #[test]
    fn history_table_lists_entries() {
        assert_eq!(history_table(&[]), "No finished jobs.");

        let entry = HistoryEntry {
            job: job(JobStage::Ready, 1.0),
            completed_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            duration: Duration::from_secs(90),
        };
        let table = history_table(&[entry]);
        assert!(table.contains(ID));
        assert!(table.contains("1m 30s"));
        assert!(table.contains(JobStage::Ready.label()));
    }

    #[test]
    fn settings_block_shows_both_values() {
        assert_eq!(
            settings_block(&Settings::default()),
            "backend_url      http://localhost:8000\npoll_interval_ms 2000"
        );
    }
}
