use std::time::Duration;

use crate::{Job, JobStage};

/// Below this fraction an extrapolated ETA is too noisy to show.
pub const MIN_PROGRESS_FOR_ESTIMATE: f64 = 0.01;
/// Estimates beyond this are discarded.
pub const MAX_ESTIMATE: Duration = Duration::from_secs(24 * 60 * 60);

/// Share of total processing time typically spent in each stage.
pub fn stage_weight(stage: JobStage) -> f64 {
    match stage {
        JobStage::Queued => 0.0,
        JobStage::Validating => 0.05,
        JobStage::Rendering => 0.25,
        JobStage::Detecting => 0.60,
        JobStage::Writing => 0.10,
        JobStage::Ready | JobStage::Failed => 1.0,
    }
}

/// Progress implied by having reached `stage`: the summed weight of every
/// stage before it. Terminal stages count as complete.
pub fn cumulative_weight(stage: JobStage) -> f64 {
    if stage.is_terminal() {
        return 1.0;
    }
    JobStage::ALL
        .into_iter()
        .take_while(|s| *s < stage)
        .map(stage_weight)
        .sum()
}

/// Fraction to display for a job. A nonzero server fraction wins; otherwise the
/// static stage weight keeps the indicator moving between coarse updates.
pub fn display_progress(job: &Job) -> f64 {
    if job.progress > 0.0 {
        job.progress.min(1.0)
    } else {
        cumulative_weight(job.status)
    }
}

/// Linear extrapolation of the remaining time from progress so far.
pub fn estimate_remaining(progress: f64, elapsed: Duration) -> Option<Duration> {
    // NaN fails this comparison too. Without elapsed time there is nothing to extrapolate.
    if !(progress >= MIN_PROGRESS_FOR_ESTIMATE) || elapsed.is_zero() {
        return None;
    }
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    let total_ms = elapsed_ms / progress.min(1.0);
    let remaining_ms = (total_ms - elapsed_ms).max(0.0);
    let remaining = Duration::from_millis(remaining_ms.round() as u64);
    if remaining > MAX_ESTIMATE {
        return None;
    }
    Some(remaining)
}
