use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use formfill_core::{
    display_progress, estimate_remaining, update, Effect, FetchFailure, Job, JobId, Msg,
    PollSession,
};
use formfill_logging::{ff_debug, ff_error, ff_info, ff_warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{ApiError, HistoryStore, JobApi, PollEvent, SettingsStore};

pub trait PollSink: Send + Sync {
    fn emit(&self, event: PollEvent);
}

/// Forwards poll events into a Tokio channel.
pub struct ChannelPollSink {
    tx: mpsc::UnboundedSender<PollEvent>,
}

impl ChannelPollSink {
    pub fn new(tx: mpsc::UnboundedSender<PollEvent>) -> Self {
        Self { tx }
    }
}

impl PollSink for ChannelPollSink {
    fn emit(&self, event: PollEvent) {
        let _ = self.tx.send(event);
    }
}

struct TrackedJob {
    cancel: CancellationToken,
    latest: Option<Job>,
    last_error: Option<ApiError>,
}

struct Shared {
    api: Arc<dyn JobApi>,
    settings: SettingsStore,
    history: HistoryStore,
    sink: Arc<dyn PollSink>,
    sessions: Mutex<HashMap<JobId, TrackedJob>>,
}

impl Shared {
    fn sessions(&self) -> MutexGuard<'_, HashMap<JobId, TrackedJob>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps the status of every tracked job fresh.
///
/// Each job gets its own task that runs the `formfill_core::update` reducer and
/// executes its effects. The reducer only asks for a fetch when none is
/// outstanding and the task awaits each fetch before scheduling the next tick,
/// so at most one status request per job is in flight. Jobs never wait on
/// each other.
#[derive(Clone)]
pub struct PollEngine {
    shared: Arc<Shared>,
}

impl PollEngine {
    pub fn new(
        api: Arc<dyn JobApi>,
        settings: SettingsStore,
        history: HistoryStore,
        sink: Arc<dyn PollSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                settings,
                history,
                sink,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Starts polling `job_id` with an immediate first fetch. Returns false if
    /// the job is already tracked. Must be called within a Tokio runtime.
    pub fn track(&self, job_id: JobId) -> bool {
        let cancel = CancellationToken::new();
        {
            let mut sessions = self.shared.sessions();
            if sessions.contains_key(&job_id) {
                return false;
            }
            sessions.insert(
                job_id.clone(),
                TrackedJob {
                    cancel: cancel.clone(),
                    latest: None,
                    last_error: None,
                },
            );
        }

        ff_info!("Tracking job {}", job_id);
        let started_at = now();
        tokio::spawn(run_session(self.shared.clone(), job_id, cancel, started_at));
        true
    }

    /// Stops tracking. Any fetch still in flight is discarded when it resolves.
    pub fn remove(&self, job_id: &JobId) -> bool {
        match self.shared.sessions().remove(job_id) {
            Some(tracked) => {
                tracked.cancel.cancel();
                ff_info!("Stopped tracking job {}", job_id);
                true
            }
            None => false,
        }
    }

    pub fn shutdown(&self) {
        for (_, tracked) in self.shared.sessions().drain() {
            tracked.cancel.cancel();
        }
    }

    pub fn is_tracking(&self, job_id: &JobId) -> bool {
        self.shared.sessions().contains_key(job_id)
    }

    pub fn tracked(&self) -> Vec<JobId> {
        let mut ids: Vec<_> = self.shared.sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Last-known-good snapshot of a tracked job.
    pub fn latest(&self, job_id: &JobId) -> Option<Job> {
        self.shared
            .sessions()
            .get(job_id)
            .and_then(|tracked| tracked.latest.clone())
    }

    /// Error from the most recent failed tick, cleared by the next good snapshot.
    pub fn last_error(&self, job_id: &JobId) -> Option<ApiError> {
        self.shared
            .sessions()
            .get(job_id)
            .and_then(|tracked| tracked.last_error.clone())
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn run_session(
    shared: Arc<Shared>,
    job_id: JobId,
    cancel: CancellationToken,
    started_at: Instant,
) {
    let mut session = PollSession::new(job_id.clone(), started_at);
    let mut inbox = VecDeque::from([Msg::Tick]);
    let mut pending_error: Option<ApiError> = None;

    while let Some(msg) = inbox.pop_front() {
        let msg = if cancel.is_cancelled() { Msg::Removed } else { msg };
        let (next, effects) = update(session, msg);
        session = next;

        for effect in effects {
            match effect {
                Effect::FetchStatus => {
                    let outcome = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        result = shared.api.fetch_status(&job_id) => Some(result),
                    };
                    inbox.push_back(match outcome {
                        None => Msg::Removed,
                        Some(Ok(job)) => Msg::StatusFetched {
                            job,
                            received_at: now(),
                        },
                        Some(Err(err)) => {
                            let failure = FetchFailure::from(&err);
                            pending_error = Some(err);
                            Msg::FetchFailed(failure)
                        }
                    });
                }
                Effect::ScheduleTick => {
                    // Read per tick so a settings change applies without restarting the session.
                    let interval = shared.settings.snapshot().poll_interval();
                    let fired = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => false,
                        _ = tokio::time::sleep(interval) => true,
                    };
                    inbox.push_back(if fired { Msg::Tick } else { Msg::Removed });
                }
                Effect::Publish(job) => {
                    let elapsed = now().saturating_duration_since(session.started_at());
                    if !store_latest(&shared, &cancel, &job) {
                        continue;
                    }
                    let progress = display_progress(&job);
                    ff_debug!("Job {} at {} ({:.2})", job.id, job.status, progress);
                    shared.sink.emit(PollEvent::Snapshot {
                        remaining: estimate_remaining(progress, elapsed),
                        progress,
                        job,
                    });
                }
                Effect::ReportTransient(failure) => {
                    let error = pending_error
                        .take()
                        .unwrap_or_else(|| ApiError::ContractViolation(failure.message.clone()));
                    if !store_last_error(&shared, &cancel, &job_id, &error) {
                        continue;
                    }
                    ff_warn!("Status check for {} failed: {}", job_id, error);
                    shared.sink.emit(PollEvent::TransientError {
                        job_id: job_id.clone(),
                        error,
                    });
                }
                Effect::Finished { job, duration } => {
                    {
                        let mut sessions = shared.sessions();
                        if cancel.is_cancelled() {
                            continue;
                        }
                        sessions.remove(&job_id);
                    }
                    match &job.error {
                        Some(err) => ff_info!("Job {} failed: {}", job_id, err),
                        None => ff_info!("Job {} ready after {:?}", job_id, duration),
                    }
                    if let Err(err) = shared.history.record(job.clone(), duration) {
                        ff_error!("Failed to record job {} in history: {}", job_id, err);
                    }
                    shared.sink.emit(PollEvent::Terminal { job, duration });
                }
            }
        }
    }
    ff_debug!("Poll session for {} ended", job_id);
}

/// Records the snapshot unless the session was removed meanwhile.
fn store_latest(shared: &Shared, cancel: &CancellationToken, job: &Job) -> bool {
    let mut sessions = shared.sessions();
    match sessions.get_mut(&job.id) {
        Some(tracked) if !cancel.is_cancelled() => {
            tracked.latest = Some(job.clone());
            tracked.last_error = None;
            true
        }
        _ => false,
    }
}

/// Records a transient error unless the session was removed meanwhile.
fn store_last_error(
    shared: &Shared,
    cancel: &CancellationToken,
    job_id: &JobId,
    error: &ApiError,
) -> bool {
    let mut sessions = shared.sessions();
    match sessions.get_mut(job_id) {
        Some(tracked) if !cancel.is_cancelled() => {
            tracked.last_error = Some(error.clone());
            true
        }
        _ => false,
    }
}
