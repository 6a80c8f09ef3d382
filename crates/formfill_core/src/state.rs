use std::time::Instant;

use crate::{Job, JobId};

/// Why a status fetch produced no snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network error, timeout or non-2xx status.
    Transport,
    /// The server answered with a payload outside the wire contract.
    Contract,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub class: FailureClass,
    pub message: String,
}

impl FetchFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Transport,
            message: message.into(),
        }
    }

    pub fn contract(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Contract,
            message: message.into(),
        }
    }
}

/// Tracking state for one actively polled job.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSession {
    job_id: JobId,
    started_at: Instant,
    job: Option<Job>,
    last_failure: Option<FetchFailure>,
    in_flight: bool,
    cancelled: bool,
    finished: bool,
}

impl PollSession {
    pub fn new(job_id: JobId, started_at: Instant) -> Self {
        Self {
            job_id,
            started_at,
            job: None,
            last_failure: None,
            in_flight: false,
            cancelled: false,
            finished: false,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Last-known-good snapshot, kept across transient failures.
    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    /// Most recent failed tick, cleared by the next successful fetch.
    pub fn last_failure(&self) -> Option<&FetchFailure> {
        self.last_failure.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// No further effects will ever be produced for this session.
    pub fn is_closed(&self) -> bool {
        self.cancelled || self.finished
    }

    pub(crate) fn begin_fetch(&mut self) {
        self.in_flight = true;
    }

    pub(crate) fn end_fetch(&mut self) {
        self.in_flight = false;
    }

    pub(crate) fn store(&mut self, job: Job) {
        self.job = Some(job);
        self.last_failure = None;
    }

    pub(crate) fn store_failure(&mut self, failure: FetchFailure) {
        self.last_failure = Some(failure);
    }

    pub(crate) fn cancel(&mut self) {
        self.cancelled = true;
        self.in_flight = false;
    }

    pub(crate) fn finish(&mut self) {
        self.finished = true;
    }
}
