use std::fmt;
use std::time::Duration;

use formfill_core::{
    FetchFailure, HistoryError, Job, JobError, JobId, JobStage, ValidationError,
};

use crate::persist::PersistError;

/// Result of `POST /jobs`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCreated {
    pub job_id: JobId,
    pub status: JobStage,
    pub progress: f64,
}

impl JobCreated {
    pub fn into_job(self) -> Job {
        Job::new(self.job_id, self.status, self.progress)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportKind {
    Network,
    Timeout,
    HttpStatus(u16),
    /// Request could not be built, e.g. an unusable base address.
    Client,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Network => write!(f, "network error"),
            TransportKind::Timeout => write!(f, "timeout"),
            TransportKind::HttpStatus(code) => write!(f, "http status {code}"),
            TransportKind::Client => write!(f, "client error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{kind}: {message}")]
    Transport { kind: TransportKind, message: String },
    /// Response arrived but does not match the wire contract.
    #[error("contract violation: {0}")]
    ContractViolation(String),
}

impl ApiError {
    pub(crate) fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        ApiError::Transport {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn contract(message: impl Into<String>) -> Self {
        ApiError::ContractViolation(message.into())
    }

    /// Worth another attempt for an idempotent request.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport { kind, .. } => match kind {
                TransportKind::Network | TransportKind::Timeout => true,
                TransportKind::HttpStatus(code) => {
                    matches!(code, 408 | 413 | 429 | 500 | 502 | 503 | 504)
                }
                TransportKind::Client => false,
            },
            ApiError::ContractViolation(_) => false,
        }
    }
}

impl From<&ApiError> for FetchFailure {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Transport { .. } => FetchFailure::transport(err.to_string()),
            ApiError::ContractViolation(detail) => FetchFailure::contract(detail.clone()),
        }
    }
}

/// Everything a user-initiated action can end with besides success.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("job failed: {0}")]
    JobFailed(JobError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Observations emitted by the polling engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    Snapshot {
        job: Job,
        progress: f64,
        remaining: Option<Duration>,
    },
    /// Tick failed; the session keeps its last-known-good job and keeps polling.
    TransientError { job_id: JobId, error: ApiError },
    Terminal { job: Job, duration: Duration },
}

impl PollEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            PollEvent::Snapshot { job, .. } | PollEvent::Terminal { job, .. } => &job.id,
            PollEvent::TransientError { job_id, .. } => job_id,
        }
    }
}
