use std::fmt;
use std::str::FromStr;

use crate::ValidationError;

/// Length of the server-issued job token (UUID in hex form).
pub const JOB_ID_LEN: usize = 32;

/// Opaque, server-issued job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.len() != JOB_ID_LEN || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidJobId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for JobId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Processing stages in pipeline order. `Failed` may follow any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobStage {
    Queued,
    Validating,
    Rendering,
    Detecting,
    Writing,
    Ready,
    Failed,
}

impl JobStage {
    pub const ALL: [JobStage; 7] = [
        JobStage::Queued,
        JobStage::Validating,
        JobStage::Rendering,
        JobStage::Detecting,
        JobStage::Writing,
        JobStage::Ready,
        JobStage::Failed,
    ];

    /// Wire tag used by the inference service.
    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Queued => "queued",
            JobStage::Validating => "validating",
            JobStage::Rendering => "rendering",
            JobStage::Detecting => "detecting",
            JobStage::Writing => "writing",
            JobStage::Ready => "ready",
            JobStage::Failed => "failed",
        }
    }

    /// Parses a wire tag. Unknown tags are rejected, never mapped to a fallback.
    pub fn from_wire(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == tag)
    }

    pub fn is_terminal(self) -> bool {
        is_terminal(self)
    }

    /// True while the server is actively working on the job.
    pub fn is_processing(self) -> bool {
        !self.is_terminal() && self != JobStage::Queued
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStage::Queued => "Queued",
            JobStage::Validating => "Validating PDF",
            JobStage::Rendering => "Rendering pages",
            JobStage::Detecting => "Detecting form fields",
            JobStage::Writing => "Writing form fields",
            JobStage::Ready => "Ready",
            JobStage::Failed => "Failed",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            JobStage::Queued => "Job is waiting in queue to be processed",
            JobStage::Validating => "Checking PDF format and extracting metadata",
            JobStage::Rendering => "Converting PDF pages to images for analysis",
            JobStage::Detecting => "Using ML model to detect form field locations",
            JobStage::Writing => "Creating interactive form fields in PDF",
            JobStage::Ready => "Processing complete, ready to download",
            JobStage::Failed => "Job processing encountered an error",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True exactly for `Ready` and `Failed`.
pub fn is_terminal(stage: JobStage) -> bool {
    matches!(stage, JobStage::Ready | JobStage::Failed)
}

/// Server-reported failure reason, carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobError {
    pub kind: String,
    pub detail: Option<String>,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.kind, detail),
            None => f.write_str(&self.kind),
        }
    }
}

/// One validated status snapshot of a job.
///
/// `error` is populated if and only if `status` is `Failed`; the wire schema
/// enforces this before a `Job` is ever constructed from a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub status: JobStage,
    pub progress: f64,
    pub message: Option<String>,
    pub download_location: Option<String>,
    pub error: Option<JobError>,
}

impl Job {
    /// Snapshot with only the fields every response carries.
    pub fn new(id: JobId, status: JobStage, progress: f64) -> Self {
        Self {
            id,
            status,
            progress,
            message: None,
            download_location: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Download location, only while the job is `Ready`.
    pub fn ready_location(&self) -> Option<&str> {
        match self.status {
            JobStage::Ready => self.download_location.as_deref(),
            _ => None,
        }
    }
}

/// Folds a freshly fetched snapshot into the recorded state of a job.
///
/// The first snapshot is adopted unconditionally. Non-terminal snapshots always
/// replace non-terminal state, whatever their stage order. Once a terminal
/// status is recorded it is sticky: a late snapshot is only adopted if it
/// reports the same terminal status.
pub fn apply_status(previous: Option<&Job>, fetched: Job) -> Job {
    match previous {
        Some(prev) if prev.is_terminal() && prev.status != fetched.status => prev.clone(),
        _ => fetched,
    }
}
