use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Job, JobId, JobStage};

pub const MAX_HISTORY_ENTRIES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("job {job_id} is still {status}; only terminal jobs can be recorded")]
    NotTerminal { job_id: JobId, status: JobStage },
}

/// Immutable record of a job that reached a terminal stage.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub job: Job,
    pub completed_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Capped ledger of finished jobs, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(MAX_HISTORY_ENTRIES)
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuilds a ledger from entries already in newest-first order, dropping
    /// anything past capacity.
    pub fn from_entries(
        entries: impl IntoIterator<Item = HistoryEntry>,
    ) -> Result<Self, HistoryError> {
        let mut history = Self::default();
        for entry in entries.into_iter().take(history.capacity) {
            ensure_terminal(&entry.job)?;
            history.entries.push_back(entry);
        }
        Ok(history)
    }

    pub fn record(
        &mut self,
        job: Job,
        duration: Duration,
        completed_at: DateTime<Utc>,
    ) -> Result<(), HistoryError> {
        ensure_terminal(&job)?;
        self.entries.push_front(HistoryEntry {
            job,
            completed_at,
            duration,
        });
        self.entries.truncate(self.capacity);
        Ok(())
    }

    /// Removes the first entry for `job_id`. Returns whether anything was removed.
    pub fn remove(&mut self, job_id: &JobId) -> bool {
        match self.entries.iter().position(|e| &e.job.id == job_id) {
            Some(index) => self.entries.remove(index).is_some(),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn get(&self, job_id: &JobId) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| &e.job.id == job_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn ensure_terminal(job: &Job) -> Result<(), HistoryError> {
    if job.is_terminal() {
        Ok(())
    } else {
        Err(HistoryError::NotTerminal {
            job_id: job.id.clone(),
            status: job.status,
        })
    }
}
