//! Persisted client state: settings and the history ledger.
//!
//! Both stores load-then-validate. Missing, unreadable, corrupted or
//! foreign-shaped files reset the store to defaults instead of failing startup.
//! Every mutation is written through [`AtomicFileWriter`] while the store lock
//! is held, so concurrent `record`/`remove`/`clear` calls never interleave.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use formfill_core::{History, HistoryEntry, Job, JobError, JobId, JobStage, Settings};
use formfill_logging::{ff_error, ff_info, ff_warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::persist::{AtomicFileWriter, PersistError};
use crate::ClientError;

pub const SETTINGS_FILENAME: &str = "formfill-settings.ron";
pub const HISTORY_FILENAME: &str = "formfill-history.ron";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSettings {
    backend_url: String,
    poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedJobError {
    kind: String,
    detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedJob {
    job_id: String,
    status: String,
    progress: f64,
    message: Option<String>,
    download_url: Option<String>,
    error: Option<PersistedJobError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntry {
    job: PersistedJob,
    completed_at: String,
    duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedHistory {
    entries: Vec<PersistedEntry>,
}

/// Shared, persisted [`Settings`]. Clones share one underlying value, so a
/// change is visible to the transport and poller on their next read.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    writer: Option<AtomicFileWriter>,
}

impl SettingsStore {
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            writer: None,
        }
    }

    pub fn load(dir: &Path) -> Self {
        let settings = read_state::<PersistedSettings>(&dir.join(SETTINGS_FILENAME))
            .and_then(|persisted| {
                match Settings::new(&persisted.backend_url, persisted.poll_interval_ms) {
                    Ok(settings) => Some(settings),
                    Err(err) => {
                        ff_warn!("Persisted settings rejected ({}), using defaults", err);
                        None
                    }
                }
            })
            .unwrap_or_default();

        Self {
            settings: Arc::new(RwLock::new(settings)),
            writer: Some(AtomicFileWriter::new(dir.to_path_buf())),
        }
    }

    pub fn snapshot(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_backend_url(&self, url: &str) -> Result<(), ClientError> {
        self.modify(|settings| settings.set_backend_url(url).map_err(ClientError::from))
    }

    pub fn set_poll_interval_ms(&self, interval_ms: u64) -> Result<(), ClientError> {
        self.modify(|settings| {
            settings
                .set_poll_interval_ms(interval_ms)
                .map_err(ClientError::from)
        })
    }

    pub fn reset(&self) -> Result<(), ClientError> {
        self.modify(|settings| {
            settings.reset();
            Ok(())
        })
    }

    fn modify(
        &self,
        change: impl FnOnce(&mut Settings) -> Result<(), ClientError>,
    ) -> Result<(), ClientError> {
        let mut guard = self
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        change(&mut next)?;
        if let Some(writer) = &self.writer {
            let persisted = PersistedSettings {
                backend_url: next.backend_url().to_string(),
                poll_interval_ms: next.poll_interval_ms(),
            };
            write_state(writer, SETTINGS_FILENAME, &persisted)?;
        }
        *guard = next;
        Ok(())
    }
}

/// Shared, persisted [`History`] ledger.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    history: Arc<Mutex<History>>,
    writer: Option<AtomicFileWriter>,
}

impl HistoryStore {
    pub fn in_memory() -> Self {
        Self {
            history: Arc::new(Mutex::new(History::new())),
            writer: None,
        }
    }

    pub fn load(dir: &Path) -> Self {
        let path = dir.join(HISTORY_FILENAME);
        let history = read_state::<PersistedHistory>(&path)
            .and_then(|persisted| match restore_history(persisted) {
                Some(history) => {
                    ff_info!("Loaded {} history entries from {:?}", history.len(), path);
                    Some(history)
                }
                None => {
                    ff_warn!("Persisted history at {:?} failed validation, starting empty", path);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            history: Arc::new(Mutex::new(history)),
            writer: Some(AtomicFileWriter::new(dir.to_path_buf())),
        }
    }

    pub fn snapshot(&self) -> History {
        self.lock().clone()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Prepends a terminal job, evicting the oldest entry past capacity.
    pub fn record(&self, job: Job, duration: Duration) -> Result<(), ClientError> {
        let completed_at = Utc::now();
        self.modify(|history| {
            history
                .record(job, duration, completed_at)
                .map_err(ClientError::from)
        })
    }

    pub fn remove(&self, job_id: &JobId) -> Result<bool, ClientError> {
        let mut removed = false;
        self.modify(|history| {
            removed = history.remove(job_id);
            Ok(())
        })?;
        Ok(removed)
    }

    pub fn clear(&self) -> Result<(), ClientError> {
        self.modify(|history| {
            history.clear();
            Ok(())
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn modify(
        &self,
        change: impl FnOnce(&mut History) -> Result<(), ClientError>,
    ) -> Result<(), ClientError> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        change(&mut next)?;
        if let Some(writer) = &self.writer {
            write_state(writer, HISTORY_FILENAME, &persist_history(&next))?;
        }
        *guard = next;
        Ok(())
    }
}

fn read_state<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            ff_warn!("Failed to read persisted state from {:?}: {}", path, err);
            return None;
        }
    };

    match ron::from_str(&content) {
        Ok(state) => Some(state),
        Err(err) => {
            ff_warn!("Failed to parse persisted state from {:?}: {}", path, err);
            None
        }
    }
}

fn write_state<T: Serialize>(
    writer: &AtomicFileWriter,
    filename: &str,
    state: &T,
) -> Result<(), PersistError> {
    let pretty = ron::ser::PrettyConfig::new();
    let content = ron::ser::to_string_pretty(state, pretty)
        .map_err(|err| PersistError::Serialize(err.to_string()))?;
    writer
        .write(filename, content.as_bytes())
        .map_err(|err| {
            ff_error!(
                "Failed to write {} to {:?}: {}",
                filename,
                writer.dir(),
                err
            );
            err
        })
        .map(|_| ())
}

fn persist_history(history: &History) -> PersistedHistory {
    PersistedHistory {
        entries: history
            .iter()
            .map(|entry| PersistedEntry {
                job: PersistedJob {
                    job_id: entry.job.id.to_string(),
                    status: entry.job.status.as_str().to_string(),
                    progress: entry.job.progress,
                    message: entry.job.message.clone(),
                    download_url: entry.job.download_location.clone(),
                    error: entry.job.error.as_ref().map(|err| PersistedJobError {
                        kind: err.kind.clone(),
                        detail: err.detail.clone(),
                    }),
                },
                completed_at: entry.completed_at.to_rfc3339(),
                duration_ms: u64::try_from(entry.duration.as_millis()).unwrap_or(u64::MAX),
            })
            .collect(),
    }
}

/// All-or-nothing: one invalid entry discards the whole ledger.
fn restore_history(persisted: PersistedHistory) -> Option<History> {
    let entries = persisted
        .entries
        .into_iter()
        .map(restore_entry)
        .collect::<Option<Vec<_>>>()?;
    History::from_entries(entries).ok()
}

fn restore_entry(entry: PersistedEntry) -> Option<HistoryEntry> {
    let completed_at = DateTime::parse_from_rfc3339(&entry.completed_at)
        .ok()?
        .with_timezone(&Utc);
    Some(HistoryEntry {
        job: restore_job(entry.job)?,
        completed_at,
        duration: Duration::from_millis(entry.duration_ms),
    })
}

fn restore_job(job: PersistedJob) -> Option<Job> {
    let status = JobStage::from_wire(&job.status)?;
    if !status.is_terminal() || !(0.0..=1.0).contains(&job.progress) {
        return None;
    }
    let error = match (status, job.error) {
        (JobStage::Failed, Some(err)) => Some(JobError {
            kind: err.kind,
            detail: err.detail,
        }),
        (JobStage::Failed, None) | (_, Some(_)) => return None,
        (_, None) => None,
    };
    Some(Job {
        id: JobId::parse(&job.job_id).ok()?,
        status,
        progress: job.progress,
        message: job.message,
        download_location: job.download_url,
        error,
    })
}
