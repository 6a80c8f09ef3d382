use std::fs;
use std::time::Duration;

use formfill_core::{
    Job, JobError, JobId, JobStage, Settings, ValidationError, DEFAULT_BACKEND_URL,
    DEFAULT_POLL_INTERVAL_MS, MAX_HISTORY_ENTRIES,
};
use formfill_engine::{
    AtomicFileWriter, ClientError, HistoryStore, SettingsStore, HISTORY_FILENAME,
    SETTINGS_FILENAME,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn job_id(n: usize) -> JobId {
    JobId::parse(&format!("{n:032x}")).unwrap()
}

fn ready(n: usize) -> Job {
    let mut job = Job::new(job_id(n), JobStage::Ready, 1.0);
    job.download_location = Some(format!("/jobs/{}/result", job_id(n)));
    job
}

fn failed(n: usize) -> Job {
    let mut job = Job::new(job_id(n), JobStage::Failed, 0.4);
    job.error = Some(JobError {
        kind: "RenderError".into(),
        detail: None,
    });
    job
}

#[test]
fn settings_missing_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::load(dir.path());
    assert_eq!(store.snapshot(), Settings::default());
    assert_eq!(store.snapshot().backend_url(), DEFAULT_BACKEND_URL);
    assert_eq!(store.snapshot().poll_interval_ms(), DEFAULT_POLL_INTERVAL_MS);
}

#[test]
fn settings_persist_and_reload() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::load(dir.path());
    store.set_backend_url("https://forms.example.com").unwrap();
    store.set_poll_interval_ms(5_000).unwrap();

    let reloaded = SettingsStore::load(dir.path());
    assert_eq!(reloaded.snapshot().backend_url(), "https://forms.example.com");
    assert_eq!(reloaded.snapshot().poll_interval_ms(), 5_000);
}

#[test]
fn invalid_settings_are_rejected_and_not_persisted() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::load(dir.path());
    store.set_poll_interval_ms(1_000).unwrap();

    let err = store.set_poll_interval_ms(100).unwrap_err();
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::PollIntervalTooShort { .. })
    ));
    let err = store.set_backend_url("ftp://forms.example.com").unwrap_err();
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::BackendUrlScheme)
    ));

    assert_eq!(store.snapshot().poll_interval_ms(), 1_000);
    let reloaded = SettingsStore::load(dir.path());
    assert_eq!(reloaded.snapshot().poll_interval_ms(), 1_000);
    assert_eq!(reloaded.snapshot().backend_url(), DEFAULT_BACKEND_URL);
}

#[test]
fn settings_reset_is_persisted() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::load(dir.path());
    store.set_poll_interval_ms(9_000).unwrap();
    store.reset().unwrap();

    assert_eq!(SettingsStore::load(dir.path()).snapshot(), Settings::default());
}

#[test]
fn corrupted_settings_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(SETTINGS_FILENAME), "(backend_url: \"http://").unwrap();
    assert_eq!(SettingsStore::load(dir.path()).snapshot(), Settings::default());
}

#[test]
fn out_of_range_persisted_settings_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(SETTINGS_FILENAME),
        "(backend_url: \"https://forms.example.com\", poll_interval_ms: 10)",
    )
    .unwrap();
    assert_eq!(SettingsStore::load(dir.path()).snapshot(), Settings::default());
}

#[test]
fn clones_share_settings() {
    let store = SettingsStore::in_memory(Settings::default());
    let view = store.clone();
    store.set_poll_interval_ms(750).unwrap();
    assert_eq!(view.snapshot().poll_interval(), Duration::from_millis(750));
}

#[test]
fn history_round_trips_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::load(dir.path());
    store.record(ready(1), Duration::from_secs(12)).unwrap();
    store.record(failed(2), Duration::from_millis(4_500)).unwrap();

    let reloaded = HistoryStore::load(dir.path()).entries();
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded[0].job, failed(2));
    assert_eq!(reloaded[0].duration, Duration::from_millis(4_500));
    assert_eq!(reloaded[1].job, ready(1));
    assert_eq!(reloaded[1].duration, Duration::from_secs(12));
}

#[test]
fn history_cap_survives_reload() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::load(dir.path());
    for n in 0..MAX_HISTORY_ENTRIES + 5 {
        store.record(ready(n), Duration::from_secs(1)).unwrap();
    }

    let reloaded = HistoryStore::load(dir.path()).entries();
    assert_eq!(reloaded.len(), MAX_HISTORY_ENTRIES);
    assert_eq!(reloaded[0].job.id, job_id(MAX_HISTORY_ENTRIES + 4));
    assert_eq!(reloaded[MAX_HISTORY_ENTRIES - 1].job.id, job_id(5));
}

#[test]
fn non_terminal_jobs_are_not_recorded() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::load(dir.path());
    let err = store
        .record(Job::new(job_id(1), JobStage::Detecting, 0.5), Duration::ZERO)
        .unwrap_err();

    assert!(matches!(err, ClientError::History(_)));
    assert!(store.entries().is_empty());
    assert!(!dir.path().join(HISTORY_FILENAME).exists());
}

#[test]
fn remove_and_clear_persist() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::load(dir.path());
    for n in 1..=3 {
        store.record(ready(n), Duration::from_secs(1)).unwrap();
    }

    assert!(store.remove(&job_id(2)).unwrap());
    assert!(!store.remove(&job_id(2)).unwrap());
    let ids: Vec<JobId> = HistoryStore::load(dir.path())
        .entries()
        .into_iter()
        .map(|entry| entry.job.id)
        .collect();
    assert_eq!(ids, vec![job_id(3), job_id(1)]);

    store.clear().unwrap();
    assert!(HistoryStore::load(dir.path()).entries().is_empty());
}

#[test]
fn corrupted_history_starts_empty() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(HISTORY_FILENAME), "not ron at all {").unwrap();
    assert!(HistoryStore::load(dir.path()).entries().is_empty());
}

#[test]
fn foreign_shaped_history_starts_empty() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(HISTORY_FILENAME),
        "(jobs: [\"a\", \"b\"], version: 3)",
    )
    .unwrap();
    assert!(HistoryStore::load(dir.path()).entries().is_empty());
}

#[test]
fn one_invalid_entry_discards_the_whole_ledger() {
    let dir = TempDir::new().unwrap();
    let store = HistoryStore::load(dir.path());
    store.record(ready(1), Duration::from_secs(1)).unwrap();
    store.record(ready(2), Duration::from_secs(1)).unwrap();

    // A failed entry without an error payload is not a valid record.
    let path = dir.path().join(HISTORY_FILENAME);
    let content = fs::read_to_string(&path).unwrap();
    let tampered = content.replacen("\"ready\"", "\"failed\"", 1);
    assert_ne!(content, tampered);
    fs::write(&path, tampered).unwrap();

    assert!(HistoryStore::load(dir.path()).entries().is_empty());
}

#[test]
fn atomic_writer_replaces_without_leftovers() {
    let dir = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(dir.path().join("state"));

    writer.write("data.ron", b"first version, quite long").unwrap();
    let target = writer.write("data.ron", b"second").unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"second");
    let names: Vec<_> = fs::read_dir(dir.path().join("state"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("data.ron")]);
}

#[test]
fn dropped_temp_file_leaves_target_untouched() {
    let dir = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(dir.path().to_path_buf());
    writer.write("data.ron", b"committed").unwrap();

    {
        use std::io::Write;
        let mut tmp = writer.begin().unwrap();
        tmp.write_all(b"half-writ").unwrap();
    }

    assert_eq!(fs::read(dir.path().join("data.ron")).unwrap(), b"committed");
}
