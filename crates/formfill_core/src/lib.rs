//! Formfill core: job model, pure state machines and view-model helpers.
mod effect;
mod format;
mod history;
mod job;
mod msg;
mod options;
mod progress;
mod settings;
mod state;
mod update;
mod validation;
mod view_model;

pub use effect::Effect;
pub use format::{format_duration, format_file_size, format_progress};
pub use history::{History, HistoryEntry, HistoryError, MAX_HISTORY_ENTRIES};
pub use job::{apply_status, is_terminal, Job, JobError, JobId, JobStage, JOB_ID_LEN};
pub use msg::Msg;
pub use options::{Device, JobOptions};
pub use progress::{
    cumulative_weight, display_progress, estimate_remaining, stage_weight, MAX_ESTIMATE,
    MIN_PROGRESS_FOR_ESTIMATE,
};
pub use settings::{Settings, DEFAULT_BACKEND_URL, DEFAULT_POLL_INTERVAL_MS};
pub use state::{FailureClass, FetchFailure, PollSession};
pub use update::update;
pub use validation::{
    has_pdf_signature, validate_backend_address, validate_poll_interval, validate_upload,
    UploadCandidate, UploadLimits, ValidationError, BYTES_PER_MB, DEFAULT_MAX_UPLOAD_BYTES,
    MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS, PDF_SIGNATURE,
};
pub use view_model::JobView;
