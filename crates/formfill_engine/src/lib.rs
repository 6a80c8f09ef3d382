//! Formfill engine: HTTP transport, polling and persisted client state.
mod api;
mod persist;
mod poller;
mod schema;
mod store;
mod types;
mod upload;

pub use api::{result_location, ApiSettings, JobApi, ReqwestJobApi, UploadFile};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use poller::{ChannelPollSink, PollEngine, PollSink};
pub use schema::{encode_options, parse_job_created, parse_job_status};
pub use store::{HistoryStore, SettingsStore, HISTORY_FILENAME, SETTINGS_FILENAME};
pub use types::{ApiError, ClientError, JobCreated, PollEvent, TransportKind};
pub use upload::{read_upload, sniff_pdf_signature};
