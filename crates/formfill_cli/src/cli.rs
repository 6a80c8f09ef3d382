use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use formfill_core::{Device, JobId, JobOptions, DEFAULT_MAX_UPLOAD_BYTES, BYTES_PER_MB};

#[derive(Parser, Debug)]
#[command(name = "formfill")]
#[command(about = "Submit PDFs for form-field detection and track the jobs", long_about = None)]
pub struct Cli {
    /// Directory holding persisted settings and history (default: platform data dir)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
    /// Mirror log output to stderr as well as ./formfill.log
    #[arg(long, global = true, default_value_t = false)]
    pub log_to_terminal: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a PDF and watch the job until it finishes
    Submit {
        file: PathBuf,
        #[command(flatten)]
        options: SubmitOptions,
        /// Largest accepted upload in megabytes
        #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES / BYTES_PER_MB)]
        max_upload_mb: u64,
        /// Print the job id and exit instead of watching
        #[arg(long, default_value_t = false)]
        no_watch: bool,
    },
    /// Poll one or more existing jobs until each reaches a terminal stage
    Watch {
        #[arg(required = true)]
        job_ids: Vec<JobId>,
    },
    /// Fetch the current status of a job once
    Status { job_id: JobId },
    /// Download the filled PDF of a finished job
    Download {
        job_id: JobId,
        /// Output file (default: <job_id>.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Inspect or edit the history of finished jobs
    History {
        #[command(subcommand)]
        action: Option<HistoryAction>,
    },
    /// Inspect or edit client settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List finished jobs, newest first
    List,
    /// Forget one job
    Remove { job_id: JobId },
    /// Forget all jobs
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    Show,
    /// Backend base address, e.g. http://localhost:8000
    SetUrl { url: String },
    /// Poll interval in milliseconds
    SetInterval { interval_ms: u64 },
    /// Restore defaults
    Reset,
}

/// Detection options forwarded to the backend. Unset flags keep server defaults.
#[derive(Args, Debug, Default)]
pub struct SubmitOptions {
    /// Trade accuracy for speed
    #[arg(long, default_value_t = false)]
    pub fast: bool,
    /// Minimum detection confidence in [0, 1]
    #[arg(long)]
    pub confidence: Option<f64>,
    /// Render size in pixels for the detector
    #[arg(long)]
    pub image_size: Option<u32>,
    /// Device name (cpu, cuda, mps) or index
    #[arg(long)]
    pub device: Option<String>,
    /// Model name or path on the server
    #[arg(long)]
    pub model: Option<String>,
    /// Keep fields already present in the PDF
    #[arg(long, default_value_t = false)]
    pub keep_existing_fields: bool,
    /// Emit signature fields where detected
    #[arg(long, default_value_t = false)]
    pub use_signature_fields: bool,
}

impl SubmitOptions {
    /// Flags left off stay `None` so the multipart body omits them.
    pub fn to_job_options(&self) -> JobOptions {
        JobOptions {
            model_or_path: self.model.clone(),
            device: self.device.as_deref().map(Device::parse),
            fast: self.fast.then_some(true),
            keep_existing_fields: self.keep_existing_fields.then_some(true),
            use_signature_fields: self.use_signature_fields.then_some(true),
            confidence: self.confidence,
            image_size: self.image_size,
        }
    }
}
