use thiserror::Error;
use url::Url;

pub const BYTES_PER_MB: u64 = 1024 * 1024;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * BYTES_PER_MB;
pub const MIN_POLL_INTERVAL_MS: u64 = 500;
pub const MAX_POLL_INTERVAL_MS: u64 = 30_000;

pub const ALLOWED_MIME_TYPES: &[&str] = &["application/pdf", "application/x-pdf"];
const GENERIC_MIME_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream"];
pub const PDF_FILE_EXTENSION: &str = ".pdf";
pub const PDF_SIGNATURE: &[u8; 4] = b"%PDF";

/// Rejections raised before any network call is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select a PDF file to upload")]
    FileRequired,
    #[error("File size exceeds {}MB limit", .max_bytes / BYTES_PER_MB)]
    FileTooLarge { size: u64, max_bytes: u64 },
    #[error("Only PDF files are supported")]
    InvalidFileType,
    #[error("Backend URL is required")]
    BackendUrlRequired,
    #[error("URL must use http:// or https://")]
    BackendUrlScheme,
    #[error("Invalid URL format")]
    BackendUrlInvalid,
    #[error("Poll interval must be at least {min}ms")]
    PollIntervalTooShort { min: u64 },
    #[error("Poll interval cannot exceed {max}ms")]
    PollIntervalTooLong { max: u64 },
    #[error("invalid option {field}: {reason}")]
    InvalidOption { field: &'static str, reason: String },
    #[error("invalid job id {0:?}")]
    InvalidJobId(String),
}

/// Metadata of a file the user wants to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    pub file_name: String,
    pub size: u64,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl UploadLimits {
    pub fn from_megabytes(mb: u64) -> Self {
        Self {
            max_bytes: mb.saturating_mul(BYTES_PER_MB),
        }
    }
}

/// Checks presence, size, then type. The MIME allow-list decides when a specific
/// type is given; an absent or generic type falls back to the file extension.
pub fn validate_upload(
    candidate: Option<&UploadCandidate>,
    limits: &UploadLimits,
) -> Result<(), ValidationError> {
    let candidate = candidate.ok_or(ValidationError::FileRequired)?;

    if candidate.size > limits.max_bytes {
        return Err(ValidationError::FileTooLarge {
            size: candidate.size,
            max_bytes: limits.max_bytes,
        });
    }

    let mime = candidate
        .mime_type
        .as_deref()
        .map(|m| m.split(';').next().unwrap_or(m).trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());

    match mime {
        Some(mime) if ALLOWED_MIME_TYPES.contains(&mime.as_str()) => Ok(()),
        Some(mime) if !GENERIC_MIME_TYPES.contains(&mime.as_str()) => {
            Err(ValidationError::InvalidFileType)
        }
        _ if has_pdf_extension(&candidate.file_name) => Ok(()),
        _ => Err(ValidationError::InvalidFileType),
    }
}

fn has_pdf_extension(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(PDF_FILE_EXTENSION)
}

/// Advisory deep check on the leading bytes of a file.
pub fn has_pdf_signature(header: &[u8]) -> bool {
    header.starts_with(PDF_SIGNATURE)
}

pub fn validate_backend_address(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::BackendUrlRequired);
    }
    let parsed = Url::parse(value).map_err(|_| ValidationError::BackendUrlInvalid)?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ValidationError::BackendUrlScheme),
    }
}

pub fn validate_poll_interval(interval_ms: u64) -> Result<(), ValidationError> {
    if interval_ms < MIN_POLL_INTERVAL_MS {
        return Err(ValidationError::PollIntervalTooShort {
            min: MIN_POLL_INTERVAL_MS,
        });
    }
    if interval_ms > MAX_POLL_INTERVAL_MS {
        return Err(ValidationError::PollIntervalTooLong {
            max: MAX_POLL_INTERVAL_MS,
        });
    }
    Ok(())
}
