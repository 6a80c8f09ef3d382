//! Wire contract of the inference service.
//!
//! Responses are decoded into loose wire structs first and then checked field
//! by field; anything outside its declared domain becomes
//! [`ApiError::ContractViolation`] instead of being coerced.

use formfill_core::{Device, Job, JobError, JobId, JobOptions, JobStage};
use serde::{Deserialize, Serialize};

use crate::{ApiError, JobCreated};

#[derive(Debug, Deserialize)]
struct WireJobCreate {
    job_id: String,
    status: String,
    progress: f64,
}

#[derive(Debug, Deserialize)]
struct WireJobStatus {
    job_id: String,
    status: String,
    progress: f64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    error: Option<WireJobError>,
}

#[derive(Debug, Deserialize)]
struct WireJobError {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireDevice<'a> {
    Name(&'a str),
    Index(u32),
}

#[derive(Debug, Serialize)]
struct WireJobOptions<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model_or_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<WireDevice<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fast: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_existing_fields: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    use_signature_fields: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<u32>,
}

pub fn parse_job_created(body: &[u8]) -> Result<JobCreated, ApiError> {
    let wire: WireJobCreate = decode(body)?;
    Ok(JobCreated {
        job_id: check_job_id(&wire.job_id)?,
        status: check_stage(&wire.status)?,
        progress: check_progress(wire.progress)?,
    })
}

pub fn parse_job_status(body: &[u8]) -> Result<Job, ApiError> {
    let wire: WireJobStatus = decode(body)?;
    let status = check_stage(&wire.status)?;

    let error = match (status, wire.error) {
        (JobStage::Failed, Some(err)) => Some(JobError {
            kind: err.kind,
            detail: err.detail,
        }),
        (JobStage::Failed, None) => {
            return Err(ApiError::contract("failed job is missing its error"));
        }
        (other, Some(_)) => {
            return Err(ApiError::contract(format!(
                "error present on job with status {other}"
            )));
        }
        (_, None) => None,
    };

    Ok(Job {
        id: check_job_id(&wire.job_id)?,
        status,
        progress: check_progress(wire.progress)?,
        message: wire.message,
        download_location: wire.download_url,
        error,
    })
}

/// JSON for the multipart `options` field; unset options are omitted.
pub fn encode_options(options: &JobOptions) -> Result<String, ApiError> {
    let wire = WireJobOptions {
        model_or_path: options.model_or_path.as_deref(),
        device: options.device.as_ref().map(|device| match device {
            Device::Name(name) => WireDevice::Name(name),
            Device::Index(index) => WireDevice::Index(*index),
        }),
        fast: options.fast,
        keep_existing_fields: options.keep_existing_fields,
        use_signature_fields: options.use_signature_fields,
        confidence: options.confidence,
        image_size: options.image_size,
    };
    serde_json::to_string(&wire)
        .map_err(|err| ApiError::transport(crate::TransportKind::Client, err.to_string()))
}

fn decode<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| ApiError::contract(err.to_string()))
}

fn check_job_id(raw: &str) -> Result<JobId, ApiError> {
    JobId::parse(raw).map_err(|err| ApiError::contract(err.to_string()))
}

fn check_stage(tag: &str) -> Result<JobStage, ApiError> {
    JobStage::from_wire(tag).ok_or_else(|| ApiError::contract(format!("unknown stage {tag:?}")))
}

fn check_progress(progress: f64) -> Result<f64, ApiError> {
    if (0.0..=1.0).contains(&progress) {
        Ok(progress)
    } else {
        Err(ApiError::contract(format!(
            "progress {progress} is outside [0, 1]"
        )))
    }
}
