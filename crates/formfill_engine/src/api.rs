use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use formfill_core::{Job, JobId, JobOptions};
use formfill_logging::{ff_debug, ff_info, ff_warn};
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use tokio::io::AsyncWriteExt;

use crate::persist::AtomicFileWriter;
use crate::schema::{encode_options, parse_job_created, parse_job_status};
use crate::{ApiError, ClientError, JobCreated, SettingsStore, TransportKind};

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub connect_timeout: Duration,
    pub status_timeout: Duration,
    pub upload_timeout: Duration,
    pub download_timeout: Duration,
    /// Extra attempts for status checks. Job creation is never retried.
    pub status_retries: u32,
    /// First retry delay; doubles on each further attempt.
    pub retry_delay: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            status_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(60),
            download_timeout: Duration::from_secs(30),
            status_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

/// A PDF ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Bytes,
}

#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    async fn submit_job(
        &self,
        file: &UploadFile,
        options: Option<&JobOptions>,
    ) -> Result<JobCreated, ApiError>;

    async fn fetch_status(&self, job_id: &JobId) -> Result<Job, ApiError>;
}

/// `{base}/jobs/{id}/result`, ignoring trailing slashes on the base address.
pub fn result_location(base_url: &str, job_id: &JobId) -> String {
    format!("{}/jobs/{}/result", base_url.trim_end_matches('/'), job_id)
}

/// HTTP client for the inference service. The base address is read from the
/// shared settings on every call.
#[derive(Debug, Clone)]
pub struct ReqwestJobApi {
    client: reqwest::Client,
    settings: ApiSettings,
    config: SettingsStore,
}

impl ReqwestJobApi {
    pub fn new(settings: ApiSettings, config: SettingsStore) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::transport(TransportKind::Client, err.to_string()))?;
        Ok(Self {
            client,
            settings,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        let base = self.config.snapshot().backend_url().trim_end_matches('/').to_string();
        reqwest::Url::parse(&format!("{base}/{path}"))
            .map_err(|err| ApiError::transport(TransportKind::Client, err.to_string()))
    }

    pub fn result_location(&self, job_id: &JobId) -> String {
        result_location(self.config.snapshot().backend_url(), job_id)
    }

    async fn fetch_status_once(&self, job_id: &JobId) -> Result<Job, ApiError> {
        let url = self.endpoint(&format!("jobs/{job_id}"))?;
        ff_debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.settings.status_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body = read_success_body(response).await?;
        parse_job_status(&body)
    }

    /// Streams the finished PDF into `destination` through a temp file, so a
    /// failed download never leaves a truncated file behind.
    pub async fn download_result(
        &self,
        job_id: &JobId,
        destination: &Path,
    ) -> Result<u64, ClientError> {
        let url = self.endpoint(&format!("jobs/{job_id}/result"))?;
        ff_debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.settings.download_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::transport(
                TransportKind::HttpStatus(status.as_u16()),
                status.to_string(),
            )
            .into());
        }

        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = destination
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                crate::PersistError::Dir(format!("{destination:?} has no file name"))
            })?;
        let writer = AtomicFileWriter::new(dir.to_path_buf());
        let tmp = writer.begin()?;
        let mut file = tokio::fs::File::from_std(tmp.reopen().map_err(crate::PersistError::Io)?);

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            file.write_all(&chunk)
                .await
                .map_err(crate::PersistError::Io)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(crate::PersistError::Io)?;
        drop(file);

        let path = writer.commit(tmp, file_name)?;
        ff_info!("Downloaded {} bytes for job {} to {:?}", written, job_id, path);
        Ok(written)
    }
}

#[async_trait::async_trait]
impl JobApi for ReqwestJobApi {
    async fn submit_job(
        &self,
        file: &UploadFile,
        options: Option<&JobOptions>,
    ) -> Result<JobCreated, ApiError> {
        let url = self.endpoint("jobs")?;
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str("application/pdf")
            .map_err(|err| ApiError::transport(TransportKind::Client, err.to_string()))?;
        let mut form = Form::new().part("file", part);
        if let Some(options) = options.filter(|o| !o.is_empty()) {
            form = form.text("options", encode_options(options)?);
        }

        ff_info!(
            "POST {} file={} bytes={}",
            url,
            file.file_name,
            file.bytes.len()
        );
        let response = self
            .client
            .post(url)
            .multipart(form)
            .timeout(self.settings.upload_timeout)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body = read_success_body(response).await?;
        parse_job_created(&body)
    }

    async fn fetch_status(&self, job_id: &JobId) -> Result<Job, ApiError> {
        let mut delay = self.settings.retry_delay;
        let mut attempt = 0;
        loop {
            match self.fetch_status_once(job_id).await {
                Err(err) if err.is_retryable() && attempt < self.settings.status_retries => {
                    attempt += 1;
                    ff_warn!(
                        "Status check for {} failed ({}), retry {}/{}",
                        job_id,
                        err,
                        attempt,
                        self.settings.status_retries
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                result => return result,
            }
        }
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<Bytes, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::transport(
            TransportKind::HttpStatus(status.as_u16()),
            status.to_string(),
        ));
    }
    response.bytes().await.map_err(map_reqwest_error)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::transport(TransportKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return ApiError::transport(TransportKind::Client, err.to_string());
    }
    ApiError::transport(TransportKind::Network, err.to_string())
}
