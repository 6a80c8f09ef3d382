use std::time::Duration;

use bytes::Bytes;
use formfill_core::{JobId, JobOptions, JobStage, Settings};
use formfill_engine::{
    result_location, ApiError, ApiSettings, ClientError, JobApi, ReqwestJobApi, SettingsStore,
    TransportKind, UploadFile,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB: &str = "4f1c2a9b8e7d6c5b4a3928171615141f";

fn job_id() -> JobId {
    JobId::parse(JOB).unwrap()
}

fn fast_settings() -> ApiSettings {
    ApiSettings {
        retry_delay: Duration::from_millis(10),
        ..ApiSettings::default()
    }
}

fn client_for(server: &MockServer, settings: ApiSettings) -> ReqwestJobApi {
    let config = SettingsStore::in_memory(Settings::new(&server.uri(), 2000).unwrap());
    ReqwestJobApi::new(settings, config).expect("client")
}

fn upload() -> UploadFile {
    UploadFile {
        file_name: "w9.pdf".to_string(),
        bytes: Bytes::from_static(b"%PDF-1.4 test document"),
    }
}

#[tokio::test]
async fn submit_posts_multipart_and_validates_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .and(body_string_contains("%PDF-1.4 test document"))
        .and(body_string_contains(r#"{"fast":true}"#))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "job_id": JOB,
            "status": "queued",
            "progress": 0.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server, fast_settings());
    let options = JobOptions {
        fast: Some(true),
        ..JobOptions::default()
    };
    let created = api.submit_job(&upload(), Some(&options)).await.expect("created");

    assert_eq!(created.job_id, job_id());
    assert_eq!(created.status, JobStage::Queued);
    assert_eq!(created.progress, 0.0);
}

#[tokio::test]
async fn submit_rejects_response_missing_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": JOB,
            "status": "queued"
        })))
        .mount(&server)
        .await;

    let api = client_for(&server, fast_settings());
    let err = api.submit_job(&upload(), None).await.unwrap_err();
    assert!(matches!(err, ApiError::ContractViolation(_)), "{err:?}");
}

#[tokio::test]
async fn submit_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server, fast_settings());
    let err = api.submit_job(&upload(), None).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Transport {
            kind: TransportKind::HttpStatus(503),
            message: "503 Service Unavailable".to_string(),
        }
    );
}

#[tokio::test]
async fn status_check_retries_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{JOB}")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{JOB}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": JOB,
            "status": "detecting",
            "progress": 0.42,
            "message": "page 2 of 5"
        })))
        .mount(&server)
        .await;

    let api = client_for(&server, fast_settings());
    let job = api.fetch_status(&job_id()).await.expect("status");

    assert_eq!(job.status, JobStage::Detecting);
    assert_eq!(job.message.as_deref(), Some("page 2 of 5"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn status_retry_budget_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{JOB}")))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let api = client_for(&server, fast_settings());
    let err = api.fetch_status(&job_id()).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Transport {
            kind: TransportKind::HttpStatus(502),
            ..
        }
    ));
}

#[tokio::test]
async fn unknown_stage_is_a_contract_violation_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{JOB}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": JOB,
            "status": "uploading",
            "progress": 0.1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server, fast_settings());
    let err = api.fetch_status(&job_id()).await.unwrap_err();
    assert!(matches!(err, ApiError::ContractViolation(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{JOB}")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let api = client_for(&server, fast_settings());
    let err = api.fetch_status(&job_id()).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Transport {
            kind: TransportKind::HttpStatus(404),
            ..
        }
    ));
}

#[tokio::test]
async fn status_check_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{JOB}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({"job_id": JOB, "status": "queued", "progress": 0.0})),
        )
        .mount(&server)
        .await;

    let settings = ApiSettings {
        status_timeout: Duration::from_millis(50),
        status_retries: 0,
        ..fast_settings()
    };
    let api = client_for(&server, settings);
    let err = api.fetch_status(&job_id()).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Transport {
            kind: TransportKind::Timeout,
            ..
        }
    ));
}

#[tokio::test]
async fn backend_address_is_read_on_every_call() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        Mock::given(method("GET"))
            .and(path(format!("/jobs/{JOB}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "job_id": JOB,
                "status": "queued",
                "progress": 0.0
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    let config = SettingsStore::in_memory(Settings::new(&first.uri(), 2000).unwrap());
    let api = ReqwestJobApi::new(fast_settings(), config.clone()).unwrap();

    api.fetch_status(&job_id()).await.unwrap();
    config.set_backend_url(&second.uri()).unwrap();
    api.fetch_status(&job_id()).await.unwrap();
}

#[tokio::test]
async fn download_streams_result_to_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{JOB}/result")))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"%PDF-1.7 filled".to_vec(), "application/pdf"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("filled.pdf");
    let api = client_for(&server, fast_settings());
    let written = api.download_result(&job_id(), &target).await.unwrap();

    assert_eq!(written, 15);
    assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.7 filled");
}

#[tokio::test]
async fn failed_download_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/jobs/{JOB}/result")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let target = dir.path().join("filled.pdf");
    let api = client_for(&server, fast_settings());
    let err = api.download_result(&job_id(), &target).await.unwrap_err();

    assert!(matches!(err, ClientError::Api(_)));
    assert!(!target.exists());
}

#[test]
fn result_location_is_pure_string_construction() {
    assert_eq!(
        result_location("http://localhost:8000/", &job_id()),
        format!("http://localhost:8000/jobs/{JOB}/result")
    );
    assert_eq!(
        result_location("https://forms.example.com/api//", &job_id()),
        format!("https://forms.example.com/api/jobs/{JOB}/result")
    );
}
