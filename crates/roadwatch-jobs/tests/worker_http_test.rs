//! Submission and polling over HTTP against a mocked detection worker.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use roadwatch_db::InMemoryIncidentRepository;
use roadwatch_inference::mock::MockCaptionBackend;
use roadwatch_jobs::{
    Error, MonitorOutcome, Orchestrator, OrchestratorBuilder, OrchestratorConfig,
    SubmitJobRequest, TaskStatus,
};

fn orchestrator(server: &MockServer) -> Orchestrator {
    let config = OrchestratorConfig::default()
        .with_worker_url(server.uri())
        .with_worker_timeout(Duration::from_secs(2))
        .with_poll_interval(Duration::from_millis(5));
    OrchestratorBuilder::new(
        Arc::new(InMemoryIncidentRepository::new()),
        Arc::new(MockCaptionBackend::new()),
    )
    .with_config(config)
    .build()
    .unwrap()
}

#[tokio::test]
async fn test_submit_and_poll_to_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .and(body_partial_json(json!({
            "inputPath": "/uploads/crash.mp4",
            "realtime": false,
            "modelType": "medium",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": "abc-123"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "RUNNING",
            "progress": 55,
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "COMPLETED",
            "progress": 100,
        })))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let job_id = orchestrator
        .submit(SubmitJobRequest::new(
            "/uploads/crash.mp4",
            "/nonexistent/processed_crash.webm",
        ))
        .await
        .unwrap();
    assert_eq!(job_id, "abc-123");

    let outcome = tokio::time::timeout(Duration::from_secs(5), orchestrator.join(&job_id))
        .await
        .expect("monitor did not finish")
        .unwrap();

    assert_eq!(outcome, MonitorOutcome::Completed);
    let task = orchestrator.get_status(&job_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100);
}

#[tokio::test]
async fn test_submit_without_job_id_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let result = orchestrator
        .submit(SubmitJobRequest::new("/uploads/a.mp4", "/data/a.webm"))
        .await;

    assert!(matches!(result, Err(Error::Submission(_))));
    assert!(orchestrator.list_tasks().await.is_empty());
}

#[tokio::test]
async fn test_worker_404_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": "gone"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let job_id = orchestrator
        .submit(SubmitJobRequest::new("/uploads/b.mp4", "/data/b.webm"))
        .await
        .unwrap();
    let outcome = orchestrator.join(&job_id).await.unwrap();

    assert_eq!(outcome, MonitorOutcome::Failed);
    let task = orchestrator.get_status(&job_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
}
