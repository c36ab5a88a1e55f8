//! Client for the external detection worker.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use roadwatch_core::{Error, Result, SubmitJobRequest};

/// Operations the orchestrator needs from the detection worker.
#[async_trait]
pub trait WorkerApi: Send + Sync {
    /// Create a job; returns the worker-assigned id.
    ///
    /// Any failure, including an unreachable worker, is [`Error::Submission`].
    async fn submit(&self, request: &SubmitJobRequest) -> Result<String>;

    /// Current state of a job.
    ///
    /// Unknown jobs are [`Error::NotFoundOnWorker`]; everything else that
    /// goes wrong is [`Error::Transport`] and worth polling again.
    async fn status(&self, job_id: &str) -> Result<RemoteStatus>;

    /// Download a file the worker serves under its `/data/` prefix.
    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>>;
}

/// Body of `GET /status/{jobId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub status: String,
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub message: Option<String>,
}

/// Worker-side job state as far as monitoring cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteState {
    Completed,
    Failed,
    /// Realtime stream torn down or idle; nothing left to poll for.
    Stopped,
    Ready,
    /// Queued or running; the worker's own label.
    Running(String),
}

impl RemoteStatus {
    pub fn state(&self) -> RemoteState {
        match self.status.as_str() {
            "COMPLETED" => RemoteState::Completed,
            "FAILED" => RemoteState::Failed,
            "STOPPED" => RemoteState::Stopped,
            "READY" => RemoteState::Ready,
            other => RemoteState::Running(other.to_string()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    input_path: &'a str,
    output_path: &'a str,
    realtime: bool,
    model_type: &'a str,
    custom_labels: Option<&'a str>,
    confidence_threshold: Option<f64>,
    auto_report: bool,
}

impl<'a> From<&'a SubmitJobRequest> for ProcessRequest<'a> {
    fn from(req: &'a SubmitJobRequest) -> Self {
        Self {
            input_path: &req.input_path,
            output_path: &req.output_path,
            realtime: req.realtime,
            model_type: &req.model_type,
            custom_labels: req.custom_labels.as_deref(),
            confidence_threshold: req.confidence_threshold,
            auto_report: req.auto_report,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessResponse {
    job_id: Option<String>,
}

/// HTTP implementation of [`WorkerApi`].
pub struct HttpWorkerClient {
    client: Client,
    base_url: String,
}

impl HttpWorkerClient {
    /// `timeout` bounds every request (submission, status, file download).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl WorkerApi for HttpWorkerClient {
    async fn submit(&self, request: &SubmitJobRequest) -> Result<String> {
        let url = format!("{}/process", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ProcessRequest::from(request))
            .send()
            .await
            .map_err(|e| Error::Submission(format!("Worker unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Submission(format!(
                "Worker returned {}: {}",
                status, body
            )));
        }

        let body: ProcessResponse = response
            .json()
            .await
            .map_err(|e| Error::Submission(format!("Malformed worker response: {}", e)))?;

        match body.job_id {
            Some(id) if !id.is_empty() => {
                debug!(subsystem = "jobs", component = "worker_client", job_id = %id, "Job accepted");
                Ok(id)
            }
            _ => Err(Error::Submission(
                "Worker response has no jobId".to_string(),
            )),
        }
    }

    async fn status(&self, job_id: &str) -> Result<RemoteStatus> {
        let url = format!("{}/status/{}", self.base_url, job_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFoundOnWorker(job_id.to_string()));
        }
        if !status.is_success() {
            return Err(Error::Transport(format!("Worker returned {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Malformed status response: {}", e)))
    }

    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Request(format!(
                "Worker returned {} for {}",
                status, path
            )));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(Error::Request(format!("Worker served an empty file for {}", path)));
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_state_parsing() {
        let status = |s: &str| RemoteStatus {
            status: s.to_string(),
            progress: 0,
            message: None,
        };
        assert_eq!(status("COMPLETED").state(), RemoteState::Completed);
        assert_eq!(status("FAILED").state(), RemoteState::Failed);
        assert_eq!(status("STOPPED").state(), RemoteState::Stopped);
        assert_eq!(status("READY").state(), RemoteState::Ready);
        assert_eq!(
            status("PROCESSING").state(),
            RemoteState::Running("PROCESSING".into())
        );
    }

    #[test]
    fn test_process_request_is_camel_case() {
        let req = SubmitJobRequest::new("/data/in.mp4", "/data/out.webm")
            .custom_labels("car,bus")
            .confidence_threshold(0.5)
            .auto_report(false);
        let json = serde_json::to_value(ProcessRequest::from(&req)).unwrap();
        assert_eq!(json["inputPath"], "/data/in.mp4");
        assert_eq!(json["outputPath"], "/data/out.webm");
        assert_eq!(json["realtime"], false);
        assert_eq!(json["modelType"], "medium");
        assert_eq!(json["customLabels"], "car,bus");
        assert_eq!(json["confidenceThreshold"], 0.5);
        assert_eq!(json["autoReport"], false);
    }

    #[test]
    fn test_status_body_defaults() {
        let status: RemoteStatus = serde_json::from_str(r#"{"status":"PENDING"}"#).unwrap();
        assert_eq!(status.progress, 0);
        assert!(status.message.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpWorkerClient::new("http://worker:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://worker:5000");
    }
}
