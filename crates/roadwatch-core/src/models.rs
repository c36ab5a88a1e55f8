//! Data models for the roadwatch pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults;

// =============================================================================
// TASKS
// =============================================================================

/// Lifecycle status of a submitted job as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Completed and Failed never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// In-memory record for one job submitted to the detection worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Worker-assigned job id.
    pub id: String,
    pub status: TaskStatus,
    /// Advisory progress, 0-100.
    pub progress: i32,
    pub message: String,
    pub input_path: String,
    pub output_path: String,
    /// Realtime jobs are driven by a streaming channel and never polled.
    pub realtime: bool,
    pub ai_report: Option<String>,
    /// Structured incident list from the worker's metadata, passed through untouched.
    pub incidents: Option<JsonValue>,
    /// Ordered before/during/after still frames.
    pub snapshot_paths: Vec<String>,
    /// Whether captioning runs automatically when the job completes.
    pub auto_report: bool,
    /// Incident row created (or adopted from the worker) for this job.
    pub incident_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task for a freshly accepted job.
    pub fn new(
        id: impl Into<String>,
        input_path: impl Into<String>,
        output_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            progress: 0,
            message: "Queued...".to_string(),
            input_path: input_path.into(),
            output_path: output_path.into(),
            realtime: false,
            ai_report: None,
            incidents: None,
            snapshot_paths: Vec::new(),
            auto_report: true,
            incident_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_auto_report(mut self, auto_report: bool) -> Self {
        self.auto_report = auto_report;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether a non-empty report is already attached.
    pub fn has_report(&self) -> bool {
        self.ai_report.as_deref().is_some_and(|r| !r.is_empty())
    }

    /// The frame used for captioning: the middle of the ordered sequence.
    pub fn representative_snapshot(&self) -> Option<&str> {
        representative_frame(&self.snapshot_paths)
    }
}

/// Pick the middle element of an ordered frame sequence.
///
/// For the usual before/during/after triple this is the "during" frame.
pub fn representative_frame<S: AsRef<str>>(frames: &[S]) -> Option<&str> {
    frames.get(frames.len() / 2).map(AsRef::as_ref)
}

/// Parameters for submitting a job to the detection worker.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitJobRequest {
    pub input_path: String,
    pub output_path: String,
    pub realtime: bool,
    pub model_type: String,
    pub custom_labels: Option<String>,
    pub confidence_threshold: Option<f64>,
    pub auto_report: bool,
}

impl SubmitJobRequest {
    /// Batch job with the default model and automatic reporting.
    pub fn new(input_path: impl Into<String>, output_path: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            realtime: false,
            model_type: defaults::WORKER_MODEL_TYPE.to_string(),
            custom_labels: None,
            confidence_threshold: None,
            auto_report: true,
        }
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = model_type.into();
        self
    }

    pub fn custom_labels(mut self, labels: impl Into<String>) -> Self {
        self.custom_labels = Some(labels.into());
        self
    }

    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn auto_report(mut self, auto_report: bool) -> Self {
        self.auto_report = auto_report;
        self
    }
}

// =============================================================================
// FRAMES
// =============================================================================

/// A still image sent to the captioning model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl ImageFrame {
    /// Wrap raw bytes, detecting the MIME type from magic bytes.
    ///
    /// Unrecognised data is labelled `image/jpeg`, which is what the worker writes.
    pub fn new(data: Vec<u8>) -> Self {
        let mime_type = infer::get(&data)
            .filter(|kind| kind.mime_type().starts_with("image/"))
            .map(|kind| kind.mime_type().to_string())
            .unwrap_or_else(|| defaults::FRAME_MIME_TYPE.to_string());
        Self { data, mime_type }
    }

    pub fn with_mime_type(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }
}

// =============================================================================
// INCIDENTS
// =============================================================================

/// A persisted traffic incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: i64,
    #[serde(rename = "type")]
    pub incident_type: String,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    /// JSON-serialized ordered list of snapshot URLs.
    pub snapshot_urls: Option<String>,
    pub ai_report: Option<String>,
    pub alert_sent: bool,
}

impl Incident {
    /// Decode `snapshot_urls` into its ordered list; malformed or missing yields empty.
    pub fn snapshot_url_list(&self) -> Vec<String> {
        self.snapshot_urls
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

/// An incident that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncident {
    pub incident_type: String,
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub snapshot_urls: Option<String>,
    pub ai_report: Option<String>,
}

impl NewIncident {
    pub fn new(incident_type: impl Into<String>) -> Self {
        Self {
            incident_type: incident_type.into(),
            location: None,
            timestamp: Utc::now(),
            description: None,
            image_url: None,
            video_url: None,
            snapshot_urls: None,
            ai_report: None,
        }
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn video_url(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }

    pub fn ai_report(mut self, report: impl Into<String>) -> Self {
        self.ai_report = Some(report.into());
        self
    }

    /// Store the ordered snapshot URLs as a JSON array; an empty list stores nothing.
    pub fn snapshot_urls<S: AsRef<str>>(mut self, urls: &[S]) -> Self {
        if urls.is_empty() {
            self.snapshot_urls = None;
        } else {
            let list: Vec<&str> = urls.iter().map(AsRef::as_ref).collect();
            self.snapshot_urls = serde_json::to_string(&list).ok();
        }
        self
    }

    /// Materialize the row once an id has been allocated.
    pub fn into_incident(self, id: i64) -> Incident {
        Incident {
            id,
            incident_type: self.incident_type,
            location: self.location,
            timestamp: self.timestamp,
            description: self.description,
            image_url: self.image_url,
            video_url: self.video_url,
            snapshot_urls: self.snapshot_urls,
            ai_report: self.ai_report,
            alert_sent: false,
        }
    }
}
