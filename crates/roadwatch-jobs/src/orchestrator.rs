//! Public entry point: job submission, task queries, and incident reports.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::{broadcast, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use roadwatch_core::{
    defaults, representative_frame, AlertNotifier, CaptionBackend, Error, Incident,
    IncidentRepository, NewIncident, Result, SubmitJobRequest, Task, TaskStatus,
};
use roadwatch_db::IdAllocator;

use crate::config::OrchestratorConfig;
use crate::events::MonitorEvent;
use crate::media::FrameLoader;
use crate::metadata::file_name;
use crate::monitor::{JobMonitor, MonitorOutcome};
use crate::notify::notifier_for;
use crate::pipeline::Pipeline;
use crate::registry::TaskRegistry;
use crate::worker_client::{HttpWorkerClient, WorkerApi};

/// Description used for manual reports submitted without one.
pub const MANUAL_REPORT_DESCRIPTION: &str = "AI Report Generated";

/// Downloadable outcome of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: String,
    pub download_url: String,
    pub ai_report: Option<String>,
    pub incidents: Option<JsonValue>,
    /// One download URL per snapshot, in before/during/after order.
    pub snapshots: Vec<String>,
}

/// Incident reported by a caller from frames it already has.
#[derive(Debug, Clone, Default)]
pub struct ManualReport {
    pub incident_type: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    /// Ordered before/during/after frames (local paths or `/data/` worker paths).
    pub snapshots: Vec<String>,
    pub video_url: Option<String>,
}

impl ManualReport {
    pub fn new(snapshots: Vec<String>) -> Self {
        Self {
            snapshots,
            ..Default::default()
        }
    }

    pub fn incident_type(mut self, incident_type: impl Into<String>) -> Self {
        self.incident_type = Some(incident_type.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn video_url(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }
}

/// Orchestrates detection jobs from submission to incident record.
///
/// Owns the task registry and runs one monitor per non-realtime job,
/// at most `max_concurrent_monitors` at a time. Cloning the handle is not
/// supported; share it behind an `Arc`.
pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    monitors: Mutex<HashMap<String, JoinHandle<MonitorOutcome>>>,
}

impl Orchestrator {
    /// Submit a job to the worker and start tracking it.
    ///
    /// Realtime jobs are registered but never polled.
    pub async fn submit(&self, request: SubmitJobRequest) -> Result<String> {
        let job_id = self.pipeline.worker.submit(&request).await?;

        let task = Task::new(&job_id, &request.input_path, &request.output_path)
            .with_realtime(request.realtime)
            .with_auto_report(request.auto_report);
        self.pipeline.registry.create(task).await?;

        info!(
            subsystem = "jobs",
            component = "orchestrator",
            op = "submit",
            job_id = %job_id,
            realtime = request.realtime,
            auto_report = request.auto_report,
            "Job submitted"
        );
        self.pipeline.emit(MonitorEvent::Submitted {
            job_id: job_id.clone(),
            realtime: request.realtime,
        });

        if !request.realtime {
            let handle = self.spawn_monitor(job_id.clone(), request.output_path);
            let mut monitors = self.monitors.lock().await;
            // Finished monitors are dropped; `join` recovers their outcome from the task.
            monitors.retain(|_, h| !h.is_finished());
            monitors.insert(job_id.clone(), handle);
        }

        Ok(job_id)
    }

    fn spawn_monitor(&self, job_id: String, output_path: String) -> JoinHandle<MonitorOutcome> {
        let pipeline = self.pipeline.clone();
        let permits = self.permits.clone();
        tokio::spawn(async move {
            // Held for the whole life of the monitor.
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(
                        subsystem = "jobs",
                        component = "orchestrator",
                        job_id = %job_id,
                        "Monitor pool closed, job not monitored"
                    );
                    return MonitorOutcome::Detached;
                }
            };
            JobMonitor::new(pipeline, job_id, output_path).run().await
        })
    }

    /// Wait for a job's monitor to finish.
    ///
    /// A monitor that already finished (joined before, or dropped by a later
    /// submit) reports the outcome recorded on its task. Realtime jobs have no
    /// monitor and are an error.
    pub async fn join(&self, job_id: &str) -> Result<MonitorOutcome> {
        let handle = self.monitors.lock().await.remove(job_id);
        if let Some(handle) = handle {
            return handle
                .await
                .map_err(|e| Error::Internal(format!("Monitor for job {job_id} panicked: {e}")));
        }

        let task = self.pipeline.registry.require(job_id).await?;
        if task.realtime {
            return Err(Error::InvalidInput(format!(
                "Job {job_id} is realtime and has no monitor"
            )));
        }
        Ok(match task.status {
            TaskStatus::Completed => MonitorOutcome::Completed,
            TaskStatus::Failed => MonitorOutcome::Failed,
            TaskStatus::Pending | TaskStatus::Processing => MonitorOutcome::Detached,
        })
    }

    /// Monitor handles still held, running or not yet joined.
    pub async fn tracked_monitors(&self) -> usize {
        self.monitors.lock().await.len()
    }

    /// Snapshot of one task.
    pub async fn get_status(&self, job_id: &str) -> Result<Task> {
        self.pipeline.registry.require(job_id).await
    }

    /// Every known task, oldest first.
    pub async fn list_tasks(&self) -> Vec<Task> {
        self.pipeline.registry.list().await
    }

    /// Replace a task's snapshot list.
    pub async fn update_snapshots(&self, job_id: &str, snapshots: Vec<String>) -> Result<Task> {
        self.pipeline
            .registry
            .update_snapshots(job_id, snapshots)
            .await
    }

    /// Return the task's report, captioning its middle snapshot if none exists yet.
    pub async fn generate_report_on_demand(&self, job_id: &str) -> Result<String> {
        let task = self.pipeline.registry.require(job_id).await?;
        if let Some(report) = task.ai_report.as_ref().filter(|r| !r.is_empty()) {
            return Ok(report.clone());
        }

        let frame = task
            .representative_snapshot()
            .ok_or_else(|| {
                Error::InvalidInput(format!("No snapshots available for job {job_id}"))
            })?
            .to_string();

        debug!(
            subsystem = "jobs",
            component = "orchestrator",
            op = "report_on_demand",
            job_id,
            frame = %frame,
            "Captioning snapshot on demand"
        );
        let image = self.pipeline.frames.load(&frame).await?;
        let report = self.pipeline.caption.describe(&[image]).await?;

        self.pipeline
            .registry
            .update(job_id, |t| t.ai_report = Some(report.clone()))
            .await?;
        Ok(report)
    }

    /// Download URLs and report for a completed job.
    pub async fn result(&self, job_id: &str) -> Result<JobResult> {
        let task = self.pipeline.registry.require(job_id).await?;
        if task.status != TaskStatus::Completed {
            return Err(Error::InvalidInput(format!(
                "Job {job_id} is not completed (status {:?})",
                task.status
            )));
        }

        let config = &self.pipeline.config;
        Ok(JobResult {
            download_url: config.download_url(&file_name(&task.output_path)),
            snapshots: task
                .snapshot_paths
                .iter()
                .map(|s| config.download_url(&file_name(s)))
                .collect(),
            job_id: task.id,
            ai_report: task.ai_report,
            incidents: task.incidents,
        })
    }

    /// Caption caller-supplied frames and record an incident for them.
    pub async fn report_incident(&self, report: ManualReport) -> Result<Incident> {
        let during = representative_frame(&report.snapshots)
            .ok_or_else(|| Error::InvalidInput("At least one snapshot is required".to_string()))?
            .to_string();

        let images = self.pipeline.frames.load_all(&report.snapshots).await?;
        let text = self.pipeline.caption.describe(&images).await?;

        let config = &self.pipeline.config;
        let mut draft = NewIncident::new(
            report
                .incident_type
                .unwrap_or_else(|| defaults::INCIDENT_TYPE.to_string()),
        )
        .location(
            report
                .location
                .unwrap_or_else(|| config.incident_location.clone()),
        )
        .description(
            report
                .description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| MANUAL_REPORT_DESCRIPTION.to_string()),
        )
        .ai_report(text)
        .image_url(during)
        .snapshot_urls(&report.snapshots);
        if let Some(video) = report.video_url {
            draft = draft.video_url(video);
        }

        self.pipeline.record_incident(None, &draft).await
    }

    /// All incidents ordered by id.
    pub async fn list_incidents(&self) -> Result<Vec<Incident>> {
        self.pipeline.allocator.repository().list().await
    }

    /// Latest incidents, newest first.
    pub async fn recent_incidents(&self, limit: i64) -> Result<Vec<Incident>> {
        self.pipeline
            .allocator
            .repository()
            .list_recent(limit)
            .await
    }

    /// Subscribe to job lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.pipeline.events.subscribe()
    }

    pub fn registry(&self) -> Arc<TaskRegistry> {
        self.pipeline.registry.clone()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.pipeline.config
    }
}

/// Builder for an [`Orchestrator`].
pub struct OrchestratorBuilder {
    incidents: Arc<dyn IncidentRepository>,
    caption: Arc<dyn CaptionBackend>,
    config: OrchestratorConfig,
    worker: Option<Arc<dyn WorkerApi>>,
    notifier: Option<Arc<dyn AlertNotifier>>,
}

impl OrchestratorBuilder {
    pub fn new(incidents: Arc<dyn IncidentRepository>, caption: Arc<dyn CaptionBackend>) -> Self {
        Self {
            incidents,
            caption,
            config: OrchestratorConfig::default(),
            worker: None,
            notifier: None,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom worker client instead of HTTP against `config.worker_url`.
    pub fn with_worker(mut self, worker: Arc<dyn WorkerApi>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Use a custom alert channel instead of the configured webhook or log.
    pub fn with_notifier(mut self, notifier: Arc<dyn AlertNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let config = self.config;
        let worker = match self.worker {
            Some(worker) => worker,
            None => Arc::new(HttpWorkerClient::new(
                config.worker_url.clone(),
                config.worker_timeout,
            )?),
        };
        let notifier = match self.notifier {
            Some(notifier) => notifier,
            None => notifier_for(config.alert_webhook_url.as_deref())?,
        };
        let (events, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        let permits = Arc::new(Semaphore::new(config.max_concurrent_monitors.max(1)));

        info!(
            subsystem = "jobs",
            component = "orchestrator",
            worker_url = %config.worker_url,
            max_concurrent_monitors = config.max_concurrent_monitors,
            caption_model = self.caption.model_name(),
            notifier = notifier.name(),
            "Orchestrator ready"
        );

        let pipeline = Pipeline {
            frames: FrameLoader::new(config.data_dir.clone(), worker.clone()),
            registry: Arc::new(TaskRegistry::new()),
            allocator: IdAllocator::new(self.incidents),
            caption: self.caption,
            worker,
            notifier,
            events,
            config,
        };

        Ok(Orchestrator {
            pipeline: Arc::new(pipeline),
            permits,
            monitors: Mutex::new(HashMap::new()),
        })
    }
}
