//! Per-job polling and reconciliation.
//!
//! ```text
//! Polling --COMPLETED--> Reconciling --> Completed
//!    |  \--FAILED / worker 404--> Failed
//!    \--STOPPED / READY--> Detached (task status untouched)
//! ```
//!
//! Transport errors keep the monitor in `Polling` indefinitely at the fixed
//! interval. `Reconciling` is entered at most once.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use roadwatch_core::{defaults, Error, NewIncident, Task, TaskStatus};
use roadwatch_inference::DEGRADED_PREFIX;

use crate::events::MonitorEvent;
use crate::metadata::{decide, file_name, load_sidecar, ReconcileDecision, SidecarMetadata};
use crate::pipeline::Pipeline;
use crate::worker_client::RemoteState;

/// Message when the worker no longer knows the job.
pub const MSG_TASK_LOST: &str = "Task lost on worker (restarted?)";
/// Message while the worker is unreachable.
pub const MSG_CONNECTION_RETRY: &str = "Connection issue... retrying";
/// Message once reconciliation is over.
pub const MSG_COMPLETE: &str = "Processing complete";
/// Report stored when a detection came without any frame.
pub const NO_SNAPSHOT_REPORT: &str = "No snapshot available for analysis.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Polling,
    Reconciling,
    Completed,
    Failed,
    Detached,
}

/// How a monitor ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    Completed,
    Failed,
    /// Realtime stream ended; the task keeps its last status.
    Detached,
}

pub(crate) struct JobMonitor {
    pipeline: Arc<Pipeline>,
    job_id: String,
    output_path: String,
}

impl JobMonitor {
    pub fn new(pipeline: Arc<Pipeline>, job_id: impl Into<String>, output_path: impl Into<String>) -> Self {
        Self {
            pipeline,
            job_id: job_id.into(),
            output_path: output_path.into(),
        }
    }

    pub async fn run(self) -> MonitorOutcome {
        let start = Instant::now();
        let interval = self.pipeline.config.poll_interval;
        let mut state = MonitorState::Polling;

        info!(
            subsystem = "jobs",
            component = "monitor",
            job_id = %self.job_id,
            poll_interval_ms = interval.as_millis() as u64,
            "Monitoring job"
        );

        let outcome = loop {
            state = match state {
                MonitorState::Polling => {
                    tokio::time::sleep(interval).await;
                    self.poll().await
                }
                MonitorState::Reconciling => {
                    self.reconcile().await;
                    self.complete().await;
                    MonitorState::Completed
                }
                MonitorState::Completed => break MonitorOutcome::Completed,
                MonitorState::Failed => break MonitorOutcome::Failed,
                MonitorState::Detached => break MonitorOutcome::Detached,
            };
        };
        outcome.log_finished(&self.job_id, start)
    }

    async fn poll(&self) -> MonitorState {
        match self.pipeline.worker.status(&self.job_id).await {
            Ok(remote) => match remote.state() {
                RemoteState::Completed => {
                    self.update(|t| {
                        t.progress = remote.progress;
                        t.message = "Finalizing results...".to_string();
                    })
                    .await;
                    MonitorState::Reconciling
                }
                RemoteState::Failed => {
                    let message = remote
                        .message
                        .clone()
                        .unwrap_or_else(|| "Processing failed on worker".to_string());
                    self.fail(message).await;
                    MonitorState::Failed
                }
                RemoteState::Stopped | RemoteState::Ready => {
                    info!(
                        subsystem = "jobs",
                        component = "monitor",
                        job_id = %self.job_id,
                        remote_status = %remote.status,
                        "Stream ended, monitoring stopped"
                    );
                    self.pipeline.emit(MonitorEvent::Detached {
                        job_id: self.job_id.clone(),
                        remote_status: remote.status.clone(),
                    });
                    MonitorState::Detached
                }
                RemoteState::Running(_) => {
                    let message = format!("Analyzing... {}%", remote.progress);
                    self.update(|t| {
                        t.status = TaskStatus::Processing;
                        t.progress = remote.progress;
                        t.message = message.clone();
                    })
                    .await;
                    self.pipeline.emit(MonitorEvent::Progress {
                        job_id: self.job_id.clone(),
                        progress: remote.progress,
                        message,
                    });
                    MonitorState::Polling
                }
            },
            Err(Error::NotFoundOnWorker(_)) => {
                self.fail(MSG_TASK_LOST.to_string()).await;
                MonitorState::Failed
            }
            Err(e) => {
                debug!(
                    subsystem = "jobs",
                    component = "monitor",
                    job_id = %self.job_id,
                    error = %e,
                    "Status poll failed, retrying"
                );
                self.update(|t| t.message = MSG_CONNECTION_RETRY.to_string())
                    .await;
                MonitorState::Polling
            }
        }
    }

    /// Read the sidecar and enrich the task. Never fails the job.
    async fn reconcile(&self) {
        let metadata = match load_sidecar(&self.output_path).await {
            Ok(Some((path, metadata))) => {
                debug!(
                    subsystem = "jobs",
                    component = "monitor",
                    job_id = %self.job_id,
                    path = %path.display(),
                    "Loaded output metadata"
                );
                metadata
            }
            Ok(None) => {
                info!(
                    subsystem = "jobs",
                    component = "monitor",
                    job_id = %self.job_id,
                    "No output metadata, completing without report"
                );
                return;
            }
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "monitor",
                    job_id = %self.job_id,
                    error = %e,
                    "Unreadable output metadata, completing without report"
                );
                return;
            }
        };

        let Some(task) = self.apply_metadata(&metadata).await else {
            return;
        };

        match decide(&metadata, task.auto_report) {
            ReconcileDecision::Skip(reason) => {
                debug!(
                    subsystem = "jobs",
                    component = "monitor",
                    job_id = %self.job_id,
                    ?reason,
                    "Captioning skipped"
                );
            }
            ReconcileDecision::Adopt {
                report,
                incident_id,
            } => {
                info!(
                    subsystem = "jobs",
                    component = "monitor",
                    job_id = %self.job_id,
                    incident_id = ?incident_id,
                    "Worker already generated the report, reusing it"
                );
                self.update(|t| {
                    t.ai_report = Some(report);
                    t.incident_id = incident_id;
                    t.message = "Analysis complete (cached)".to_string();
                })
                .await;
            }
            ReconcileDecision::NoFrames => {
                self.update(|t| t.ai_report = Some(NO_SNAPSHOT_REPORT.to_string()))
                    .await;
            }
            ReconcileDecision::Caption { frame, frames } => {
                self.caption_and_record(&frame, &frames).await;
            }
        }
    }

    /// Copy passthrough fields from the metadata onto the task.
    async fn apply_metadata(&self, metadata: &SidecarMetadata) -> Option<Task> {
        let names: Vec<String> = metadata.frames().iter().map(|p| file_name(p)).collect();
        let incidents = metadata.incidents.clone();
        self.update(move |t| {
            t.incidents = incidents;
            if !names.is_empty() {
                t.snapshot_paths = names;
            }
        })
        .await
    }

    async fn caption_and_record(&self, frame: &str, frames: &[String]) {
        self.update(|t| t.message = "Running AI analysis...".to_string())
            .await;

        let image = match self.pipeline.frames.load_local(frame).await {
            Ok(image) => image,
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "monitor",
                    job_id = %self.job_id,
                    frame,
                    error = %e,
                    "Representative frame unreadable, skipping captioning"
                );
                let notice = format!("{DEGRADED_PREFIX} Snapshot {} could not be read.", file_name(frame));
                self.update(|t| t.ai_report = Some(notice)).await;
                return;
            }
        };

        let report = match self.pipeline.caption.describe(&[image]).await {
            Ok(report) => report,
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "monitor",
                    job_id = %self.job_id,
                    error = %e,
                    "Captioning request rejected"
                );
                return;
            }
        };

        self.update(|t| {
            t.ai_report = Some(report.clone());
            t.message = "Analysis complete".to_string();
        })
        .await;

        let config = &self.pipeline.config;
        let snapshot_urls: Vec<String> = frames
            .iter()
            .map(|p| config.download_url(&file_name(p)))
            .collect();
        let draft = NewIncident::new(defaults::INCIDENT_TYPE)
            .location(config.incident_location.clone())
            .description(report.clone())
            .ai_report(report)
            .image_url(config.download_url(&file_name(frame)))
            .video_url(config.download_url(&file_name(&self.output_path)))
            .snapshot_urls(&snapshot_urls);

        match self.pipeline.record_incident(Some(&self.job_id), &draft).await {
            Ok(incident) => {
                self.update(|t| t.incident_id = Some(incident.id)).await;
            }
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "monitor",
                    job_id = %self.job_id,
                    error = %e,
                    "Incident save failed, completing job anyway"
                );
            }
        }
    }

    async fn complete(&self) {
        let task = self
            .update(|t| {
                t.status = TaskStatus::Completed;
                t.progress = 100;
                t.message = MSG_COMPLETE.to_string();
            })
            .await;
        self.pipeline.emit(MonitorEvent::Completed {
            job_id: self.job_id.clone(),
            has_report: task.is_some_and(|t| t.has_report()),
        });
    }

    async fn fail(&self, message: String) {
        warn!(
            subsystem = "jobs",
            component = "monitor",
            job_id = %self.job_id,
            %message,
            "Job failed"
        );
        let event_message = message.clone();
        self.update(|t| {
            t.status = TaskStatus::Failed;
            t.message = message;
        })
        .await;
        self.pipeline.emit(MonitorEvent::Failed {
            job_id: self.job_id.clone(),
            message: event_message,
        });
    }

    /// Registry write that logs instead of failing the monitor.
    async fn update<F>(&self, f: F) -> Option<Task>
    where
        F: FnOnce(&mut Task),
    {
        match self.pipeline.registry.update(&self.job_id, f).await {
            Ok(task) => Some(task),
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "monitor",
                    job_id = %self.job_id,
                    error = %e,
                    "Task update rejected"
                );
                None
            }
        }
    }
}

impl MonitorOutcome {
    fn log_finished(self, job_id: &str, start: Instant) -> Self {
        info!(
            subsystem = "jobs",
            component = "monitor",
            job_id,
            outcome = ?self,
            duration_ms = start.elapsed().as_millis() as u64,
            "Monitoring finished"
        );
        self
    }
}
