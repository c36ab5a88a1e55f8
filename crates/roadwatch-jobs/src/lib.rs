//! # roadwatch-jobs
//!
//! Job orchestration for the roadwatch pipeline.
//!
//! A job is submitted to the external detection worker, tracked in an
//! in-memory [`TaskRegistry`], and polled by a [`monitor`] task until the
//! worker reports a terminal state. Completed jobs are reconciled against the
//! worker's metadata sidecar; jobs with a detection and no pre-computed report
//! are captioned and recorded as incidents with gap-filled ids.
//!
//! ```no_run
//! use std::sync::Arc;
//! use roadwatch_db::InMemoryIncidentRepository;
//! use roadwatch_inference::CaptionClient;
//! use roadwatch_jobs::{OrchestratorBuilder, OrchestratorConfig, SubmitJobRequest};
//!
//! # async fn run() -> roadwatch_core::Result<()> {
//! let orchestrator = OrchestratorBuilder::new(
//!     Arc::new(InMemoryIncidentRepository::new()),
//!     Arc::new(CaptionClient::from_env()?),
//! )
//! .with_config(OrchestratorConfig::from_env())
//! .build()?;
//!
//! let job_id = orchestrator
//!     .submit(SubmitJobRequest::new("../data/in.mp4", "../data/out.webm"))
//!     .await?;
//! let outcome = orchestrator.join(&job_id).await?;
//! println!("{job_id}: {outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod events;
pub mod media;
pub mod metadata;
pub mod monitor;
pub mod notify;
pub mod orchestrator;
mod pipeline;
pub mod registry;
pub mod worker_client;

pub use roadwatch_core::*;

pub use config::OrchestratorConfig;
pub use events::MonitorEvent;
pub use media::FrameLoader;
pub use metadata::{ReconcileDecision, SidecarMetadata, SkipReason};
pub use monitor::MonitorOutcome;
pub use notify::{notifier_for, LogNotifier, WebhookNotifier, INCIDENT_CREATED_EVENT};
pub use orchestrator::{JobResult, ManualReport, Orchestrator, OrchestratorBuilder};
pub use registry::TaskRegistry;
pub use worker_client::{HttpWorkerClient, RemoteState, RemoteStatus, WorkerApi};
