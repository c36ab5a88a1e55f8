//! Collaborators shared by the orchestrator and every job monitor.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use roadwatch_core::{AlertNotifier, CaptionBackend, Error, Incident, NewIncident, Result};
use roadwatch_db::IdAllocator;

use crate::config::OrchestratorConfig;
use crate::events::MonitorEvent;
use crate::media::FrameLoader;
use crate::registry::TaskRegistry;
use crate::worker_client::WorkerApi;

pub(crate) struct Pipeline {
    pub config: OrchestratorConfig,
    pub registry: Arc<TaskRegistry>,
    pub worker: Arc<dyn WorkerApi>,
    pub caption: Arc<dyn CaptionBackend>,
    pub allocator: IdAllocator,
    pub notifier: Arc<dyn AlertNotifier>,
    pub frames: FrameLoader,
    pub events: broadcast::Sender<MonitorEvent>,
}

impl Pipeline {
    /// Broadcast an event; having no subscribers is fine.
    pub fn emit(&self, event: MonitorEvent) {
        let _ = self.events.send(event);
    }

    /// Persist an incident under a fresh id, then alert.
    ///
    /// A failed alert is logged and leaves `alert_sent` false; the row stays.
    pub async fn record_incident(
        &self,
        job_id: Option<&str>,
        draft: &NewIncident,
    ) -> Result<Incident> {
        let mut incident = self.allocator.persist(draft).await.map_err(|e| match e {
            Error::DuplicateId(_) => e,
            other => Error::Persistence(other.to_string()),
        })?;

        info!(
            subsystem = "jobs",
            component = "incidents",
            op = "record",
            job_id = job_id.unwrap_or(""),
            incident_id = incident.id,
            "Incident saved"
        );
        self.emit(MonitorEvent::IncidentCreated {
            job_id: job_id.map(str::to_string),
            incident_id: incident.id,
        });

        match self.notifier.notify(&incident).await {
            Ok(()) => match self
                .allocator
                .repository()
                .mark_alert_sent(incident.id)
                .await
            {
                Ok(()) => incident.alert_sent = true,
                Err(e) => warn!(
                    subsystem = "jobs",
                    component = "alerts",
                    incident_id = incident.id,
                    error = %e,
                    "Alert sent but flag not saved"
                ),
            },
            Err(e) => warn!(
                subsystem = "jobs",
                component = "alerts",
                notifier = self.notifier.name(),
                incident_id = incident.id,
                error = %e,
                "Alert delivery failed"
            ),
        }

        Ok(incident)
    }
}
