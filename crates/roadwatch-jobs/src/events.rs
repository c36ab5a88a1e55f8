//! Job lifecycle events.

use serde::Serialize;

/// Event broadcast as jobs move through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// The worker accepted a job.
    Submitted { job_id: String, realtime: bool },
    /// A poll reported progress.
    Progress {
        job_id: String,
        progress: i32,
        message: String,
    },
    /// The job finished and reconciliation ran.
    Completed { job_id: String, has_report: bool },
    /// The job failed on the worker or was lost.
    Failed { job_id: String, message: String },
    /// Monitoring stopped without a terminal state (realtime stream ended).
    Detached { job_id: String, remote_status: String },
    /// An incident row was written for the job (or for a manual report).
    IncidentCreated {
        job_id: Option<String>,
        incident_id: i64,
    },
}

impl MonitorEvent {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Submitted { job_id, .. }
            | Self::Progress { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::Detached { job_id, .. } => Some(job_id),
            Self::IncidentCreated { job_id, .. } => job_id.as_deref(),
        }
    }

    /// Whether monitoring of the job ends with this event.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Detached { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_tag() {
        let event = MonitorEvent::Completed {
            job_id: "job-1".into(),
            has_report: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "completed");
        assert_eq!(json["job_id"], "job-1");
    }

    #[test]
    fn test_final_events() {
        assert!(MonitorEvent::Detached {
            job_id: "j".into(),
            remote_status: "STOPPED".into()
        }
        .is_final());
        assert!(!MonitorEvent::Progress {
            job_id: "j".into(),
            progress: 1,
            message: String::new()
        }
        .is_final());
        assert_eq!(
            MonitorEvent::IncidentCreated {
                job_id: None,
                incident_id: 1
            }
            .job_id(),
            None
        );
    }
}
