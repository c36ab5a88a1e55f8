//! Core traits for roadwatch abstractions.
//!
//! These traits define the seams between the orchestration logic and its
//! collaborators (incident store, captioning model, alert channel), enabling
//! pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ImageFrame, Incident, NewIncident};

// =============================================================================
// INCIDENT STORE
// =============================================================================

/// Storage for incident rows.
///
/// Ids are assigned by the caller (see the gap-filling allocator), so the
/// store exposes the aggregate queries allocation needs and an insert that
/// refuses to overwrite.
#[async_trait]
pub trait IncidentRepository: Send + Sync {
    /// Whether a row with this id exists.
    async fn exists(&self, id: i64) -> Result<bool>;

    /// Smallest `n` such that `n - 1` is used and `n` is free, if the table is non-empty.
    async fn next_gap_id(&self) -> Result<Option<i64>>;

    /// Largest used id, if any.
    async fn max_id(&self) -> Result<Option<i64>>;

    /// Insert a row under `id`.
    ///
    /// Fails with [`Error::DuplicateId`](crate::Error::DuplicateId) when the id
    /// is already taken; never replaces an existing row.
    async fn insert(&self, id: i64, incident: &NewIncident) -> Result<Incident>;

    /// Fetch one row.
    async fn get(&self, id: i64) -> Result<Option<Incident>>;

    /// All rows ordered by id.
    async fn list(&self) -> Result<Vec<Incident>>;

    /// Most recent rows by timestamp, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<Incident>>;

    /// Record that the alert for this incident went out.
    async fn mark_alert_sent(&self, id: i64) -> Result<()>;

    /// Delete a row, freeing its id for reuse. Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool>;
}

// =============================================================================
// CAPTIONING
// =============================================================================

/// Generative model that turns still frames into an incident narrative.
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    /// Caption `images` with `prompt` placed first in the request.
    ///
    /// Overload and quota failures come back as in-band degraded text;
    /// only malformed requests and configuration problems are errors.
    async fn caption(&self, prompt: &str, images: &[ImageFrame]) -> Result<String>;

    /// The prompt loaded at construction.
    fn prompt(&self) -> &str;

    /// Caption with the loaded prompt.
    async fn describe(&self, images: &[ImageFrame]) -> Result<String> {
        self.caption(self.prompt(), images).await
    }

    /// Primary model name.
    fn model_name(&self) -> &str;
}

// =============================================================================
// ALERTS
// =============================================================================

/// Downstream channel told about each newly recorded incident.
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Deliver the alert. `Ok` means the incident may be marked as alerted.
    async fn notify(&self, incident: &Incident) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &str;
}
