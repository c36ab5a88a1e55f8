//! Gap-filling incident id allocation.
//!
//! New incidents take the smallest free id that follows a used one, so ids
//! freed by deletions are reused before the maximum grows. Allocation is a
//! read followed by a conditional insert; the store's duplicate-id rejection
//! is what makes concurrent allocation safe.

use std::sync::Arc;

use tracing::{debug, warn};

use roadwatch_core::{Error, Incident, IncidentRepository, NewIncident, Result};

/// Attempts made by [`IdAllocator::persist`] before a duplicate id is surfaced.
pub const PERSIST_ATTEMPTS: u32 = 2;

/// Allocates incident ids against an [`IncidentRepository`].
#[derive(Clone)]
pub struct IdAllocator {
    repo: Arc<dyn IncidentRepository>,
}

impl IdAllocator {
    pub fn new(repo: Arc<dyn IncidentRepository>) -> Self {
        Self { repo }
    }

    /// The backing store.
    pub fn repository(&self) -> &Arc<dyn IncidentRepository> {
        &self.repo
    }

    /// Compute the id the next incident should get.
    ///
    /// 1. `1` when it is free.
    /// 2. Otherwise the smallest free `n` whose predecessor is used.
    /// 3. Otherwise `max + 1`.
    pub async fn next_id(&self) -> Result<i64> {
        if !self.repo.exists(1).await? {
            return Ok(1);
        }
        if let Some(gap) = self.repo.next_gap_id().await? {
            return Ok(gap);
        }
        Ok(self.repo.max_id().await?.map_or(1, |max| max + 1))
    }

    /// Allocate an id and insert `incident` under it.
    ///
    /// A lost race (another writer took the id first) is retried with a fresh
    /// allocation once; a second loss returns [`Error::DuplicateId`].
    pub async fn persist(&self, incident: &NewIncident) -> Result<Incident> {
        let mut attempt = 1;
        loop {
            let id = self.next_id().await?;
            match self.repo.insert(id, incident).await {
                Ok(row) => {
                    debug!(
                        subsystem = "db",
                        component = "allocator",
                        op = "persist",
                        incident_id = id,
                        attempt,
                        "Incident persisted"
                    );
                    return Ok(row);
                }
                Err(Error::DuplicateId(taken)) if attempt < PERSIST_ATTEMPTS => {
                    warn!(
                        subsystem = "db",
                        component = "allocator",
                        op = "persist",
                        incident_id = taken,
                        attempt,
                        "Incident id taken concurrently, reallocating"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
