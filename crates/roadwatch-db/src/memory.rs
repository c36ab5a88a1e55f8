//! In-memory incident store.
//!
//! Used by tests and by deployments that run without PostgreSQL. Same
//! semantics as the SQL store: caller-assigned ids, duplicate ids rejected.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use roadwatch_core::{Error, Incident, IncidentRepository, NewIncident, Result};

#[derive(Default)]
pub struct InMemoryIncidentRepository {
    rows: Mutex<BTreeMap<i64, Incident>>,
}

impl InMemoryIncidentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with rows at the given ids.
    pub fn with_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        let repo = Self::new();
        {
            let mut rows = repo.lock();
            for id in ids {
                rows.insert(id, NewIncident::new("Accident").into_incident(id));
            }
        }
        repo
    }

    /// Ids currently stored, ascending.
    pub fn ids(&self) -> Vec<i64> {
        self.lock().keys().copied().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<i64, Incident>> {
        // A poisoned map is still structurally valid.
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl IncidentRepository for InMemoryIncidentRepository {
    async fn exists(&self, id: i64) -> Result<bool> {
        Ok(self.lock().contains_key(&id))
    }

    async fn next_gap_id(&self) -> Result<Option<i64>> {
        let rows = self.lock();
        Ok(rows
            .keys()
            .map(|id| id + 1)
            .find(|candidate| !rows.contains_key(candidate)))
    }

    async fn max_id(&self) -> Result<Option<i64>> {
        Ok(self.lock().keys().next_back().copied())
    }

    async fn insert(&self, id: i64, incident: &NewIncident) -> Result<Incident> {
        let mut rows = self.lock();
        if rows.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        let row = incident.clone().into_incident(id);
        rows.insert(id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: i64) -> Result<Option<Incident>> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Incident>> {
        Ok(self.lock().values().cloned().collect())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Incident>> {
        let mut rows: Vec<Incident> = self.lock().values().cloned().collect();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(rows)
    }

    async fn mark_alert_sent(&self, id: i64) -> Result<()> {
        match self.lock().get_mut(&id) {
            Some(row) => {
                row.alert_sent = true;
                Ok(())
            }
            None => Err(Error::NotFound(format!("incident {id}"))),
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.lock().remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gap_after_each_used_id() {
        let repo = InMemoryIncidentRepository::with_ids([1, 2, 4]);
        assert_eq!(repo.next_gap_id().await.unwrap(), Some(3));
        assert_eq!(repo.max_id().await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn test_empty_store_has_no_gap() {
        let repo = InMemoryIncidentRepository::new();
        assert_eq!(repo.next_gap_id().await.unwrap(), None);
        assert_eq!(repo.max_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_rejects_taken_id() {
        let repo = InMemoryIncidentRepository::with_ids([7]);
        let err = repo
            .insert(7, &NewIncident::new("Accident"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(7)));
    }

    #[tokio::test]
    async fn test_mark_alert_sent() {
        let repo = InMemoryIncidentRepository::new();
        repo.insert(1, &NewIncident::new("Accident")).await.unwrap();
        repo.mark_alert_sent(1).await.unwrap();
        assert!(repo.get(1).await.unwrap().unwrap().alert_sent);
        assert!(matches!(
            repo.mark_alert_sent(2).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_frees_id() {
        let repo = InMemoryIncidentRepository::with_ids([1, 2, 3]);
        assert!(repo.delete(2).await.unwrap());
        assert!(!repo.delete(2).await.unwrap());
        assert_eq!(repo.next_gap_id().await.unwrap(), Some(2));
    }
}
