//! PostgreSQL incident repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use roadwatch_core::{Error, Incident, IncidentRepository, NewIncident, Result};

const SELECT_COLUMNS: &str = "SELECT id, incident_type, location, \"timestamp\", description,
        image_url, video_url, snapshot_urls, ai_report, alert_sent
     FROM incidents";

/// PostgreSQL implementation of [`IncidentRepository`].
#[derive(Clone)]
pub struct PgIncidentRepository {
    pool: Pool<Postgres>,
}

impl PgIncidentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_incident_row(row: sqlx::postgres::PgRow) -> Incident {
        Incident {
            id: row.get("id"),
            incident_type: row.get("incident_type"),
            location: row.get("location"),
            timestamp: row.get("timestamp"),
            description: row.get("description"),
            image_url: row.get("image_url"),
            video_url: row.get("video_url"),
            snapshot_urls: row.get("snapshot_urls"),
            ai_report: row.get("ai_report"),
            alert_sent: row.get("alert_sent"),
        }
    }
}

#[async_trait]
impl IncidentRepository for PgIncidentRepository {
    async fn exists(&self, id: i64) -> Result<bool> {
        let found: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM incidents WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(found)
    }

    async fn next_gap_id(&self) -> Result<Option<i64>> {
        let gap: Option<i64> = sqlx::query_scalar(
            "SELECT MIN(t1.id + 1)
             FROM incidents t1
             LEFT JOIN incidents t2 ON t1.id + 1 = t2.id
             WHERE t2.id IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(gap)
    }

    async fn max_id(&self) -> Result<Option<i64>> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM incidents")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(max)
    }

    async fn insert(&self, id: i64, incident: &NewIncident) -> Result<Incident> {
        let result = sqlx::query(
            "INSERT INTO incidents (id, incident_type, location, \"timestamp\", description,
                                    image_url, video_url, snapshot_urls, ai_report, alert_sent)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE)",
        )
        .bind(id)
        .bind(&incident.incident_type)
        .bind(&incident.location)
        .bind(incident.timestamp)
        .bind(&incident.description)
        .bind(&incident.image_url)
        .bind(&incident.video_url)
        .bind(&incident.snapshot_urls)
        .bind(&incident.ai_report)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(
                    subsystem = "db",
                    component = "incidents",
                    op = "insert",
                    incident_id = id,
                    "Inserted incident"
                );
                Ok(incident.clone().into_incident(id))
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(Error::DuplicateId(id))
            }
            Err(e) => Err(Error::Database(e)),
        }
    }

    async fn get(&self, id: i64) -> Result<Option<Incident>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(Self::parse_incident_row))
    }

    async fn list(&self) -> Result<Vec<Incident>> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_incident_row).collect())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Incident>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} ORDER BY \"timestamp\" DESC, id DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_incident_row).collect())
    }

    async fn mark_alert_sent(&self, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE incidents SET alert_sent = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("incident {id}")));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
