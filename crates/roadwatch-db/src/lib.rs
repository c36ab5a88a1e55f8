//! # roadwatch-db
//!
//! Incident storage for the roadwatch pipeline.
//!
//! This crate provides:
//! - Connection settings for the incident store
//! - The PostgreSQL incident repository
//! - An in-memory incident repository with identical semantics
//! - Gap-filling incident id allocation
//!
//! ## Example
//!
//! ```rust,ignore
//! use roadwatch_db::{Database, DbConfig, IdAllocator, NewIncident};
//!
//! let db = Database::connect(&DbConfig::from_env()).await?;
//! let allocator = IdAllocator::new(db.incident_store());
//! let row = allocator.persist(&NewIncident::new("Accident")).await?;
//! println!("Created incident {}", row.id);
//! ```

use std::sync::Arc;

pub mod allocator;
pub mod incidents;
pub mod memory;
pub mod pool;

// Re-export core types
pub use roadwatch_core::*;

pub use allocator::IdAllocator;
pub use incidents::PgIncidentRepository;
pub use memory::InMemoryIncidentRepository;
pub use pool::{redact_url, DbConfig};

/// Connection pool plus repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Incident rows.
    pub incidents: PgIncidentRepository,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            incidents: PgIncidentRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn connect(config: &DbConfig) -> Result<Self> {
        Ok(Self::new(config.connect().await?))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// The incident repository as a shareable trait object.
    pub fn incident_store(&self) -> Arc<dyn IncidentRepository> {
        Arc::new(self.incidents.clone())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
