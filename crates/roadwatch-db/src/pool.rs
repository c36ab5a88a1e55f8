//! Incident store connection settings.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use roadwatch_core::{defaults, Error, Result};

/// Where the incident store lives and how many connections to hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
        }
    }
}

impl DbConfig {
    /// Read `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`, falling back to defaults.
    pub fn from_env() -> Self {
        let base = Self::default();
        let url = std::env::var("DATABASE_URL").unwrap_or(base.url);
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(base.max_connections)
            .max(1);
        Self {
            url,
            max_connections,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// The URL without credentials, safe for logs and error messages.
    pub fn redacted_url(&self) -> String {
        redact_url(&self.url)
    }

    /// Open the pool.
    pub async fn connect(&self) -> Result<PgPool> {
        let start = Instant::now();
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(defaults::DATABASE_ACQUIRE_TIMEOUT_SECS))
            .connect(&self.url)
            .await
            .map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "pool",
            op = "connect",
            url = %self.redacted_url(),
            max_connections = self.max_connections,
            duration_ms = start.elapsed().as_millis() as u64,
            "Incident store connected"
        );
        Ok(pool)
    }
}

/// Drop the `user:password@` part of a connection URL.
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
        return url.to_string();
    };
    let rest = &url[scheme_end..];
    let authority_end = rest
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}{}", &url[..scheme_end], &rest[at + 1..]),
        None => url.to_string(),
    }
}
