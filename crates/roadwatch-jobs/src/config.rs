//! Orchestrator configuration.

use std::path::PathBuf;
use std::time::Duration;

use roadwatch_core::defaults;

/// Configuration for job submission, monitoring, and incident recording.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Detection worker base URL.
    pub worker_url: String,
    /// Timeout for worker submission, status, and file requests.
    pub worker_timeout: Duration,
    /// Delay before each status poll.
    pub poll_interval: Duration,
    /// Jobs monitored at the same time; further monitors wait for a slot.
    pub max_concurrent_monitors: usize,
    /// Directory that relative snapshot names resolve against.
    pub data_dir: PathBuf,
    /// Prefix for media URLs stored on incidents.
    pub download_url_prefix: String,
    /// Location recorded on incidents created from video jobs.
    pub incident_location: String,
    /// Webhook for incident alerts; alerts are only logged when unset.
    pub alert_webhook_url: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_url: defaults::WORKER_URL.to_string(),
            worker_timeout: Duration::from_secs(defaults::WORKER_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(defaults::MONITOR_POLL_INTERVAL_MS),
            max_concurrent_monitors: defaults::MONITOR_MAX_CONCURRENT,
            data_dir: PathBuf::from(defaults::DATA_DIR),
            download_url_prefix: defaults::DOWNLOAD_URL_PREFIX.to_string(),
            incident_location: defaults::INCIDENT_LOCATION.to_string(),
            alert_webhook_url: None,
        }
    }
}

impl OrchestratorConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `WORKER_URL` | `http://localhost:5000` | Detection worker base URL |
    /// | `WORKER_TIMEOUT_SECS` | `30` | Worker request timeout |
    /// | `MONITOR_POLL_INTERVAL_MS` | `1000` | Delay between status polls |
    /// | `MONITOR_MAX_CONCURRENT` | `3` | Simultaneously monitored jobs |
    /// | `DATA_DIR` | `../data` | Snapshot and media directory |
    /// | `DOWNLOAD_URL_PREFIX` | `/api/videos/download/` | Media URL prefix |
    /// | `INCIDENT_LOCATION` | `Camera-01 (Video Analysis)` | Incident location |
    /// | `ALERT_WEBHOOK_URL` | unset | Alert webhook (log-only when unset) |
    pub fn from_env() -> Self {
        let base = Self::default();

        let worker_url = std::env::var("WORKER_URL").unwrap_or(base.worker_url);

        let worker_timeout = std::env::var("WORKER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(base.worker_timeout);

        let poll_interval = std::env::var("MONITOR_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(base.poll_interval);

        let max_concurrent_monitors = std::env::var("MONITOR_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(base.max_concurrent_monitors)
            .max(1);

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(base.data_dir);

        let download_url_prefix =
            std::env::var("DOWNLOAD_URL_PREFIX").unwrap_or(base.download_url_prefix);

        let incident_location =
            std::env::var("INCIDENT_LOCATION").unwrap_or(base.incident_location);

        let alert_webhook_url = std::env::var("ALERT_WEBHOOK_URL")
            .ok()
            .filter(|v| !v.is_empty());

        Self {
            worker_url,
            worker_timeout,
            poll_interval,
            max_concurrent_monitors,
            data_dir,
            download_url_prefix,
            incident_location,
            alert_webhook_url,
        }
    }

    pub fn with_worker_url(mut self, url: impl Into<String>) -> Self {
        self.worker_url = url.into();
        self
    }

    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_monitors = max.max(1);
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_download_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.download_url_prefix = prefix.into();
        self
    }

    pub fn with_incident_location(mut self, location: impl Into<String>) -> Self {
        self.incident_location = location.into();
        self
    }

    pub fn with_alert_webhook(mut self, url: impl Into<String>) -> Self {
        self.alert_webhook_url = Some(url.into());
        self
    }

    /// Download URL for a stored media file name.
    pub fn download_url(&self, file_name: &str) -> String {
        format!("{}{}", self.download_url_prefix, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.worker_url, "http://localhost:5000");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_concurrent_monitors, 3);
        assert_eq!(config.worker_timeout, Duration::from_secs(30));
        assert!(config.alert_webhook_url.is_none());
    }

    #[test]
    fn test_builder() {
        let config = OrchestratorConfig::default()
            .with_worker_url("http://worker:5000")
            .with_poll_interval(Duration::from_millis(10))
            .with_max_concurrent(0)
            .with_download_url_prefix("/media/");
        assert_eq!(config.worker_url, "http://worker:5000");
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.max_concurrent_monitors, 1);
        assert_eq!(config.download_url("a.jpg"), "/media/a.jpg");
    }
}
