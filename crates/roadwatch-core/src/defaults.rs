//! Centralized default constants for roadwatch.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers, and the `from_env()` constructors fall back to them.

// =============================================================================
// DETECTION WORKER
// =============================================================================

/// Default detection worker base URL.
pub const WORKER_URL: &str = "http://localhost:5000";

/// Timeout for worker submission and status requests in seconds.
pub const WORKER_TIMEOUT_SECS: u64 = 30;

/// Path prefix the worker uses for files it serves itself (realtime captures).
pub const WORKER_DATA_PREFIX: &str = "/data/";

/// Default detection model size requested from the worker.
pub const WORKER_MODEL_TYPE: &str = "medium";

// =============================================================================
// MONITORING
// =============================================================================

/// Interval between status polls for one job, in milliseconds.
pub const MONITOR_POLL_INTERVAL_MS: u64 = 1_000;

/// Number of jobs that can be monitored at the same time.
pub const MONITOR_MAX_CONCURRENT: usize = 3;

/// Broadcast channel capacity for monitor lifecycle events.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Suffix the worker appends to the rendered output path for its metadata.
pub const SIDECAR_SUFFIX: &str = ".json";

/// Extension of rendered output, replaced by the legacy sidecar convention.
pub const RENDERED_EXTENSION: &str = ".webm";

// =============================================================================
// CAPTIONING
// =============================================================================

/// Default Gemini REST base URL (model name and method are appended).
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Primary captioning model.
pub const CAPTION_MODEL: &str = "gemini-1.5-flash";

/// Fallback tiers, tried in order after the primary gives up.
pub const CAPTION_FALLBACK_MODELS: [&str; 2] = ["gemini-1.5-flash-8b", "gemini-2.5-flash"];

/// Attempts made against the primary model before falling back.
pub const CAPTION_PRIMARY_ATTEMPTS: u32 = 3;

/// Delay between primary attempts after an overload response, in milliseconds.
pub const CAPTION_RETRY_DELAY_MS: u64 = 2_000;

/// Timeout for a single captioning request in seconds.
pub const CAPTION_TIMEOUT_SECS: u64 = 120;

/// Prompt locations tried in order; the first readable file wins.
pub const CAPTION_PROMPT_PATHS: [&str; 2] = ["prompt/prompt.txt", "data/prompt.txt"];

/// Prompt used when no prompt file can be read.
pub const CAPTION_FALLBACK_PROMPT: &str = "You are an AI assistant analysing traffic accidents. \
Describe the scene in the image: vehicles involved, visible damage, road and weather \
conditions, and whether emergency services appear to be needed.";

/// MIME type assumed for frames whose magic bytes are not recognised.
pub const FRAME_MIME_TYPE: &str = "image/jpeg";

// =============================================================================
// INCIDENTS
// =============================================================================

/// Incident type recorded for worker-detected events.
pub const INCIDENT_TYPE: &str = "Accident";

/// Location recorded for incidents detected from uploaded video.
pub const INCIDENT_LOCATION: &str = "Camera-01 (Video Analysis)";

/// URL prefix under which processed media is served to clients.
pub const DOWNLOAD_URL_PREFIX: &str = "/api/videos/download/";

/// Directory holding uploads, rendered output, and snapshots.
pub const DATA_DIR: &str = "../data";

/// Default number of rows for "recent incidents" listings.
pub const RECENT_INCIDENTS_LIMIT: i64 = 10;

/// Timeout for alert webhook delivery in seconds.
pub const ALERT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// DATABASE
// =============================================================================

/// Default database URL for the incident store.
pub const DATABASE_URL: &str = "postgres://localhost/roadwatch";

/// Connections held open to the incident store; one insert per finished job.
pub const DATABASE_MAX_CONNECTIONS: u32 = 5;

/// How long to wait for a free connection, in seconds.
pub const DATABASE_ACQUIRE_TIMEOUT_SECS: u64 = 30;
