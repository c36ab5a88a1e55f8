//! HTTP transport for the Gemini `generateContent` endpoint.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use roadwatch_core::{defaults, Error, Result};

use crate::caption::GenerateTransport;
use crate::error::{CaptionErrorKind, CaptionFailure};
use crate::types::{GenerateContentRequest, GenerateContentResponse};

/// Connection settings for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL up to and including `/models`.
    pub base_url: String,
    /// API key; calls fail with a configuration error when absent.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::GEMINI_BASE_URL.to_string(),
            api_key: None,
            timeout_seconds: defaults::CAPTION_TIMEOUT_SECS,
        }
    }
}

impl GeminiConfig {
    /// Read `GEMINI_BASE_URL`, `GEMINI_API_KEY`, and `CAPTION_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| defaults::GEMINI_BASE_URL.to_string()),
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            timeout_seconds: std::env::var("CAPTION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::CAPTION_TIMEOUT_SECS),
        }
    }
}

/// Gemini REST client. One request per call, no retries of its own.
pub struct GeminiTransport {
    client: Client,
    config: GeminiConfig,
}

impl GeminiTransport {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl GenerateTransport for GeminiTransport {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> std::result::Result<String, CaptionFailure> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Err(CaptionFailure::new(
                CaptionErrorKind::Configuration,
                "GEMINI_API_KEY is not set",
            ));
        };

        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CaptionFailure::from_response(status.as_u16(), &body));
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            CaptionFailure::new(
                CaptionErrorKind::EmptyResponse,
                format!("Unreadable response body: {e}"),
            )
        })?;

        debug!(
            subsystem = "inference",
            component = "gemini",
            model,
            duration_ms = start.elapsed().as_millis() as u64,
            "generateContent returned"
        );

        body.first_text()
            .map(str::to_string)
            .ok_or_else(|| CaptionFailure::new(CaptionErrorKind::EmptyResponse, "Empty response from model"))
    }
}
