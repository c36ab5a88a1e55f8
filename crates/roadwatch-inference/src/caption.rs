//! Captioning with retry and model fallback.
//!
//! The primary model gets up to [`CaptionPolicy::primary_attempts`] tries,
//! waiting [`CaptionPolicy::retry_delay`] after each overload. If it ends on
//! an overload or unknown-model failure, each fallback tier gets one try in
//! order. When nothing succeeds the caller still receives text: a notice
//! starting with [`DEGRADED_PREFIX`]. Only malformed requests and
//! configuration problems are returned as errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, warn};

use roadwatch_core::{defaults, CaptionBackend, ImageFrame, Result};

use crate::error::{truncate, CaptionFailure};
use crate::gemini::GeminiTransport;
use crate::prompt::{load_prompt, prompt_paths_from_env};
use crate::types::GenerateContentRequest;

/// Marks captioning output that is a service notice rather than a description.
pub const DEGRADED_PREFIX: &str = "[AI unavailable]";

/// Notice returned when every tier was overloaded, missing, or forbidden.
pub const SERVICE_UNAVAILABLE_NOTICE: &str = "[AI unavailable] The captioning service is \
overloaded or the API quota is exhausted. This report is based on local detection data only.";

/// Whether `text` is a degraded-service notice.
pub fn is_degraded(text: &str) -> bool {
    text.starts_with(DEGRADED_PREFIX)
}

/// One `generateContent` call against a named model.
#[async_trait]
pub trait GenerateTransport: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> std::result::Result<String, CaptionFailure>;
}

#[async_trait]
impl<T: GenerateTransport + ?Sized> GenerateTransport for Arc<T> {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> std::result::Result<String, CaptionFailure> {
        (**self).generate(model, request).await
    }
}

/// Model tiers and retry timing.
#[derive(Debug, Clone)]
pub struct CaptionPolicy {
    pub primary_model: String,
    /// Tried in order, one attempt each.
    pub fallback_models: Vec<String>,
    pub primary_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for CaptionPolicy {
    fn default() -> Self {
        Self {
            primary_model: defaults::CAPTION_MODEL.to_string(),
            fallback_models: defaults::CAPTION_FALLBACK_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            primary_attempts: defaults::CAPTION_PRIMARY_ATTEMPTS,
            retry_delay: Duration::from_millis(defaults::CAPTION_RETRY_DELAY_MS),
        }
    }
}

impl CaptionPolicy {
    /// Read `GEMINI_MODEL`, `GEMINI_FALLBACK_MODELS` (comma separated), and
    /// `CAPTION_RETRY_DELAY_MS`.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            primary_model: std::env::var("GEMINI_MODEL")
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(base.primary_model),
            fallback_models: std::env::var("GEMINI_FALLBACK_MODELS")
                .ok()
                .map(|list| parse_model_list(&list))
                .unwrap_or(base.fallback_models),
            primary_attempts: base.primary_attempts,
            retry_delay: std::env::var("CAPTION_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(base.retry_delay),
        }
    }

    pub fn with_primary_model(mut self, model: impl Into<String>) -> Self {
        self.primary_model = model.into();
        self
    }

    pub fn with_fallback_models<S: Into<String>>(mut self, models: impl IntoIterator<Item = S>) -> Self {
        self.fallback_models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_primary_attempts(mut self, attempts: u32) -> Self {
        self.primary_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

fn parse_model_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// [`CaptionBackend`] over a [`GenerateTransport`] with the tiered retry policy.
pub struct CaptionClient<T> {
    transport: T,
    policy: CaptionPolicy,
    prompt: String,
}

impl CaptionClient<GeminiTransport> {
    /// Gemini client configured from the environment, prompt loaded from disk.
    pub fn from_env() -> Result<Self> {
        let transport = GeminiTransport::from_env()?;
        let prompt = load_prompt(&prompt_paths_from_env());
        Ok(Self::new(transport, CaptionPolicy::from_env(), prompt))
    }
}

impl<T: GenerateTransport> CaptionClient<T> {
    pub fn new(transport: T, policy: CaptionPolicy, prompt: impl Into<String>) -> Self {
        Self {
            transport,
            policy,
            prompt: prompt.into(),
        }
    }

    pub fn policy(&self) -> &CaptionPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Retry the primary model while it reports overload.
    async fn try_primary(
        &self,
        request: &GenerateContentRequest,
    ) -> std::result::Result<String, CaptionFailure> {
        let model = self.policy.primary_model.as_str();
        let attempts = self.policy.primary_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.transport.generate(model, request).await {
                Ok(text) => return Ok(text),
                Err(failure) => {
                    let retry = failure.kind.is_overloaded() && attempt < attempts;
                    warn!(
                        subsystem = "inference",
                        component = "caption",
                        model,
                        attempt,
                        attempts,
                        kind = ?failure.kind,
                        error = %failure.message,
                        "Primary captioning attempt failed"
                    );
                    if !retry {
                        return Err(failure);
                    }
                    tokio::time::sleep(self.policy.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<T: GenerateTransport> CaptionBackend for CaptionClient<T> {
    async fn caption(&self, prompt: &str, images: &[ImageFrame]) -> Result<String> {
        let request = GenerateContentRequest::from_prompt_and_frames(prompt, images);
        let start = Instant::now();

        info!(
            subsystem = "inference",
            component = "caption",
            op = "caption",
            model = %self.policy.primary_model,
            prompt_chars = prompt.chars().count(),
            images = request.image_count(),
            inline_kb = request.inline_bytes() / 1024,
            "Sending captioning request"
        );

        let mut failure = match self.try_primary(&request).await {
            Ok(text) => return Ok(text),
            Err(f) if f.kind.is_fatal() => return Err(f.into_error(&self.policy.primary_model)),
            Err(f) => f,
        };

        if failure.kind.should_fall_back() {
            for model in &self.policy.fallback_models {
                info!(
                    subsystem = "inference",
                    component = "caption",
                    model = %model,
                    "Trying fallback model"
                );
                match self.transport.generate(model, &request).await {
                    Ok(text) => return Ok(text),
                    Err(f) if f.kind.is_fatal() => return Err(f.into_error(model)),
                    Err(f) => {
                        warn!(
                            subsystem = "inference",
                            component = "caption",
                            model = %model,
                            kind = ?f.kind,
                            error = %f.message,
                            "Fallback model failed"
                        );
                        failure = f;
                    }
                }
            }
        }

        warn!(
            subsystem = "inference",
            component = "caption",
            kind = ?failure.kind,
            duration_ms = start.elapsed().as_millis() as u64,
            "All captioning tiers failed, returning degraded notice"
        );
        Ok(degraded_notice(&failure))
    }

    fn prompt(&self) -> &str {
        &self.prompt
    }

    fn model_name(&self) -> &str {
        &self.policy.primary_model
    }
}

fn degraded_notice(failure: &CaptionFailure) -> String {
    if failure.kind.is_service_unavailable() {
        SERVICE_UNAVAILABLE_NOTICE.to_string()
    } else {
        format!(
            "{DEGRADED_PREFIX} Captioning failed: {}",
            truncate(&failure.message, 200)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptionErrorKind;
    use crate::mock::ScriptedTransport;

    fn frame() -> ImageFrame {
        ImageFrame::with_mime_type(vec![0xFF, 0xD8, 0xFF], "image/jpeg")
    }

    fn overloaded() -> CaptionFailure {
        CaptionFailure::new(CaptionErrorKind::Overloaded, "HTTP 503: overloaded")
    }

    fn client(transport: Arc<ScriptedTransport>) -> CaptionClient<Arc<ScriptedTransport>> {
        CaptionClient::new(transport, CaptionPolicy::default(), "Describe the incident.")
    }

    #[tokio::test(start_paused = true)]
    async fn test_overload_twice_then_success_waits_two_intervals() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Err(overloaded()));
        transport.push(Err(overloaded()));
        transport.push(Ok("Two cars collided at the junction.".to_string()));
        let client = client(transport.clone());

        let start = tokio::time::Instant::now();
        let text = client.describe(&[frame()]).await.unwrap();

        assert_eq!(text, "Two cars collided at the junction.");
        assert_eq!(start.elapsed(), Duration::from_millis(2 * defaults::CAPTION_RETRY_DELAY_MS));
        assert_eq!(
            transport.models_called(),
            vec!["gemini-1.5-flash"; 3],
            "no fallback tier should be called"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_tiers_overloaded_degrades() {
        let transport = Arc::new(ScriptedTransport::new().with_default(Err(overloaded())));
        let client = client(transport.clone());

        let text = client.describe(&[frame()]).await.unwrap();

        assert!(!text.is_empty());
        assert!(is_degraded(&text));
        assert_eq!(text, SERVICE_UNAVAILABLE_NOTICE);
        assert_eq!(
            transport.models_called(),
            vec![
                "gemini-1.5-flash",
                "gemini-1.5-flash",
                "gemini-1.5-flash",
                "gemini-1.5-flash-8b",
                "gemini-2.5-flash",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sleep_after_final_primary_attempt() {
        let transport = Arc::new(ScriptedTransport::new().with_default(Err(overloaded())));
        let client = CaptionClient::new(
            transport,
            CaptionPolicy::default().with_fallback_models(Vec::<String>::new()),
            "p",
        );

        let start = tokio::time::Instant::now();
        let text = client.describe(&[frame()]).await.unwrap();

        assert!(is_degraded(&text));
        assert_eq!(start.elapsed(), Duration::from_millis(2 * defaults::CAPTION_RETRY_DELAY_MS));
    }

    #[tokio::test]
    async fn test_bad_request_raises_without_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Err(CaptionFailure::from_response(400, "Invalid inline_data")));
        let client = client(transport.clone());

        let err = client.describe(&[frame()]).await.unwrap_err();

        assert!(matches!(err, roadwatch_core::Error::Model(_)));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_model_falls_back_immediately() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Err(CaptionFailure::from_response(404, "models/x is not found")));
        transport.push(Ok("Fallback description".to_string()));
        let client = client(transport.clone());

        let text = client.describe(&[frame()]).await.unwrap();

        assert_eq!(text, "Fallback description");
        assert_eq!(
            transport.models_called(),
            vec!["gemini-1.5-flash", "gemini-1.5-flash-8b"]
        );
    }

    #[tokio::test]
    async fn test_server_error_degrades_without_fallback() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Err(CaptionFailure::from_response(500, "internal")));
        let client = client(transport.clone());

        let text = client.describe(&[frame()]).await.unwrap();

        assert!(text.starts_with(DEGRADED_PREFIX));
        assert!(text.contains("HTTP 500"));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_forbidden_degrades_to_service_notice() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Err(CaptionFailure::from_response(403, "PERMISSION_DENIED")));
        let client = client(transport.clone());

        let text = client.describe(&[frame()]).await.unwrap();
        assert_eq!(text, SERVICE_UNAVAILABLE_NOTICE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_on_fallback_tier_raises() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..3 {
            transport.push(Err(overloaded()));
        }
        transport.push(Err(CaptionFailure::new(CaptionErrorKind::Configuration, "HTTP 401")));
        let client = client(transport.clone());

        let err = client.describe(&[frame()]).await.unwrap_err();
        assert!(err.to_string().contains("gemini-1.5-flash-8b"));
    }

    #[tokio::test]
    async fn test_prompt_sent_first() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Ok("ok".to_string()));
        let client = client(transport.clone());

        client.describe(&[frame(), frame()]).await.unwrap();

        let request = transport.last_request().unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Describe the incident.");
        assert_eq!(request.image_count(), 2);
    }

    #[test]
    fn test_parse_model_list() {
        assert_eq!(
            parse_model_list(" a , b,,c "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
