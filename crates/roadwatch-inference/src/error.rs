//! Classification of captioning endpoint failures.
//!
//! The retry loop only needs to know whether a failure is worth waiting on,
//! worth switching models for, or fatal. Everything else degrades to in-band
//! text.

use std::fmt;

use roadwatch_core::Error;

/// Category of a failed `generateContent` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionErrorKind {
    /// 400: the request itself is malformed.
    InvalidRequest,
    /// 401 or no API key configured.
    Configuration,
    /// 403: key valid but not allowed (quota projects, region blocks).
    PermissionDenied,
    /// 404: model name unknown to the endpoint.
    ModelNotFound,
    /// 429, 503, or a capacity message in the body.
    Overloaded,
    /// Any other 5xx.
    ServerError,
    /// 2xx without a candidate text part.
    EmptyResponse,
    /// Timeout, DNS, connection reset.
    Transport,
    Unknown,
}

impl CaptionErrorKind {
    /// Determine the category from an HTTP status and response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Configuration,
            403 => Self::PermissionDenied,
            404 => Self::ModelNotFound,
            429 | 503 => Self::Overloaded,
            _ if body_signals_overload(body) => Self::Overloaded,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Worth waiting and trying the same model again.
    pub fn is_overloaded(&self) -> bool {
        matches!(self, Self::Overloaded)
    }

    /// Worth moving on to the next model tier.
    pub fn should_fall_back(&self) -> bool {
        matches!(self, Self::Overloaded | Self::ModelNotFound)
    }

    /// Raised to the caller instead of degrading.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidRequest | Self::Configuration)
    }

    /// Expected service-side conditions, as opposed to unexplained failures.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Overloaded | Self::ModelNotFound | Self::PermissionDenied
        )
    }
}

fn body_signals_overload(body: &str) -> bool {
    body.contains("RESOURCE_EXHAUSTED")
        || body.contains("UNAVAILABLE")
        || body.to_ascii_lowercase().contains("overloaded")
}

/// A failed call against one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionFailure {
    pub kind: CaptionErrorKind,
    pub message: String,
}

impl CaptionFailure {
    pub fn new(kind: CaptionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build from a non-2xx HTTP response.
    pub fn from_response(status: u16, body: &str) -> Self {
        Self::new(
            CaptionErrorKind::from_response(status, body),
            format!("HTTP {status}: {}", truncate(body, 500)),
        )
    }

    /// Convert to the crate error surfaced to callers.
    pub fn into_error(self, model: &str) -> Error {
        Error::Model(format!("{model}: {}", self.message))
    }
}

impl fmt::Display for CaptionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<reqwest::Error> for CaptionFailure {
    fn from(e: reqwest::Error) -> Self {
        Self::new(CaptionErrorKind::Transport, e.to_string())
    }
}

/// Cut `text` to at most `max` characters on a char boundary.
pub(crate) fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_status() {
        assert_eq!(
            CaptionErrorKind::from_response(400, ""),
            CaptionErrorKind::InvalidRequest
        );
        assert_eq!(
            CaptionErrorKind::from_response(401, ""),
            CaptionErrorKind::Configuration
        );
        assert_eq!(
            CaptionErrorKind::from_response(403, ""),
            CaptionErrorKind::PermissionDenied
        );
        assert_eq!(
            CaptionErrorKind::from_response(404, ""),
            CaptionErrorKind::ModelNotFound
        );
        assert_eq!(
            CaptionErrorKind::from_response(429, ""),
            CaptionErrorKind::Overloaded
        );
        assert_eq!(
            CaptionErrorKind::from_response(503, ""),
            CaptionErrorKind::Overloaded
        );
        assert_eq!(
            CaptionErrorKind::from_response(502, "bad gateway"),
            CaptionErrorKind::ServerError
        );
        assert_eq!(
            CaptionErrorKind::from_response(418, ""),
            CaptionErrorKind::Unknown
        );
    }

    #[test]
    fn test_overload_detected_from_body() {
        let body = r#"{"error":{"code":500,"message":"The model is overloaded.","status":"INTERNAL"}}"#;
        assert_eq!(
            CaptionErrorKind::from_response(500, body),
            CaptionErrorKind::Overloaded
        );
        let body = r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            CaptionErrorKind::from_response(500, body),
            CaptionErrorKind::Overloaded
        );
    }

    #[test]
    fn test_bad_request_stays_fatal_even_if_body_mentions_overload() {
        assert_eq!(
            CaptionErrorKind::from_response(400, "overloaded"),
            CaptionErrorKind::InvalidRequest
        );
    }

    #[test]
    fn test_policy_flags() {
        assert!(CaptionErrorKind::Overloaded.is_overloaded());
        assert!(CaptionErrorKind::Overloaded.should_fall_back());
        assert!(CaptionErrorKind::ModelNotFound.should_fall_back());
        assert!(!CaptionErrorKind::ModelNotFound.is_overloaded());
        assert!(!CaptionErrorKind::ServerError.should_fall_back());
        assert!(CaptionErrorKind::InvalidRequest.is_fatal());
        assert!(CaptionErrorKind::Configuration.is_fatal());
        assert!(!CaptionErrorKind::PermissionDenied.is_fatal());
        assert!(CaptionErrorKind::PermissionDenied.is_service_unavailable());
        assert!(!CaptionErrorKind::Transport.is_service_unavailable());
    }

    #[test]
    fn test_into_error_is_model_error() {
        let err = CaptionFailure::from_response(400, "bad part").into_error("gemini-1.5-flash");
        assert!(matches!(err, Error::Model(_)));
        assert!(err.to_string().contains("gemini-1.5-flash"));
        assert!(err.to_string().contains("HTTP 400"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("xin chào", 6), "xin ch");
        assert_eq!(truncate("tai nạn", 100), "tai nạn");
    }
}
