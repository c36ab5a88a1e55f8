//! # roadwatch-inference
//!
//! Image captioning for the roadwatch incident pipeline.
//!
//! This crate provides:
//! - Gemini `generateContent` transport over `reqwest`
//! - Tiered retry and model fallback ([`CaptionClient`])
//! - Failure classification (overload, unknown model, fatal)
//! - Prompt loading with a built-in fallback
//!
//! # Feature Flags
//!
//! - `mock`: scripted transport and mock caption backend for downstream tests
//!
//! # Example
//!
//! ```rust,no_run
//! use roadwatch_core::{CaptionBackend, ImageFrame};
//! use roadwatch_inference::CaptionClient;
//!
//! #[tokio::main]
//! async fn main() -> roadwatch_core::Result<()> {
//!     let client = CaptionClient::from_env()?;
//!     let frame = ImageFrame::new(std::fs::read("during.jpg")?);
//!     let report = client.describe(&[frame]).await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

pub mod caption;
pub mod error;
pub mod gemini;
pub mod prompt;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use roadwatch_core::*;

pub use caption::{
    is_degraded, CaptionClient, CaptionPolicy, GenerateTransport, DEGRADED_PREFIX,
    SERVICE_UNAVAILABLE_NOTICE,
};
pub use error::{CaptionErrorKind, CaptionFailure};
pub use gemini::{GeminiConfig, GeminiTransport};
pub use prompt::load_prompt;
pub use types::GenerateContentRequest;
