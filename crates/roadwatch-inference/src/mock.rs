//! Test doubles for captioning.
//!
//! [`ScriptedTransport`] replays queued outcomes so the retry and fallback
//! policy can be exercised without a network. [`MockCaptionBackend`] stands
//! in for the whole client when testing the orchestration layer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use roadwatch_core::{CaptionBackend, Error, ImageFrame, Result};

use crate::caption::GenerateTransport;
use crate::error::{CaptionErrorKind, CaptionFailure};
use crate::types::GenerateContentRequest;

type Outcome = std::result::Result<String, CaptionFailure>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Transport that replays queued outcomes in order.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Outcome>>,
    default: Outcome,
    calls: Mutex<Vec<(String, GenerateContentRequest)>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default: Err(CaptionFailure::new(
                CaptionErrorKind::Unknown,
                "script exhausted",
            )),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome returned once the queue is empty.
    pub fn with_default(mut self, outcome: Outcome) -> Self {
        self.default = outcome;
        self
    }

    /// Queue the outcome of the next unanswered call.
    pub fn push(&self, outcome: Outcome) {
        lock(&self.script).push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Model names in call order.
    pub fn models_called(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn last_request(&self) -> Option<GenerateContentRequest> {
        lock(&self.calls).last().map(|(_, r)| r.clone())
    }
}

#[async_trait]
impl GenerateTransport for ScriptedTransport {
    async fn generate(&self, model: &str, request: &GenerateContentRequest) -> Outcome {
        lock(&self.calls).push((model.to_string(), request.clone()));
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// A recorded [`MockCaptionBackend`] call.
#[derive(Debug, Clone)]
pub struct MockCaptionCall {
    pub prompt: String,
    pub image_count: usize,
    pub mime_types: Vec<String>,
}

/// Caption backend returning a fixed response and logging every call.
#[derive(Clone)]
pub struct MockCaptionBackend {
    response: Arc<Mutex<std::result::Result<String, String>>>,
    prompt: String,
    call_log: Arc<Mutex<Vec<MockCaptionCall>>>,
}

impl Default for MockCaptionBackend {
    fn default() -> Self {
        Self {
            response: Arc::new(Mutex::new(Ok("Mock caption".to_string()))),
            prompt: "Mock prompt".to_string(),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockCaptionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        *lock(&self.response) = Ok(response.into());
        self
    }

    /// Fail every call with [`Error::Model`].
    pub fn with_error(self, message: impl Into<String>) -> Self {
        *lock(&self.response) = Err(message.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.call_log).len()
    }

    pub fn calls(&self) -> Vec<MockCaptionCall> {
        lock(&self.call_log).clone()
    }
}

#[async_trait]
impl CaptionBackend for MockCaptionBackend {
    async fn caption(&self, prompt: &str, images: &[ImageFrame]) -> Result<String> {
        lock(&self.call_log).push(MockCaptionCall {
            prompt: prompt.to_string(),
            image_count: images.len(),
            mime_types: images.iter().map(|i| i.mime_type.clone()).collect(),
        });
        lock(&self.response).clone().map_err(Error::Model)
    }

    fn prompt(&self) -> &str {
        &self.prompt
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
