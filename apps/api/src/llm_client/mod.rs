/// LLM Client — the single point of entry for all model calls in Storyforge.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// Everything goes through [`GenerationClient`], which owns retry, throttling
/// and cancellation around one [`TextModel`].
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::cancel::CancellationToken;

pub mod gemini;
pub mod retry;
pub mod throttle;

use retry::RetryPolicy;
use throttle::Throttle;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Models accepted by the generate endpoint.
pub const SUPPORTED_MODELS: &[&str] = &[
    "gemini-1.0-pro",
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
    "gemini-1.5-flash-8b-exp",
    "gemini-1.5-flash-exp",
    "gemini-1.5-pro",
    "gemini-1.5-pro-exp",
    "gemini-2.0-flash-exp",
];

pub fn is_supported_model(model: &str) -> bool {
    SUPPORTED_MODELS.contains(&model)
}

/// Failure of a single raw model call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Credential rejected: {0}")]
    Credential(String),

    #[error("Response blocked: {0}")]
    Blocked(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LlmError::Credential(_))
    }
}

/// One prompt in, one text out. No retries at this level.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Binds a model name and an explicit credential into a [`TextModel`].
/// Carried in `AppState` so tests can swap in scripted models.
pub trait ModelConnector: Send + Sync {
    fn connect(&self, model: &str, api_key: &str) -> Arc<dyn TextModel>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    /// The external call failed or returned empty text on every attempt.
    ExternalCall,
    /// The model API rejected the credential.
    Credential,
    /// The run was cancelled before the call could complete.
    Cancelled,
}

/// Terminal failure of [`GenerationClient::generate`].
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub message: String,
    pub attempts: u32,
}

impl GenerationError {
    fn cancelled(attempts: u32) -> Self {
        Self {
            kind: GenerationErrorKind::Cancelled,
            message: "Generation cancelled".to_string(),
            attempts,
        }
    }
}

/// Wraps a [`TextModel`] with bounded retry, throttling and cancellation.
///
/// Empty responses count as failures. After `max_attempts` the last failure is
/// returned as [`GenerationErrorKind::ExternalCall`]; this never panics.
#[derive(Clone)]
pub struct GenerationClient {
    model: Arc<dyn TextModel>,
    retry: RetryPolicy,
    throttle: Arc<dyn Throttle>,
    cancel: CancellationToken,
}

impl GenerationClient {
    pub fn new(model: Arc<dyn TextModel>, retry: RetryPolicy, throttle: Arc<dyn Throttle>) -> Self {
        Self {
            model,
            retry,
            throttle,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error: Option<LlmError> = None;
        let mut attempts = 0;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for_retry(attempt);
                warn!(
                    "LLM call attempt {}/{} failed, retrying after {}ms...",
                    attempt,
                    max_attempts,
                    delay.as_millis()
                );
                if !self.cancel.sleep(delay).await {
                    return Err(GenerationError::cancelled(attempts));
                }
            }

            if self.cancel.is_cancelled() {
                return Err(GenerationError::cancelled(attempts));
            }

            tokio::select! {
                _ = self.throttle.acquire() => {}
                _ = self.cancel.cancelled() => return Err(GenerationError::cancelled(attempts)),
            }

            attempts += 1;
            let result = tokio::select! {
                result = self.model.complete(prompt) => result,
                _ = self.cancel.cancelled() => return Err(GenerationError::cancelled(attempts)),
            };
            if self.cancel.is_cancelled() {
                return Err(GenerationError::cancelled(attempts));
            }

            match result {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => last_error = Some(LlmError::EmptyContent),
                Err(e) if !e.is_retryable() => {
                    return Err(GenerationError {
                        kind: GenerationErrorKind::Credential,
                        message: e.to_string(),
                        attempts,
                    });
                }
                Err(e) => {
                    warn!("LLM call attempt {} failed: {}", attempts, e);
                    last_error = Some(e);
                }
            }
        }

        let last = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(GenerationError {
            kind: GenerationErrorKind::ExternalCall,
            message: format!("Model call failed after {attempts} attempts: {last}"),
            attempts,
        })
    }
}
