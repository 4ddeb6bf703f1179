/// LLM client: the single point of entry for all model calls in UpSkill.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All model interactions MUST go through `LlmClient`, which walks the
/// configured model list in preference order with bounded retries.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

pub mod error;
pub mod gemini;
pub mod prompts;

pub use error::{LlmError, ProviderError, Recovery};

/// A provider that can run one prompt against one named model.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str, system: &str)
        -> Result<String, ProviderError>;
}

/// Applies safe defaults to a freshly parsed model payload.
/// Every result type handed to callers goes through this.
pub trait Normalize {
    fn normalize(self) -> Self;
}

/// Per-model retry settings.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per model, including the first.
    pub max_attempts: u32,
    /// Backoff after attempt `n` is `n * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_step: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// The single LLM client used by all services in UpSkill.
/// Cheap to clone; the backend is shared.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn ModelBackend>,
    models: Arc<[String]>,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        models: Vec<String>,
        retry: RetryPolicy,
    ) -> Result<Self, LlmError> {
        if models.is_empty() {
            return Err(LlmError::Configuration(
                "at least one model must be configured".to_string(),
            ));
        }
        if retry.max_attempts == 0 {
            return Err(LlmError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            backend,
            models: models.into(),
            retry,
        })
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Runs the prompt through the model list and deserializes the first
    /// usable response as `T`, normalized.
    ///
    /// Per failed attempt:
    /// - auth error → abort with `LlmError::Configuration`
    /// - rate limit → sleep `attempt * backoff_step`, retry same model while attempts remain
    /// - anything else (zero quota, unknown model, bad payload, network) → next model
    ///
    /// When the list is exhausted the most recent provider error is returned
    /// inside `LlmError::Exhausted`.
    pub async fn call_json<T>(&self, prompt: &str, system: &str) -> Result<T, LlmError>
    where
        T: DeserializeOwned + Normalize,
    {
        let max_attempts = self.retry.max_attempts;
        let mut attempts = 0;
        let mut last_error: Option<ProviderError> = None;

        for model in self.models.iter() {
            for attempt in 1..=max_attempts {
                attempts += 1;
                info!("Sending request to {model} (attempt {attempt}/{max_attempts})");

                let outcome = match self.backend.generate(model, prompt, system).await {
                    Ok(text) => parse_payload::<T>(&text),
                    Err(e) => Err(e),
                };

                let error = match outcome {
                    Ok(value) => {
                        info!("Received usable response from {model}");
                        return Ok(value.normalize());
                    }
                    Err(e) => e,
                };

                warn!("{model} attempt {attempt} failed: {error}");

                match error.recovery() {
                    Recovery::Abort => return Err(LlmError::Configuration(error.to_string())),
                    Recovery::Backoff if attempt < max_attempts => {
                        let delay = self.retry.backoff_for(attempt);
                        warn!("Rate limited on {model}, retrying in {}s", delay.as_secs());
                        last_error = Some(error);
                        tokio::time::sleep(delay).await;
                    }
                    Recovery::Backoff | Recovery::NextModel => {
                        last_error = Some(error);
                        break;
                    }
                }
            }
        }

        warn!("All {} models failed", self.models.len());
        let last = last_error.unwrap_or_else(|| {
            ProviderError::ModelNotFound("no model produced a response".to_string())
        });
        Err(LlmError::Exhausted { attempts, last })
    }
}

fn parse_payload<T: DeserializeOwned>(text: &str) -> Result<T, ProviderError> {
    serde_json::from_str(strip_json_fences(text))
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
