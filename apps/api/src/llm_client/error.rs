use thiserror::Error;

/// Failure of a single provider call, classified at the adapter boundary.
/// The fallback loop switches on these variants, never on message text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// Credentials rejected. Not model-specific.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The model has zero quota left for this key.
    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Temporary throttling; the same model may succeed after a wait.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Model not available: {0}")]
    ModelNotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    /// The payload could not be parsed into the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// What the fallback loop does after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Stop everything; no model can succeed.
    Abort,
    /// Wait and retry the same model if attempts remain.
    Backoff,
    /// Give up on this model and move to the next one.
    NextModel,
}

impl ProviderError {
    pub fn recovery(&self) -> Recovery {
        match self {
            ProviderError::Authentication(_) => Recovery::Abort,
            ProviderError::RateLimited(_) => Recovery::Backoff,
            ProviderError::QuotaExhausted(_)
            | ProviderError::ModelNotFound(_)
            | ProviderError::Network(_)
            | ProviderError::Upstream { .. }
            | ProviderError::MalformedResponse(_) => Recovery::NextModel,
        }
    }
}

/// Outcome of a whole fallback invocation, as seen by callers.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Missing or invalid credentials / settings. Retrying cannot help.
    #[error("LLM configuration error: {0}")]
    Configuration(String),

    /// Every model was tried and none produced a usable result.
    #[error("All models failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: ProviderError },
}
