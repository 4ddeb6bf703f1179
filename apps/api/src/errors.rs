use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::github::GithubError;
use crate::llm_client::LlmError;
use crate::rate_limit::RateLimited;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Every model failed. Provider details are logged, never returned.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Bad credentials or settings. The message is returned verbatim.
    #[error("{0}")]
    LlmConfiguration(String),

    /// A per-user request budget is spent.
    #[error("{}", .0.message())]
    RateLimited(RateLimited),

    #[error("{0}")]
    UpstreamRateLimited(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Configuration(_) => AppError::LlmConfiguration(err.to_string()),
            LlmError::Exhausted { .. } => AppError::Llm(err.to_string()),
        }
    }
}

impl From<GithubError> for AppError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::NotFound => AppError::NotFound(err.to_string()),
            GithubError::RateLimited => AppError::UpstreamRateLimited(err.to_string()),
            GithubError::Http(_) => AppError::Upstream(err.to_string()),
        }
    }
}

impl From<RateLimited> for AppError {
    fn from(err: RateLimited) -> Self {
        AppError::RateLimited(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::RateLimited(limited) = &self {
            let retry_after = limited.retry_after_secs;
            let body = Json(json!({
                "success": false,
                "message": limited.message(),
                "retryAfter": retry_after
            }));
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after.to_string())],
                body,
            )
                .into_response();
        }

        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::LlmConfiguration(msg) => {
                tracing::error!("LLM configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_CONFIGURATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::RateLimited(limited) => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                limited.message(),
            ),
            AppError::UpstreamRateLimited(msg) => (
                StatusCode::TOO_MANY_REQUESTS,
                "UPSTREAM_RATE_LIMITED",
                msg.clone(),
            ),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
