pub mod health;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Skill gap analysis (cooldown-gated)
        .route("/api/v1/analysis/analyze", post(handlers::handle_analyze))
        .route(
            "/api/v1/analysis/cooldown",
            get(handlers::handle_cooldown_status),
        )
        // Follow-up AI tools
        .route(
            "/api/v1/ai/rewrite-resume",
            post(handlers::handle_rewrite_resume),
        )
        .route(
            "/api/v1/ai/project-suggestions",
            post(handlers::handle_project_suggestions),
        )
        .route(
            "/api/v1/ai/role-suggestions",
            post(handlers::handle_role_suggestions),
        )
        .route(
            "/api/v1/ai/github-analysis",
            post(handlers::handle_github_analysis),
        )
        // History
        .route(
            "/api/v1/history",
            get(handlers::handle_list_history).delete(handlers::handle_clear_history),
        )
        .route(
            "/api/v1/history/:id",
            get(handlers::handle_get_history).delete(handlers::handle_delete_history),
        )
        .route(
            "/api/v1/history/:id/roadmap/:index",
            patch(handlers::handle_update_roadmap_status),
        )
        .with_state(state)
}

/// CORS restricted to the configured frontend origins. Requests without an
/// `Origin` header (curl, server-to-server) are unaffected.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin '{origin}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}
