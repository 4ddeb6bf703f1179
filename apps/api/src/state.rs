use std::sync::Arc;

use crate::analysis::service::AnalysisService;
use crate::rate_limit::RequestLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub analysis: Arc<AnalysisService>,
    pub limits: Arc<RequestLimiter>,
}
