mod analysis;
mod clock;
mod config;
mod db;
mod errors;
mod github;
mod llm_client;
mod rate_limit;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::cache::{spawn_purge_task, PgResponseCache, RedisResponseCache, ResponseCache};
use crate::analysis::cooldown::{CooldownGate, PgCooldownStore};
use crate::analysis::history::PgAnalysisHistory;
use crate::analysis::service::AnalysisService;
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheBackend, Config};
use crate::db::create_pool;
use crate::github::GithubClient;
use crate::llm_client::gemini::GeminiBackend;
use crate::llm_client::{LlmClient, RetryPolicy};
use crate::rate_limit::{spawn_prune_task, RequestLimiter};
use crate::routes::{build_router, cors_layer};
use crate::state::AppState;

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting UpSkill API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Response cache
    let cache: Arc<dyn ResponseCache> = match (config.cache_backend, &config.redis_url) {
        (CacheBackend::Redis, Some(url)) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Response cache: Redis ({} day retention)", config.cache_ttl_days);
            Arc::new(RedisResponseCache::new(client, clock.clone(), config.cache_ttl_days))
        }
        _ => {
            info!("Response cache: PostgreSQL ({} day retention)", config.cache_ttl_days);
            Arc::new(PgResponseCache::new(db.clone(), clock.clone(), config.cache_ttl_days))
        }
    };
    spawn_purge_task(cache.clone(), CACHE_PURGE_INTERVAL);

    // Initialize LLM client
    let backend = Arc::new(GeminiBackend::new(config.gemini_api_key.clone())?);
    let retry = RetryPolicy {
        max_attempts: config.llm_max_attempts,
        backoff_step: Duration::from_secs(config.llm_backoff_step_secs),
    };
    let llm = LlmClient::new(backend, config.gemini_models.clone(), retry)?;
    info!("LLM client initialized (models: {})", llm.models().join(", "));

    let cooldown = CooldownGate::new(
        Arc::new(PgCooldownStore::new(db.clone())),
        clock.clone(),
        config.cooldown_secs,
    );
    info!("Analysis cooldown: {}s", cooldown.window_secs());

    let analysis = AnalysisService::new(
        llm,
        cache,
        cooldown,
        Arc::new(PgAnalysisHistory::new(db)),
        Arc::new(GithubClient::new(config.github_token.clone())?),
    );

    let limits = Arc::new(RequestLimiter::new(clock));
    spawn_prune_task(limits.clone(), RATE_LIMIT_PRUNE_INTERVAL);

    let state = AppState {
        analysis: Arc::new(analysis),
        limits,
    };

    info!("CORS origins: {}", config.cors_origins.join(", "));
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins)?);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
