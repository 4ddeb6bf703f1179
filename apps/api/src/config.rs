use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::analysis::cache::DEFAULT_RETENTION_DAYS;
use crate::analysis::cooldown::DEFAULT_COOLDOWN_SECS;

/// Gemini models tried in order when `GEMINI_MODELS` is not set.
pub const DEFAULT_MODELS: &[&str] = &["gemini-flash-latest", "gemini-1.5-flash", "gemini-2.0-flash"];

/// Frontend origins allowed when `CORS_ORIGINS` is not set.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:3000"];

/// Where analysis results are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Postgres,
    Redis,
}

impl FromStr for CacheBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(CacheBackend::Postgres),
            "redis" => Ok(CacheBackend::Redis),
            other => bail!("CACHE_BACKEND must be 'postgres' or 'redis', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub gemini_api_key: String,
    pub gemini_models: Vec<String>,
    pub llm_max_attempts: u32,
    pub llm_backoff_step_secs: u64,
    pub cooldown_secs: u64,
    pub cache_ttl_days: u32,
    pub cache_backend: CacheBackend,
    pub redis_url: Option<String>,
    pub github_token: Option<String>,
    pub cors_origins: Vec<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let cache_backend: CacheBackend = optional_env("CACHE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;
        let redis_url = optional_env("REDIS_URL");
        if cache_backend == CacheBackend::Redis && redis_url.is_none() {
            bail!("REDIS_URL is required when CACHE_BACKEND=redis");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_models: optional_env("GEMINI_MODELS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_else(|| DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()),
            llm_max_attempts: parse_env("LLM_MAX_ATTEMPTS", 2)?,
            llm_backoff_step_secs: parse_env("LLM_BACKOFF_STEP_SECS", 5)?,
            cooldown_secs: parse_env("ANALYSIS_COOLDOWN_SECS", DEFAULT_COOLDOWN_SECS)?,
            cache_ttl_days: parse_env("CACHE_TTL_DAYS", DEFAULT_RETENTION_DAYS)?,
            cache_backend,
            redis_url,
            github_token: optional_env("GITHUB_TOKEN"),
            cors_origins: allowed_origins(optional_env("CORS_ORIGINS"), optional_env("CLIENT_URL")),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

/// Splits a comma-separated list, dropping blanks. Order is preserved.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

/// Explicit `CORS_ORIGINS` (or the local defaults), plus `CLIENT_URL` if set.
fn allowed_origins(listed: Option<String>, client_url: Option<String>) -> Vec<String> {
    let mut origins = listed
        .map(|raw| parse_list(&raw))
        .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect());
    if let Some(client_url) = client_url {
        let client_url = client_url.trim().trim_end_matches('/').to_string();
        if !origins.contains(&client_url) {
            origins.push(client_url);
        }
    }
    origins
}
