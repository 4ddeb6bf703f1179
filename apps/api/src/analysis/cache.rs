//! Response cache: model results keyed by `(fingerprint, analysis type)`.
//!
//! The cache sits behind `ResponseCache` so the backend (PostgreSQL side
//! table or Redis) can change without touching call sites. Entries live for
//! a fixed retention window; expired entries are never returned.
//!
//! Callers go through `lookup` / `remember`, which fail open: a storage error
//! is logged and treated as a miss.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analysis::models::AnalysisType;
use crate::clock::Clock;

/// How long cached results stay valid.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Live result for the exact `(hash, analysis_type)` pair, if any.
    async fn get(&self, hash: &str, analysis_type: AnalysisType) -> Result<Option<Value>>;

    /// Inserts or overwrites the entry and resets its creation time.
    async fn put(&self, hash: &str, analysis_type: AnalysisType, result: &Value) -> Result<()>;

    /// Physically removes expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64>;
}

/// Entries created at or before this instant are expired.
pub fn expiry_cutoff(now: DateTime<Utc>, retention: chrono::Duration) -> DateTime<Utc> {
    now - retention
}

/// True while `created_at` is inside the retention window.
pub fn is_live(created_at: DateTime<Utc>, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
    created_at > expiry_cutoff(now, retention)
}

pub fn retention_from_days(days: u32) -> chrono::Duration {
    chrono::Duration::days(i64::from(days))
}

/// Fail-open read: storage errors are logged and reported as a miss.
pub async fn lookup(
    cache: &dyn ResponseCache,
    hash: &str,
    analysis_type: AnalysisType,
) -> Option<Value> {
    match cache.get(hash, analysis_type).await {
        Ok(Some(result)) => {
            debug!("Cache hit for {analysis_type} ({hash})");
            Some(result)
        }
        Ok(None) => {
            debug!("Cache miss for {analysis_type} ({hash})");
            None
        }
        Err(e) => {
            warn!("Cache read failed for {analysis_type}, treating as miss: {e:#}");
            None
        }
    }
}

/// Fail-open write: storage errors are logged and otherwise ignored.
pub async fn remember(
    cache: &dyn ResponseCache,
    hash: &str,
    analysis_type: AnalysisType,
    result: &Value,
) {
    if let Err(e) = cache.put(hash, analysis_type, result).await {
        warn!("Cache write failed for {analysis_type}, continuing without caching: {e:#}");
    }
}

/// Runs `purge_expired` on a fixed interval for the life of the process.
pub fn spawn_purge_task(cache: Arc<dyn ResponseCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match cache.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!("Purged {removed} expired cache entries"),
                Err(e) => warn!("Cache purge failed: {e:#}"),
            }
        }
    })
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL backend
// ────────────────────────────────────────────────────────────────────────────

/// Cache rows in the `analysis_cache` table, one per `(hash, analysis_type)`.
/// Timestamps come from the injected clock on both read and write, so the
/// database clock never takes part in expiry.
pub struct PgResponseCache {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
}

impl PgResponseCache {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>, retention_days: u32) -> Self {
        Self {
            pool,
            clock,
            retention: retention_from_days(retention_days),
        }
    }

    fn cutoff(&self) -> DateTime<Utc> {
        expiry_cutoff(self.clock.now(), self.retention)
    }
}

#[async_trait]
impl ResponseCache for PgResponseCache {
    async fn get(&self, hash: &str, analysis_type: AnalysisType) -> Result<Option<Value>> {
        let row: Option<(Value,)> = sqlx::query_as(
            r#"
            SELECT result
            FROM analysis_cache
            WHERE hash = $1 AND analysis_type = $2 AND created_at > $3
            "#,
        )
        .bind(hash)
        .bind(analysis_type.as_str())
        .bind(self.cutoff())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(result,)| result))
    }

    async fn put(&self, hash: &str, analysis_type: AnalysisType, result: &Value) -> Result<()> {
        // Single-statement upsert: concurrent writers for the same key never duplicate.
        sqlx::query(
            r#"
            INSERT INTO analysis_cache (hash, analysis_type, result, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (hash, analysis_type)
            DO UPDATE SET result = EXCLUDED.result, created_at = EXCLUDED.created_at
            "#,
        )
        .bind(hash)
        .bind(analysis_type.as_str())
        .bind(result)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let done = sqlx::query("DELETE FROM analysis_cache WHERE created_at <= $1")
            .bind(self.cutoff())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    result: Value,
    created_at: DateTime<Utc>,
}

impl StoredEntry {
    fn encode(result: &Value, created_at: DateTime<Utc>) -> Result<String> {
        Ok(serde_json::to_string(&StoredEntry {
            result: result.clone(),
            created_at,
        })?)
    }

    /// Parses a stored payload and drops it once it is past retention.
    fn decode_live(raw: &str, now: DateTime<Utc>, retention: chrono::Duration) -> Result<Option<Value>> {
        let stored: StoredEntry =
            serde_json::from_str(raw).context("Corrupt cache entry in Redis")?;
        Ok(is_live(stored.created_at, now, retention).then_some(stored.result))
    }
}

/// Cache entries as Redis strings with a native TTL.
pub struct RedisResponseCache {
    client: redis::Client,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
}

impl RedisResponseCache {
    pub fn new(client: redis::Client, clock: Arc<dyn Clock>, retention_days: u32) -> Self {
        Self {
            client,
            clock,
            retention: retention_from_days(retention_days),
        }
    }

    fn key(hash: &str, analysis_type: AnalysisType) -> String {
        format!("analysis_cache:{}:{}", analysis_type.as_str(), hash)
    }

    fn ttl_secs(&self) -> i64 {
        self.retention.num_seconds().max(1)
    }
}

#[async_trait]
impl ResponseCache for RedisResponseCache {
    async fn get(&self, hash: &str, analysis_type: AnalysisType) -> Result<Option<Value>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(Self::key(hash, analysis_type))
            .query_async(&mut conn)
            .await?;

        match raw {
            // Keys set under a longer retention may outlive the current one.
            Some(raw) => StoredEntry::decode_live(&raw, self.clock.now(), self.retention),
            None => Ok(None),
        }
    }

    async fn put(&self, hash: &str, analysis_type: AnalysisType, result: &Value) -> Result<()> {
        let payload = StoredEntry::encode(result, self.clock.now())?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("SET")
            .arg(Self::key(hash, analysis_type))
            .arg(payload)
            .arg("EX")
            .arg(self.ttl_secs())
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        // Keys expire natively.
        Ok(0)
    }
}
