//! Per-user cooldown for heavyweight analyses.
//!
//! The gate is checked before the cache, so a cache hit does not let a user
//! bypass it. The timestamp only moves after a request fully succeeds.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;

/// Default wait between two heavyweight requests from the same user.
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;

#[async_trait]
pub trait CooldownStore: Send + Sync {
    async fn last_request_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>>;
    async fn record_request(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    Allowed,
    Rejected { remaining_seconds: u64 },
}

/// Read-only view for clients that want to disable their submit button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CooldownStatus {
    pub ready: bool,
    pub remaining_seconds: u64,
    pub cooldown_seconds: u64,
}

/// Seconds left before `last` falls outside `window`, rounded up.
/// `None` when no wait is needed.
pub fn remaining_cooldown(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> Option<u64> {
    let last = last?;
    let elapsed = now - last;
    if elapsed >= window {
        return None;
    }
    // A timestamp in the future (clock skew) never waits longer than one window.
    let remaining = (window - elapsed).min(window);
    let millis = remaining.num_milliseconds().max(0) as u64;
    Some(millis.div_ceil(1000))
}

pub struct CooldownGate {
    store: Arc<dyn CooldownStore>,
    clock: Arc<dyn Clock>,
    window: chrono::Duration,
}

impl CooldownGate {
    pub fn new(store: Arc<dyn CooldownStore>, clock: Arc<dyn Clock>, window_secs: u64) -> Self {
        Self {
            store,
            clock,
            window: chrono::Duration::seconds(window_secs as i64),
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window.num_seconds() as u64
    }

    /// Fails open: if the store cannot be read the request is allowed.
    pub async fn check(&self, user_id: Uuid) -> CooldownDecision {
        match self.remaining(user_id).await {
            Some(remaining_seconds) => CooldownDecision::Rejected { remaining_seconds },
            None => CooldownDecision::Allowed,
        }
    }

    pub async fn status(&self, user_id: Uuid) -> CooldownStatus {
        let remaining = self.remaining(user_id).await;
        CooldownStatus {
            ready: remaining.is_none(),
            remaining_seconds: remaining.unwrap_or(0),
            cooldown_seconds: self.window_secs(),
        }
    }

    /// Marks a successful heavyweight request. A write failure is logged and
    /// swallowed; the request itself already succeeded.
    pub async fn record_success(&self, user_id: Uuid) {
        let now = self.clock.now();
        match self.store.record_request(user_id, now).await {
            Ok(()) => debug!("Cooldown started for user {user_id}"),
            Err(e) => warn!("Failed to record cooldown for user {user_id}: {e:#}"),
        }
    }

    async fn remaining(&self, user_id: Uuid) -> Option<u64> {
        let last = match self.store.last_request_at(user_id).await {
            Ok(last) => last,
            Err(e) => {
                warn!("Cooldown lookup failed for user {user_id}, allowing request: {e:#}");
                return None;
            }
        };
        remaining_cooldown(last, self.clock.now(), self.window)
    }
}

/// Cooldown timestamps in the `analysis_cooldowns` table.
pub struct PgCooldownStore {
    pool: PgPool,
}

impl PgCooldownStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CooldownStore for PgCooldownStore {
    async fn last_request_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        Ok(sqlx::query_scalar(
            "SELECT last_request_at FROM analysis_cooldowns WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn record_request(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analysis_cooldowns (user_id, last_request_at)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET last_request_at = EXCLUDED.last_request_at
            "#,
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
