use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;

/// A fixed-window request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRule {
    pub name: &'static str,
    pub max: u32,
    pub window_secs: i64,
    /// Plural noun used in the rejection message.
    pub label: &'static str,
}

pub const AI_PER_MINUTE: RateRule = RateRule {
    name: "ai",
    max: 10,
    window_secs: 60,
    label: "AI requests",
};

pub const ANALYSIS_PER_MINUTE: RateRule = RateRule {
    name: "analysis",
    max: 5,
    window_secs: 60,
    label: "analysis requests",
};

pub const DAILY: RateRule = RateRule {
    name: "daily",
    max: 100,
    window_secs: 24 * 60 * 60,
    label: "daily AI requests",
};

/// Rules applied to the follow-up AI tools.
pub const AI_RULES: &[RateRule] = &[DAILY, AI_PER_MINUTE];
/// Rules applied to skill-gap analysis.
pub const ANALYSIS_RULES: &[RateRule] = &[DAILY, ANALYSIS_PER_MINUTE];

/// A request refused by one of the rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimited {
    pub rule: RateRule,
    /// Seconds until the exhausted window resets, rounded up.
    pub retry_after_secs: u64,
}

impl RateLimited {
    pub fn message(&self) -> String {
        let period = if self.rule.window_secs >= 60 {
            format!("{} minute(s)", (self.rule.window_secs + 59) / 60)
        } else {
            format!("{} seconds", self.rule.window_secs)
        };
        format!(
            "Rate limit exceeded. You can make {} {} per {period}. Please try again later.",
            self.rule.max, self.rule.label
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started_at: DateTime<Utc>,
}

impl Window {
    fn is_open(&self, rule: &RateRule, now: DateTime<Utc>) -> bool {
        now - self.started_at < chrono::Duration::seconds(rule.window_secs)
    }
}

/// Per-user request counters, one fixed window per rule.
pub struct RequestLimiter {
    clock: Arc<dyn Clock>,
    windows: DashMap<Uuid, HashMap<&'static str, Window>>,
}

impl RequestLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            windows: DashMap::new(),
        }
    }

    /// Counts the request against every rule, or refuses it without counting
    /// if any rule's window is already full.
    pub fn admit(&self, user_id: Uuid, rules: &[RateRule]) -> Result<(), RateLimited> {
        let now = self.clock.now();
        let mut windows = self.windows.entry(user_id).or_default();

        for rule in rules {
            if let Some(window) = windows.get(rule.name) {
                if window.is_open(rule, now) && window.count >= rule.max {
                    let resets_at = window.started_at + chrono::Duration::seconds(rule.window_secs);
                    let millis = (resets_at - now).num_milliseconds().max(0) as u64;
                    debug!("User {user_id} hit the {} limit", rule.name);
                    return Err(RateLimited {
                        rule: *rule,
                        retry_after_secs: millis.div_ceil(1000),
                    });
                }
            }
        }

        for rule in rules {
            let window = windows.entry(rule.name).or_insert(Window {
                count: 0,
                started_at: now,
            });
            if !window.is_open(rule, now) {
                *window = Window {
                    count: 0,
                    started_at: now,
                };
            }
            window.count += 1;
        }
        Ok(())
    }

    /// Drops users whose windows have all closed. Returns how many were dropped.
    pub fn prune(&self, rules: &[RateRule]) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, windows| {
            rules.iter().any(|rule| {
                windows
                    .get(rule.name)
                    .is_some_and(|window| window.is_open(rule, now))
            })
        });
        before - self.windows.len()
    }
}

/// Runs `prune` on a fixed interval for the life of the process.
pub fn spawn_prune_task(limiter: Arc<RequestLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let dropped = limiter.prune(&[DAILY, AI_PER_MINUTE, ANALYSIS_PER_MINUTE]);
            if dropped > 0 {
                info!("Pruned rate-limit windows for {dropped} idle users");
            }
        }
    })
}
