//! In-memory doubles for the storage, clock and provider seams.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::analysis::cache::{is_live, retention_from_days, ResponseCache};
use crate::analysis::cooldown::{CooldownGate, CooldownStore, DEFAULT_COOLDOWN_SECS};
use crate::analysis::history::{AnalysisHistory, AnalysisRecord};
use crate::analysis::models::AnalysisType;
use crate::analysis::service::AnalysisService;
use crate::clock::Clock;
use crate::github::{GithubError, GithubProfile, ProfileSource};
use crate::llm_client::{LlmClient, ModelBackend, ProviderError, RetryPolicy};
use crate::rate_limit::RequestLimiter;
use crate::state::AppState;

// ── Clock ───────────────────────────────────────────────────────────────────

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for FixedClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
        }
    }
}

impl FixedClock {
    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        FixedClock::now(self)
    }
}

// ── Response cache ──────────────────────────────────────────────────────────

pub struct MemoryCache {
    clock: Arc<FixedClock>,
    retention: chrono::Duration,
    entries: Mutex<HashMap<(String, AnalysisType), (Value, DateTime<Utc>)>>,
    failing: Mutex<bool>,
}

impl MemoryCache {
    pub fn new(clock: Arc<FixedClock>, retention_days: u32) -> Self {
        Self {
            clock,
            retention: retention_from_days(retention_days),
            entries: Mutex::new(HashMap::new()),
            failing: Mutex::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    fn check(&self) -> Result<()> {
        if *self.failing.lock().unwrap() {
            Err(anyhow!("cache unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, hash: &str, analysis_type: AnalysisType) -> Result<Option<Value>> {
        self.check()?;
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(&(hash.to_string(), analysis_type))
            .filter(|(_, created_at)| is_live(*created_at, now, self.retention))
            .map(|(result, _)| result.clone()))
    }

    async fn put(&self, hash: &str, analysis_type: AnalysisType, result: &Value) -> Result<()> {
        self.check()?;
        let now = self.clock.now();
        self.entries
            .lock()
            .unwrap()
            .insert((hash.to_string(), analysis_type), (result.clone(), now));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        self.check()?;
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, (_, created_at)| is_live(*created_at, now, self.retention));
        Ok((before - entries.len()) as u64)
    }
}

// ── Cooldown store ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCooldownStore {
    last: Mutex<HashMap<Uuid, DateTime<Utc>>>,
    writes: Mutex<usize>,
    failing: Mutex<bool>,
}

impl MemoryCooldownStore {
    /// Seeds a timestamp without counting it as a write.
    pub fn set(&self, user_id: Uuid, at: DateTime<Utc>) {
        self.last.lock().unwrap().insert(user_id, at);
    }

    pub fn get(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.last.lock().unwrap().get(&user_id).copied()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl CooldownStore for MemoryCooldownStore {
    async fn last_request_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        if *self.failing.lock().unwrap() {
            return Err(anyhow!("cooldown store unavailable"));
        }
        Ok(self.get(user_id))
    }

    async fn record_request(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if *self.failing.lock().unwrap() {
            return Err(anyhow!("cooldown store unavailable"));
        }
        self.set(user_id, at);
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }
}

// ── History ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<AnalysisRecord>>,
}

impl MemoryHistory {
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalysisHistory for MemoryHistory {
    async fn insert(&self, record: &AnalysisRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>> {
        let mut records: Vec<AnalysisRecord> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<AnalysisRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id && r.user_id == user_id)
            .cloned())
    }

    async fn update_report(&self, user_id: Uuid, id: Uuid, report: &Value) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == id && r.user_id == user_id) {
            Some(record) => {
                record.report = report.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| !(r.id == id && r.user_id == user_id));
        Ok(records.len() < before)
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<u64> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.user_id != user_id);
        Ok((before - records.len()) as u64)
    }
}

// ── Model backend ───────────────────────────────────────────────────────────

/// Replays queued responses per model and records every call in order.
/// A model with nothing queued answers `ModelNotFound`.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Result<String, ProviderError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn script(&self, model: &str, responses: Vec<Result<String, ProviderError>>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .extend(responses);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(
        &self,
        model: &str,
        _prompt: &str,
        _system: &str,
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(model.to_string());
        self.scripts
            .lock()
            .unwrap()
            .get_mut(model)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ProviderError::ModelNotFound(model.to_string())))
    }
}

// ── GitHub ──────────────────────────────────────────────────────────────────

pub fn github_profile(username: &str) -> GithubProfile {
    GithubProfile {
        username: username.to_string(),
        name: username.to_string(),
        bio: String::new(),
        public_repos: 3,
        followers: 12,
        following: 1,
        created_at: None,
        primary_languages: vec!["Rust".to_string()],
        total_stars: 9,
        top_repos: vec![],
        recent_activity: 2,
        recent_repo_names: vec![],
    }
}

pub struct StaticProfileSource {
    response: Mutex<Result<GithubProfile, GithubError>>,
    fetches: Mutex<usize>,
}

impl StaticProfileSource {
    pub fn new(response: Result<GithubProfile, GithubError>) -> Self {
        Self {
            response: Mutex::new(response),
            fetches: Mutex::new(0),
        }
    }

    pub fn set(&self, response: Result<GithubProfile, GithubError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl ProfileSource for StaticProfileSource {
    async fn fetch_profile(&self, _username: &str) -> Result<GithubProfile, GithubError> {
        *self.fetches.lock().unwrap() += 1;
        self.response.lock().unwrap().clone()
    }
}

// ── Wiring ──────────────────────────────────────────────────────────────────

/// An `AnalysisService` over in-memory doubles, with handles to each double.
pub struct Harness {
    pub backend: Arc<ScriptedBackend>,
    pub cache: Arc<MemoryCache>,
    pub cooldowns: Arc<MemoryCooldownStore>,
    pub history: Arc<MemoryHistory>,
    pub profiles: Arc<StaticProfileSource>,
    pub clock: Arc<FixedClock>,
    pub service: Arc<AnalysisService>,
    pub limits: Arc<RequestLimiter>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::default());
        let backend = Arc::new(ScriptedBackend::default());
        let cache = Arc::new(MemoryCache::new(clock.clone(), 7));
        let cooldowns = Arc::new(MemoryCooldownStore::default());
        let history = Arc::new(MemoryHistory::default());
        let profiles = Arc::new(StaticProfileSource::new(Ok(github_profile("octo"))));

        let llm = LlmClient::new(
            backend.clone(),
            vec!["model-a".to_string()],
            RetryPolicy::default(),
        )
        .unwrap();
        let gate = CooldownGate::new(cooldowns.clone(), clock.clone(), DEFAULT_COOLDOWN_SECS);
        let service = Arc::new(AnalysisService::new(
            llm,
            cache.clone(),
            gate,
            history.clone(),
            profiles.clone(),
        ));

        let limits = Arc::new(RequestLimiter::new(clock.clone()));

        Self {
            backend,
            cache,
            cooldowns,
            history,
            profiles,
            clock,
            service,
            limits,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            analysis: self.service.clone(),
            limits: self.limits.clone(),
        }
    }
}
