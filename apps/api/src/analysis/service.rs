//! Orchestration for every analysis endpoint.
//!
//! Flow per request: cooldown gate (skill gap only) → fingerprint → cache
//! lookup → model call on a miss → cache upsert. The cooldown timestamp moves
//! only after the whole skill-gap request, history insert included, succeeds.

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::cache::{self, ResponseCache};
use crate::analysis::cooldown::{CooldownDecision, CooldownGate, CooldownStatus};
use crate::analysis::fingerprint::{self, fingerprint, truncate_chars};
use crate::analysis::history::{AnalysisHistory, AnalysisRecord};
use crate::analysis::models::{
    AnalysisType, GithubReport, ProjectSuggestions, RewrittenResume, RoadmapItem,
    RoadmapProgress, RoadmapStatus, RoleSuggestions, SkillGapReport,
};
use crate::analysis::prompts::{
    ANALYST_PERSONA, GITHUB_PROMPT_TEMPLATE, PROJECT_PROMPT_TEMPLATE, REWRITE_PROMPT_TEMPLATE,
    ROLE_PROMPT_TEMPLATE, SKILL_GAP_PROMPT_TEMPLATE,
};
use crate::errors::AppError;
use crate::github::ProfileSource;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_FABRICATION_INSTRUCTION};
use crate::llm_client::{LlmClient, Normalize};

/// Resume characters included in the role suggestion prompt.
const ROLE_PROMPT_RESUME_CHARS: usize = 3_000;

/// A result and whether it came from the response cache.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    pub value: T,
    pub from_cache: bool,
}

/// Outcome of a cooldown-gated request.
#[derive(Debug, Clone)]
pub enum Gated<T> {
    CoolingDown { remaining_seconds: u64 },
    Done(T),
}

/// A roadmap item after a status change, with the report's new progress.
#[derive(Debug, Clone, Serialize)]
pub struct RoadmapUpdate {
    pub updated_item: RoadmapItem,
    pub progress: RoadmapProgress,
}

pub struct AnalysisService {
    llm: LlmClient,
    cache: Arc<dyn ResponseCache>,
    cooldown: CooldownGate,
    history: Arc<dyn AnalysisHistory>,
    profiles: Arc<dyn ProfileSource>,
    system: String,
}

impl AnalysisService {
    pub fn new(
        llm: LlmClient,
        cache: Arc<dyn ResponseCache>,
        cooldown: CooldownGate,
        history: Arc<dyn AnalysisHistory>,
        profiles: Arc<dyn ProfileSource>,
    ) -> Self {
        Self {
            llm,
            cache,
            cooldown,
            history,
            profiles,
            system: format!("{ANALYST_PERSONA} {JSON_ONLY_SYSTEM}"),
        }
    }

    /// Skill-gap analysis. The only heavyweight, cooldown-gated operation.
    pub async fn analyze_skill_gap(
        &self,
        user_id: Uuid,
        resume_text: &str,
        job_description: &str,
    ) -> Result<Gated<Cached<AnalysisRecord>>, AppError> {
        if let CooldownDecision::Rejected { remaining_seconds } = self.cooldown.check(user_id).await
        {
            info!("User {user_id} is cooling down ({remaining_seconds}s left)");
            return Ok(Gated::CoolingDown { remaining_seconds });
        }

        let hash = fingerprint(&fingerprint::resume_job_input(resume_text, job_description));
        let report: Cached<SkillGapReport> = self
            .cached_or_compute(AnalysisType::SkillGap, &hash, || async move {
                let prompt = render(
                    SKILL_GAP_PROMPT_TEMPLATE,
                    &[
                        ("{resume_text}", resume_text),
                        ("{job_description}", job_description),
                    ],
                );
                Ok::<_, AppError>(self.llm.call_json(&prompt, &self.system).await?)
            })
            .await?;

        let record = AnalysisRecord::new(user_id, resume_text, job_description, &report.value)?;
        self.history.insert(&record).await?;
        self.cooldown.record_success(user_id).await;

        Ok(Gated::Done(Cached {
            value: record,
            from_cache: report.from_cache,
        }))
    }

    pub async fn rewrite_resume(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<Cached<RewrittenResume>, AppError> {
        let hash = fingerprint(&fingerprint::resume_job_input(resume_text, job_description));
        self.cached_or_compute(AnalysisType::ResumeRewrite, &hash, || async move {
            let prompt = render(
                REWRITE_PROMPT_TEMPLATE,
                &[
                    ("{resume_text}", resume_text.trim()),
                    ("{job_description}", job_description.trim()),
                ],
            );
            Ok::<_, AppError>(self.llm.call_json(&prompt, &self.system).await?)
        })
        .await
    }

    pub async fn suggest_projects(
        &self,
        missing_skills: &[String],
        job_title: &str,
    ) -> Result<Cached<ProjectSuggestions>, AppError> {
        let hash = fingerprint(&fingerprint::skills_title_input(missing_skills, job_title));
        self.cached_or_compute(AnalysisType::ProjectSuggestions, &hash, || async move {
            info!("Generating project suggestions for: {}", missing_skills.join(", "));
            let prompt = render(
                PROJECT_PROMPT_TEMPLATE,
                &[
                    ("{skills}", missing_skills.join(", ").as_str()),
                    ("{job_title}", job_title.trim()),
                ],
            );
            Ok::<_, AppError>(self.llm.call_json(&prompt, &self.system).await?)
        })
        .await
    }

    pub async fn suggest_roles(
        &self,
        resume_text: &str,
        matched_skills: &[String],
        job_title: &str,
    ) -> Result<Cached<RoleSuggestions>, AppError> {
        let hash = fingerprint(&fingerprint::role_input(matched_skills, job_title, resume_text));
        self.cached_or_compute(AnalysisType::RoleSuggestions, &hash, || async move {
            let skills = if matched_skills.is_empty() {
                "None identified".to_string()
            } else {
                matched_skills.join(", ")
            };
            let prompt = render(
                ROLE_PROMPT_TEMPLATE,
                &[
                    (
                        "{resume_text}",
                        truncate_chars(resume_text.trim(), ROLE_PROMPT_RESUME_CHARS),
                    ),
                    ("{skills}", skills.as_str()),
                    ("{job_title}", job_title.trim()),
                ],
            );
            Ok::<_, AppError>(self.llm.call_json(&prompt, &self.system).await?)
        })
        .await
    }

    /// The profile is only fetched from GitHub on a cache miss.
    pub async fn analyze_github(
        &self,
        username: &str,
        target_role: &str,
    ) -> Result<Cached<GithubReport>, AppError> {
        let hash = fingerprint(&fingerprint::github_input(username, target_role));
        self.cached_or_compute(AnalysisType::GithubProfile, &hash, || async move {
            info!("Analyzing GitHub profile {username} for {target_role}");
            let profile = self.profiles.fetch_profile(username.trim()).await?;
            let summary = serde_json::to_string_pretty(&profile)
                .map_err(|e| AppError::Internal(e.into()))?;
            let prompt = render(
                GITHUB_PROMPT_TEMPLATE,
                &[
                    ("{target_role}", target_role.trim()),
                    ("{profile}", summary.as_str()),
                ],
            );
            let analysis = self.llm.call_json(&prompt, &self.system).await?;
            Ok::<_, AppError>(GithubReport { profile, analysis })
        })
        .await
    }

    pub async fn cooldown_status(&self, user_id: Uuid) -> CooldownStatus {
        self.cooldown.status(user_id).await
    }

    pub async fn list_history(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>, AppError> {
        Ok(self.history.list(user_id).await?)
    }

    pub async fn get_history(&self, user_id: Uuid, id: Uuid) -> Result<AnalysisRecord, AppError> {
        self.history
            .get(user_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Analysis {id} not found")))
    }

    pub async fn delete_history(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        if self.history.delete(user_id, id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Analysis {id} not found")))
        }
    }

    /// Sets the status of one roadmap item in a stored analysis.
    pub async fn update_roadmap_status(
        &self,
        user_id: Uuid,
        id: Uuid,
        index: usize,
        status: RoadmapStatus,
    ) -> Result<RoadmapUpdate, AppError> {
        let record = self.get_history(user_id, id).await?;
        let mut report: SkillGapReport =
            serde_json::from_value(record.report).map_err(|e| AppError::Internal(e.into()))?;

        let item = report
            .learning_roadmap
            .get_mut(index)
            .ok_or_else(|| AppError::Validation("Invalid roadmap item index".to_string()))?;
        item.status = status;
        let updated_item = item.clone();

        let stored = serde_json::to_value(&report).map_err(|e| AppError::Internal(e.into()))?;
        if !self.history.update_report(user_id, id, &stored).await? {
            return Err(AppError::NotFound(format!("Analysis {id} not found")));
        }

        let progress = report.roadmap_progress();
        info!(
            "Roadmap item {index} of analysis {id} set to {} ({}/{} done)",
            status.as_str(),
            progress.completed,
            progress.total
        );
        Ok(RoadmapUpdate {
            updated_item,
            progress,
        })
    }

    pub async fn clear_history(&self, user_id: Uuid) -> Result<u64, AppError> {
        let removed = self.history.delete_all(user_id).await?;
        info!("Cleared {removed} analyses for user {user_id}");
        Ok(removed)
    }

    /// Returns the cached result for `(hash, analysis_type)` or runs `compute`
    /// and caches what it produced. Cache failures never fail the request.
    async fn cached_or_compute<T, F, Fut>(
        &self,
        analysis_type: AnalysisType,
        hash: &str,
        compute: F,
    ) -> Result<Cached<T>, AppError>
    where
        T: DeserializeOwned + Serialize + Normalize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(stored) = cache::lookup(self.cache.as_ref(), hash, analysis_type).await {
            match serde_json::from_value::<T>(stored) {
                Ok(value) => {
                    info!("Cache hit for {analysis_type}");
                    return Ok(Cached {
                        value: value.normalize(),
                        from_cache: true,
                    });
                }
                Err(e) => warn!("Unreadable {analysis_type} cache entry, recomputing: {e}"),
            }
        }

        let value = compute().await?;
        match serde_json::to_value(&value) {
            Ok(json) => cache::remember(self.cache.as_ref(), hash, analysis_type, &json).await,
            Err(e) => warn!("Could not serialize {analysis_type} result for caching: {e}"),
        }
        Ok(Cached {
            value,
            from_cache: false,
        })
    }
}

/// Fills template placeholders and appends the shared no-fabrication rule.
/// Substitution is a single pass over the template, so placeholder text
/// inside a substituted value is left as-is.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut prompt = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        prompt.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                prompt.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                prompt.push('{');
                rest = &tail[1..];
            }
        }
    }
    prompt.push_str(rest);
    prompt.push_str("\n\n");
    prompt.push_str(NO_FABRICATION_INSTRUCTION);
    prompt
}
