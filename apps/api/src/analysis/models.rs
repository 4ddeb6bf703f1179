//! Result types produced by the model calls.
//!
//! These mirror the JSON contract given to the model (camelCase). Every
//! container derives `Default` and is `#[serde(default)]`, and collection and
//! text fields go through `null_as_default`, so omitted or `null` fields come
//! back empty; `Normalize` then clamps scores and fills blank labels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::github::GithubProfile;
use crate::llm_client::Normalize;

/// The kinds of analysis whose results are cached. Part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    SkillGap,
    ResumeRewrite,
    ProjectSuggestions,
    RoleSuggestions,
    GithubProfile,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::SkillGap => "skill_gap",
            AnalysisType::ResumeRewrite => "resume_rewrite",
            AnalysisType::ProjectSuggestions => "project_suggestions",
            AnalysisType::RoleSuggestions => "role_suggestions",
            AnalysisType::GithubProfile => "github_profile",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treats an explicit `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Clamps a score into [0, 100]. NaN becomes 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// Accepts a number or `null`; `null` becomes 0.
fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// Accepts an integer, a float (rounded) or `null` (default 7).
fn lenient_days<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let days = Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_ESTIMATED_DAYS as f64);
    Ok(days.max(0.0).round() as u32)
}

const DEFAULT_ESTIMATED_DAYS: u32 = 7;

fn default_days() -> u32 {
    DEFAULT_ESTIMATED_DAYS
}

fn fill_blank(value: &mut String, fallback: &str) {
    if value.trim().is_empty() {
        *value = fallback.to_string();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Skill gap
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillGapReport {
    #[serde(deserialize_with = "null_as_default")]
    pub job_title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub matched_skills: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub missing_skills: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub extra_skills: Vec<String>,
    #[serde(deserialize_with = "lenient_score")]
    pub match_score: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub learning_roadmap: Vec<RoadmapItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoadmapItem {
    #[serde(deserialize_with = "null_as_default")]
    pub skill: String,
    #[serde(deserialize_with = "null_as_default")]
    pub level: String,
    #[serde(deserialize_with = "lenient_days")]
    pub estimated_days: u32,
    pub resource_url: Option<String>,
    pub resource_name: Option<String>,
    #[serde(deserialize_with = "lenient_status")]
    pub status: RoadmapStatus,
}

impl Default for RoadmapItem {
    fn default() -> Self {
        Self {
            skill: String::new(),
            level: "Beginner".to_string(),
            estimated_days: default_days(),
            resource_url: None,
            resource_name: None,
            status: RoadmapStatus::Todo,
        }
    }
}

/// Progress marker the user sets on a roadmap item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoadmapStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl RoadmapStatus {
    pub const ALL: [RoadmapStatus; 3] = [
        RoadmapStatus::Todo,
        RoadmapStatus::InProgress,
        RoadmapStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoadmapStatus::Todo => "todo",
            RoadmapStatus::InProgress => "in-progress",
            RoadmapStatus::Done => "done",
        }
    }
}

impl FromStr for RoadmapStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoadmapStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = RoadmapStatus::ALL.iter().map(|s| s.as_str()).collect();
                format!("Invalid status. Must be one of: {}", valid.join(", "))
            })
    }
}

/// Unknown or missing statuses from stored reports read as `todo`.
fn lenient_status<'de, D>(deserializer: D) -> Result<RoadmapStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default())
}

/// Completion summary over a report's roadmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoadmapProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u32,
}

impl SkillGapReport {
    pub fn roadmap_progress(&self) -> RoadmapProgress {
        let total = self.learning_roadmap.len();
        let completed = self
            .learning_roadmap
            .iter()
            .filter(|item| item.status == RoadmapStatus::Done)
            .count();
        let percent = if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u32
        };
        RoadmapProgress {
            completed,
            total,
            percent,
        }
    }
}

impl Normalize for SkillGapReport {
    fn normalize(mut self) -> Self {
        fill_blank(&mut self.job_title, "Position");
        self.match_score = clamp_score(self.match_score);
        self.learning_roadmap.retain(|item| !item.skill.trim().is_empty());
        for item in &mut self.learning_roadmap {
            if !matches!(item.level.as_str(), "Beginner" | "Intermediate" | "Advanced") {
                item.level = "Beginner".to_string();
            }
        }
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Resume rewrite
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewrittenResume {
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub experience: Vec<RewrittenExperience>,
    #[serde(deserialize_with = "null_as_default")]
    pub projects: Vec<RewrittenProject>,
    #[serde(deserialize_with = "null_as_default")]
    pub education: Vec<RewrittenEducation>,
    #[serde(deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewrittenExperience {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(deserialize_with = "null_as_default")]
    pub duration: String,
    #[serde(deserialize_with = "null_as_default")]
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewrittenProject {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewrittenEducation {
    #[serde(deserialize_with = "null_as_default")]
    pub degree: String,
    #[serde(deserialize_with = "null_as_default")]
    pub institution: String,
    #[serde(deserialize_with = "null_as_default")]
    pub year: String,
}

impl Normalize for RewrittenResume {
    fn normalize(mut self) -> Self {
        self.summary = self.summary.trim().to_string();
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Project suggestions
// ────────────────────────────────────────────────────────────────────────────

/// Envelope the model returns: `{"projects": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSuggestions {
    #[serde(deserialize_with = "null_as_default")]
    pub projects: Vec<ProjectSuggestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectSuggestion {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tech_stack: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub learning_outcomes: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub difficulty: String,
    #[serde(deserialize_with = "lenient_days")]
    pub estimated_days: u32,
}

impl Default for ProjectSuggestion {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            tech_stack: Vec::new(),
            learning_outcomes: Vec::new(),
            difficulty: "Intermediate".to_string(),
            estimated_days: default_days(),
        }
    }
}

impl Normalize for ProjectSuggestions {
    fn normalize(mut self) -> Self {
        self.projects.retain(|p| !p.title.trim().is_empty());
        for project in &mut self.projects {
            fill_blank(&mut project.difficulty, "Intermediate");
        }
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Role suggestions
// ────────────────────────────────────────────────────────────────────────────

/// Envelope the model returns: `{"roles": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleSuggestions {
    #[serde(deserialize_with = "null_as_default")]
    pub roles: Vec<RoleSuggestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoleSuggestion {
    #[serde(deserialize_with = "null_as_default")]
    pub role_name: String,
    #[serde(deserialize_with = "lenient_score")]
    pub match_percentage: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub fit_rationale: String,
    #[serde(deserialize_with = "null_as_default")]
    pub skills_to_add: Vec<String>,
}

impl Normalize for RoleSuggestions {
    fn normalize(mut self) -> Self {
        self.roles.retain(|r| !r.role_name.trim().is_empty());
        for role in &mut self.roles {
            role.match_percentage = clamp_score(role.match_percentage);
        }
        self.roles
            .sort_by(|a, b| b.match_percentage.total_cmp(&a.match_percentage));
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GitHub profile analysis
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GithubAnalysis {
    #[serde(deserialize_with = "lenient_score")]
    pub overall_score: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub strengths: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub gaps: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub project_suggestions: Vec<GithubProjectIdea>,
    #[serde(deserialize_with = "null_as_default")]
    pub repo_improvements: Vec<RepoImprovement>,
    #[serde(deserialize_with = "null_as_default")]
    pub action_items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GithubProjectIdea {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepoImprovement {
    #[serde(deserialize_with = "null_as_default")]
    pub repo_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub suggestion: String,
}

impl Normalize for GithubAnalysis {
    fn normalize(mut self) -> Self {
        self.overall_score = clamp_score(self.overall_score);
        self
    }
}

/// What gets cached for a GitHub analysis: the fetched profile plus the
/// model's assessment of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubReport {
    pub profile: GithubProfile,
    pub analysis: GithubAnalysis,
}

impl Normalize for GithubReport {
    fn normalize(mut self) -> Self {
        self.analysis = self.analysis.normalize();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: serde::de::DeserializeOwned + Normalize>(raw: &str) -> T {
        serde_json::from_str::<T>(raw).unwrap().normalize()
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let report: SkillGapReport = parse(r#"{"jobTitle": "Data Engineer", "matchedSkills": ["SQL"]}"#);
        assert_eq!(report.job_title, "Data Engineer");
        assert_eq!(report.matched_skills, vec!["SQL"]);
        assert!(report.missing_skills.is_empty());
        assert!(report.extra_skills.is_empty());
        assert!(report.learning_roadmap.is_empty());
        assert_eq!(report.match_score, 0.0);
    }

    #[test]
    fn test_null_score_becomes_zero() {
        let report: SkillGapReport = parse(r#"{"matchScore": null, "missingSkills": null}"#);
        assert_eq!(report.match_score, 0.0);
        assert!(report.missing_skills.is_empty());
        assert_eq!(report.job_title, "Position");
    }

    #[test]
    fn test_score_is_clamped() {
        let high: SkillGapReport = parse(r#"{"matchScore": 180.5}"#);
        let low: SkillGapReport = parse(r#"{"matchScore": -12}"#);
        assert_eq!(high.match_score, 100.0);
        assert_eq!(low.match_score, 0.0);
    }

    #[test]
    fn test_roadmap_items_get_defaults() {
        let report: SkillGapReport = parse(
            r#"{"learningRoadmap": [{"skill": "Kubernetes", "level": "Expert", "estimatedDays": 13.6}, {"skill": "Go"}, {"level": "Advanced"}]}"#,
        );
        assert_eq!(report.learning_roadmap.len(), 2);
        assert_eq!(report.learning_roadmap[0].level, "Beginner");
        assert_eq!(report.learning_roadmap[0].estimated_days, 14);
        assert_eq!(report.learning_roadmap[1].estimated_days, 7);
        assert!(report.learning_roadmap[1].resource_url.is_none());
    }

    #[test]
    fn test_rewrite_tolerates_partial_payload() {
        let resume: RewrittenResume =
            parse(r#"{"summary": "  Seasoned engineer. ", "experience": [{"title": "SWE"}]}"#);
        assert_eq!(resume.summary, "Seasoned engineer.");
        assert!(resume.skills.is_empty());
        assert!(resume.experience[0].bullets.is_empty());
        assert!(resume.keywords.is_empty());
    }

    #[test]
    fn test_roles_clamped_and_sorted() {
        let roles: RoleSuggestions = parse(
            r#"{"roles": [{"roleName": "SRE", "matchPercentage": 60}, {"roleName": "Platform Engineer", "matchPercentage": 120}]}"#,
        );
        assert_eq!(roles.roles[0].role_name, "Platform Engineer");
        assert_eq!(roles.roles[0].match_percentage, 100.0);
        assert_eq!(roles.roles[1].match_percentage, 60.0);
    }

    #[test]
    fn test_projects_envelope_missing_is_empty() {
        let projects: ProjectSuggestions = parse("{}");
        assert!(projects.projects.is_empty());
    }

    #[test]
    fn test_analysis_type_uses_snake_case_keys() {
        assert_eq!(AnalysisType::GithubProfile.as_str(), "github_profile");
        assert_eq!(AnalysisType::ProjectSuggestions.to_string(), "project_suggestions");
    }

    #[test]
    fn test_null_collections_read_as_empty() {
        let report: SkillGapReport = parse(
            r#"{"jobTitle":"SRE","matchedSkills":["Go"],"missingSkills":null,"extraSkills":null,"matchScore":55,"learningRoadmap":null}"#,
        );
        assert_eq!(report.matched_skills, vec!["Go"]);
        assert!(report.missing_skills.is_empty());
        assert!(report.extra_skills.is_empty());
        assert!(report.learning_roadmap.is_empty());

        let resume: RewrittenResume =
            parse(r#"{"summary":null,"skills":null,"experience":[{"title":"SWE","bullets":null}]}"#);
        assert!(resume.summary.is_empty());
        assert!(resume.experience[0].bullets.is_empty());

        let projects: ProjectSuggestions =
            parse(r#"{"projects":[{"title":"CLI","techStack":null,"difficulty":null}]}"#);
        assert!(projects.projects[0].tech_stack.is_empty());
        assert_eq!(projects.projects[0].difficulty, "Intermediate");

        let github: GithubAnalysis = parse(r#"{"overallScore":40,"strengths":null,"gaps":null}"#);
        assert!(github.strengths.is_empty());
        assert!(github.gaps.is_empty());
    }

    #[test]
    fn test_roadmap_status_defaults_and_parses() {
        let report: SkillGapReport = parse(
            r#"{"learningRoadmap":[{"skill":"Go"},{"skill":"Rust","status":"done"},{"skill":"Helm","status":"someday"}]}"#,
        );
        assert_eq!(report.learning_roadmap[0].status, RoadmapStatus::Todo);
        assert_eq!(report.learning_roadmap[1].status, RoadmapStatus::Done);
        assert_eq!(report.learning_roadmap[2].status, RoadmapStatus::Todo);

        assert_eq!("in-progress".parse::<RoadmapStatus>().unwrap(), RoadmapStatus::InProgress);
        let err = "finished".parse::<RoadmapStatus>().unwrap_err();
        assert_eq!(err, "Invalid status. Must be one of: todo, in-progress, done");
    }

    #[test]
    fn test_roadmap_progress_rounds_percent() {
        let report: SkillGapReport = parse(
            r#"{"learningRoadmap":[{"skill":"Go","status":"done"},{"skill":"Rust"},{"skill":"Helm","status":"in-progress"}]}"#,
        );
        assert_eq!(
            report.roadmap_progress(),
            RoadmapProgress {
                completed: 1,
                total: 3,
                percent: 33
            }
        );
        assert_eq!(SkillGapReport::default().roadmap_progress().percent, 0);
    }
}
