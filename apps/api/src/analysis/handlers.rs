use std::sync::LazyLock;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::analysis::cooldown::CooldownStatus;
use crate::analysis::history::AnalysisRecord;
use crate::analysis::models::{GithubReport, ProjectSuggestions, RoadmapStatus, RoleSuggestions};
use crate::analysis::service::{Cached, Gated, RoadmapUpdate};
use crate::errors::AppError;
use crate::rate_limit::{AI_RULES, ANALYSIS_RULES};
use crate::state::AppState;

const MIN_RESUME_CHARS: usize = 100;
const MIN_JOB_DESCRIPTION_CHARS: usize = 50;
const MIN_TITLE_CHARS: usize = 2;

static GITHUB_USERNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,37}[a-zA-Z0-9])?$")
        .expect("GitHub username pattern compiles")
});

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub job_description: String,
}

#[derive(Deserialize)]
pub struct RewriteRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub job_description: String,
}

#[derive(Deserialize)]
pub struct ProjectSuggestionRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub missing_skills: Vec<String>,
    #[serde(default)]
    pub job_title: String,
}

#[derive(Deserialize)]
pub struct RoleSuggestionRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub matched_skills: Vec<String>,
    #[serde(default)]
    pub job_title: String,
}

#[derive(Deserialize)]
pub struct GithubAnalysisRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub target_role: String,
}

#[derive(Deserialize)]
pub struct RoadmapStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

/// Envelope for every successful analysis response.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub cached: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    fn from_cached<U>(
        result: Cached<U>,
        subject: &str,
        fresh: &str,
        wrap: impl FnOnce(U) -> T,
    ) -> Self {
        let message = if result.from_cache {
            format!("{subject} loaded from cache")
        } else {
            fresh.to_string()
        };
        Self {
            success: true,
            message,
            cached: result.from_cache,
            data: wrap(result.value),
        }
    }
}

#[derive(Serialize)]
pub struct CooldownRejection {
    pub success: bool,
    pub allowed: bool,
    pub remaining_seconds: u64,
    pub message: String,
}

#[derive(Serialize)]
pub struct AnalysisData {
    pub analysis: AnalysisRecord,
}

fn require_resume(text: &str) -> Result<(), AppError> {
    if text.trim().chars().count() < MIN_RESUME_CHARS {
        return Err(AppError::Validation(format!(
            "Please provide resume text (at least {MIN_RESUME_CHARS} characters)"
        )));
    }
    Ok(())
}

fn require_job_description(text: &str) -> Result<(), AppError> {
    if text.trim().chars().count() < MIN_JOB_DESCRIPTION_CHARS {
        return Err(AppError::Validation(format!(
            "Please provide a job description (at least {MIN_JOB_DESCRIPTION_CHARS} characters)"
        )));
    }
    Ok(())
}

fn require_title(title: &str, what: &str) -> Result<(), AppError> {
    if title.trim().chars().count() < MIN_TITLE_CHARS {
        return Err(AppError::Validation(format!("Please provide a valid {what}")));
    }
    Ok(())
}

fn require_github_username(username: &str) -> Result<(), AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation(
            "Please provide a GitHub username".to_string(),
        ));
    }
    if !GITHUB_USERNAME.is_match(username) {
        return Err(AppError::Validation(
            "Invalid GitHub username format".to_string(),
        ));
    }
    Ok(())
}

/// POST /api/v1/analysis/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Response, AppError> {
    state.limits.admit(req.user_id, ANALYSIS_RULES)?;
    require_job_description(&req.job_description)?;
    require_resume(&req.resume_text)?;

    let outcome = state
        .analysis
        .analyze_skill_gap(req.user_id, &req.resume_text, &req.job_description)
        .await?;

    match outcome {
        Gated::CoolingDown { remaining_seconds } => Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Json(CooldownRejection {
                success: false,
                allowed: false,
                remaining_seconds,
                message: format!(
                    "Please wait {remaining_seconds} seconds before running another analysis"
                ),
            }),
        )
            .into_response()),
        Gated::Done(result) => {
            let body = ApiResponse::from_cached(
                result,
                "Analysis",
                "Analysis completed successfully",
                |analysis| AnalysisData { analysis },
            );
            Ok((StatusCode::CREATED, Json(body)).into_response())
        }
    }
}

/// GET /api/v1/analysis/cooldown
pub async fn handle_cooldown_status(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Json<CooldownStatus> {
    Json(state.analysis.cooldown_status(params.user_id).await)
}

/// POST /api/v1/ai/rewrite-resume
pub async fn handle_rewrite_resume(
    State(state): State<AppState>,
    Json(req): Json<RewriteRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    state.limits.admit(req.user_id, AI_RULES)?;
    require_resume(&req.resume_text)?;
    require_job_description(&req.job_description)?;

    let result = state
        .analysis
        .rewrite_resume(&req.resume_text, &req.job_description)
        .await?;
    Ok(Json(ApiResponse::from_cached(
        result,
        "Resume",
        "Resume rewritten successfully",
        |resume| json!({ "resume": resume }),
    )))
}

/// POST /api/v1/ai/project-suggestions
pub async fn handle_project_suggestions(
    State(state): State<AppState>,
    Json(req): Json<ProjectSuggestionRequest>,
) -> Result<Json<ApiResponse<ProjectSuggestions>>, AppError> {
    state.limits.admit(req.user_id, AI_RULES)?;
    if req.missing_skills.iter().all(|s| s.trim().is_empty()) {
        return Err(AppError::Validation(
            "Please provide at least one missing skill".to_string(),
        ));
    }
    require_title(&req.job_title, "job title")?;

    let result = state
        .analysis
        .suggest_projects(&req.missing_skills, &req.job_title)
        .await?;
    Ok(Json(ApiResponse::from_cached(
        result,
        "Projects",
        "Project suggestions generated successfully",
        |projects| projects,
    )))
}

/// POST /api/v1/ai/role-suggestions
pub async fn handle_role_suggestions(
    State(state): State<AppState>,
    Json(req): Json<RoleSuggestionRequest>,
) -> Result<Json<ApiResponse<RoleSuggestions>>, AppError> {
    state.limits.admit(req.user_id, AI_RULES)?;
    require_resume(&req.resume_text)?;
    require_title(&req.job_title, "job title")?;

    let result = state
        .analysis
        .suggest_roles(&req.resume_text, &req.matched_skills, &req.job_title)
        .await?;
    Ok(Json(ApiResponse::from_cached(
        result,
        "Roles",
        "Role suggestions generated successfully",
        |roles| roles,
    )))
}

/// POST /api/v1/ai/github-analysis
pub async fn handle_github_analysis(
    State(state): State<AppState>,
    Json(req): Json<GithubAnalysisRequest>,
) -> Result<Json<ApiResponse<GithubReport>>, AppError> {
    state.limits.admit(req.user_id, AI_RULES)?;
    require_github_username(&req.username)?;
    require_title(&req.target_role, "target role")?;

    let result = state
        .analysis
        .analyze_github(req.username.trim(), &req.target_role)
        .await?;
    Ok(Json(ApiResponse::from_cached(
        result,
        "Analysis",
        "GitHub profile analyzed successfully",
        |report| report,
    )))
}

/// GET /api/v1/history
pub async fn handle_list_history(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<AnalysisRecord>>, AppError> {
    Ok(Json(state.analysis.list_history(params.user_id).await?))
}

/// GET /api/v1/history/:id
pub async fn handle_get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<AnalysisRecord>, AppError> {
    Ok(Json(state.analysis.get_history(params.user_id, id).await?))
}

/// DELETE /api/v1/history/:id
pub async fn handle_delete_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<StatusCode, AppError> {
    state.analysis.delete_history(params.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/history/:id/roadmap/:index
pub async fn handle_update_roadmap_status(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, String)>,
    Query(params): Query<UserIdQuery>,
    Json(req): Json<RoadmapStatusRequest>,
) -> Result<Json<ApiResponse<RoadmapUpdate>>, AppError> {
    let status: RoadmapStatus = req
        .status
        .unwrap_or_default()
        .parse()
        .map_err(AppError::Validation)?;
    let index: usize = index
        .parse()
        .map_err(|_| AppError::Validation("Invalid roadmap item index".to_string()))?;

    let update = state
        .analysis
        .update_roadmap_status(params.user_id, id, index, status)
        .await?;
    Ok(Json(ApiResponse {
        success: true,
        message: "Roadmap progress updated".to_string(),
        cached: false,
        data: update,
    }))
}

/// DELETE /api/v1/history
pub async fn handle_clear_history(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Value>, AppError> {
    let deleted = state.analysis.clear_history(params.user_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::build_router;
    use crate::testing::Harness;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Duration;
    use tower::ServiceExt;

    const REPORT_JSON: &str = r#"{"jobTitle":"Platform Engineer","matchedSkills":["Go"],"missingSkills":["Terraform"],"matchScore":55}"#;

    fn app(h: &Harness) -> axum::Router {
        build_router(h.state())
    }

    async fn send(app: axum::Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn analyze_body(user: Uuid) -> Value {
        json!({
            "user_id": user,
            "resume_text": "Platform engineer running Go services on Kubernetes. ".repeat(3),
            "job_description": "Platform Engineer with Terraform, Go and Kubernetes experience."
        })
    }

    #[test]
    fn test_username_pattern() {
        assert!(require_github_username("octo-cat").is_ok());
        assert!(require_github_username("a").is_ok());
        assert!(require_github_username("-octo").is_err());
        assert!(require_github_username("octo-").is_err());
        assert!(require_github_username("octo_cat").is_err());
        assert!(require_github_username(&"a".repeat(40)).is_err());
        assert!(require_github_username("   ").is_err());
    }

    #[test]
    fn test_resume_minimum_counts_trimmed_chars() {
        assert!(require_resume(&format!("  {}  ", "x".repeat(99))).is_err());
        assert!(require_resume(&"x".repeat(100)).is_ok());
    }

    #[tokio::test]
    async fn test_health() {
        let h = Harness::new();
        let response = app(&h)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_analyze_short_job_description_is_400() {
        let h = Harness::new();
        let body = json!({
            "user_id": Uuid::new_v4(),
            "resume_text": "x".repeat(200),
            "job_description": "too short"
        });

        let (status, json) = send(app(&h), "POST", "/api/v1/analysis/analyze", body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_then_cooldown_rejection() {
        let h = Harness::new();
        h.backend.script("model-a", vec![Ok(REPORT_JSON.to_string())]);
        let user = Uuid::new_v4();

        let (status, json) =
            send(app(&h), "POST", "/api/v1/analysis/analyze", analyze_body(user)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["success"], true);
        assert_eq!(json["cached"], false);
        assert_eq!(json["data"]["analysis"]["job_title"], "Platform Engineer");

        h.clock.advance(Duration::seconds(20));
        let (status, json) =
            send(app(&h), "POST", "/api/v1/analysis/analyze", analyze_body(user)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["allowed"], false);
        assert_eq!(json["remaining_seconds"], 40);
        assert_eq!(h.backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cached_analysis_is_annotated() {
        let h = Harness::new();
        h.backend.script("model-a", vec![Ok(REPORT_JSON.to_string())]);

        send(app(&h), "POST", "/api/v1/analysis/analyze", analyze_body(Uuid::new_v4())).await;
        let (status, json) =
            send(app(&h), "POST", "/api/v1/analysis/analyze", analyze_body(Uuid::new_v4())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["cached"], true);
        assert_eq!(json["message"], "Analysis loaded from cache");
    }

    #[tokio::test]
    async fn test_cooldown_status_endpoint() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        h.cooldowns.set(user, h.clock.now() - Duration::seconds(10));

        let (status, json) = send(
            app(&h),
            "GET",
            &format!("/api/v1/analysis/cooldown?user_id={user}"),
            Value::Null,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ready"], false);
        assert_eq!(json["remaining_seconds"], 50);
        assert_eq!(json["cooldown_seconds"], 60);
    }

    #[tokio::test]
    async fn test_project_suggestions_require_a_skill() {
        let h = Harness::new();
        let (status, _) = send(
            app(&h),
            "POST",
            "/api/v1/ai/project-suggestions",
            json!({ "user_id": Uuid::new_v4(), "missing_skills": [], "job_title": "SRE" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_exhausted_models_return_generic_error() {
        let h = Harness::new();
        let (status, json) = send(
            app(&h),
            "POST",
            "/api/v1/ai/project-suggestions",
            json!({ "user_id": Uuid::new_v4(), "missing_skills": ["Terraform"], "job_title": "SRE" }),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["code"], "LLM_ERROR");
        assert_eq!(json["error"]["message"], "An AI processing error occurred");
    }

    #[tokio::test]
    async fn test_unknown_history_entry_is_404() {
        let h = Harness::new();
        let (status, _) = send(
            app(&h),
            "GET",
            &format!("/api/v1/history/{}?user_id={}", Uuid::new_v4(), Uuid::new_v4()),
            Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_eleventh_ai_request_in_a_minute_is_429() {
        let h = Harness::new();
        h.backend.script(
            "model-a",
            vec![Ok(r#"{"projects":[{"title":"Terraform module"}]}"#.to_string())],
        );
        let user = Uuid::new_v4();
        let body = json!({ "user_id": user, "missing_skills": ["Terraform"], "job_title": "SRE" });

        for _ in 0..10 {
            let (status, _) =
                send(app(&h), "POST", "/api/v1/ai/project-suggestions", body.clone()).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, json) = send(app(&h), "POST", "/api/v1/ai/project-suggestions", body).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json["success"], false);
        assert_eq!(json["retryAfter"], 60);
        assert_eq!(h.backend.calls().len(), 1);

        let other = json!({ "user_id": Uuid::new_v4(), "missing_skills": ["Terraform"], "job_title": "SRE" });
        let (status, _) = send(app(&h), "POST", "/api/v1/ai/project-suggestions", other).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_roadmap_status_patch_reports_progress() {
        let h = Harness::new();
        h.backend.script(
            "model-a",
            vec![Ok(r#"{"jobTitle":"Platform Engineer","matchScore":55,"learningRoadmap":[{"skill":"Terraform"},{"skill":"Helm"},{"skill":"Istio"},{"skill":"Vault"}]}"#.to_string())],
        );
        let user = Uuid::new_v4();
        let (_, created) =
            send(app(&h), "POST", "/api/v1/analysis/analyze", analyze_body(user)).await;
        let id = created["data"]["analysis"]["id"].as_str().unwrap().to_string();
        let uri = |index: &str| format!("/api/v1/history/{id}/roadmap/{index}?user_id={user}");

        let (status, json) = send(app(&h), "PATCH", &uri("0"), json!({ "status": "done" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["updated_item"]["skill"], "Terraform");
        assert_eq!(json["data"]["updated_item"]["status"], "done");
        assert_eq!(json["data"]["progress"], json!({ "completed": 1, "total": 4, "percent": 25 }));

        let (status, json) =
            send(app(&h), "PATCH", &uri("1"), json!({ "status": "in-progress" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["progress"]["completed"], 1);

        let (status, json) = send(app(&h), "PATCH", &uri("1"), json!({ "status": "finished" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"]["message"],
            "Invalid status. Must be one of: todo, in-progress, done"
        );

        for bad in ["4", "-1", "first"] {
            let (status, json) = send(app(&h), "PATCH", &uri(bad), json!({ "status": "done" })).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"]["message"], "Invalid roadmap item index");
        }

        let stranger = format!("/api/v1/history/{id}/roadmap/0?user_id={}", Uuid::new_v4());
        let (status, _) = send(app(&h), "PATCH", &stranger, json!({ "status": "done" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
