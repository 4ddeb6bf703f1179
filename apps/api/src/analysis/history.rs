use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::analysis::fingerprint::truncate_chars;
use crate::analysis::models::SkillGapReport;

/// Stored resume excerpt length.
pub const RESUME_EXCERPT_CHARS: usize = 10_000;
/// Stored job description length.
pub const JOB_DESCRIPTION_CHARS: usize = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_title: String,
    pub resume_excerpt: String,
    pub job_description: String,
    pub report: Value,
    pub match_score: f64,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(
        user_id: Uuid,
        resume_text: &str,
        job_description: &str,
        report: &SkillGapReport,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            job_title: report.job_title.clone(),
            resume_excerpt: truncate_chars(resume_text, RESUME_EXCERPT_CHARS).to_string(),
            job_description: truncate_chars(job_description, JOB_DESCRIPTION_CHARS).to_string(),
            report: serde_json::to_value(report)?,
            match_score: report.match_score,
            created_at: Utc::now(),
        })
    }
}

/// Per-user history of completed skill-gap analyses.
#[async_trait]
pub trait AnalysisHistory: Send + Sync {
    async fn insert(&self, record: &AnalysisRecord) -> Result<()>;
    /// Newest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>>;
    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<AnalysisRecord>>;
    /// Replaces the stored report. Returns false if the record did not exist
    /// for this user.
    async fn update_report(&self, user_id: Uuid, id: Uuid, report: &Value) -> Result<bool>;
    /// Returns false if the record did not exist for this user.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool>;
    async fn delete_all(&self, user_id: Uuid) -> Result<u64>;
}

pub struct PgAnalysisHistory {
    pool: PgPool,
}

impl PgAnalysisHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisHistory for PgAnalysisHistory {
    async fn insert(&self, record: &AnalysisRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analyses
                (id, user_id, job_title, resume_excerpt, job_description, report, match_score, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.job_title)
        .bind(&record.resume_excerpt)
        .bind(&record.job_description)
        .bind(&record.report)
        .bind(record.match_score)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        info!("Saved analysis {} for user {}", record.id, record.user_id);
        Ok(())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>> {
        Ok(sqlx::query_as::<_, AnalysisRecord>(
            "SELECT * FROM analyses WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<AnalysisRecord>> {
        Ok(sqlx::query_as::<_, AnalysisRecord>(
            "SELECT * FROM analyses WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_report(&self, user_id: Uuid, id: Uuid, report: &Value) -> Result<bool> {
        let done = sqlx::query("UPDATE analyses SET report = $3 WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .bind(report)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM analyses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<u64> {
        let done = sqlx::query("DELETE FROM analyses WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }
}
