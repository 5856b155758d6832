/// Analysis model and database operations
///
/// An analysis is one reasoning run over a repository: either a pull request
/// review or a full scan. Monthly counts of these rows drive billing usage
/// and the PR review quota (see [`crate::quota`]).
///
/// # State Machine
///
/// ```text
/// PENDING → RUNNING → COMPLETED
///                   → FAILED
/// PENDING → FAILED
/// ```
///
/// # Schema
///
/// ```sql
/// CREATE TYPE analysis_kind AS ENUM ('PR_REVIEW', 'FULL_SCAN');
/// CREATE TYPE analysis_status AS ENUM ('PENDING', 'RUNNING', 'COMPLETED', 'FAILED');
///
/// CREATE TABLE analyses (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     repository_id UUID NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     kind analysis_kind NOT NULL,
///     status analysis_status NOT NULL DEFAULT 'PENDING',
///     pr_number INTEGER,
///     commit_sha VARCHAR(64),
///     summary TEXT,
///     result JSONB,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     completed_at TIMESTAMPTZ
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// What an analysis looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "analysis_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisKind {
    /// Review of a single pull request
    PrReview,

    /// Whole-repository scan
    FullScan,
}

/// Analysis lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "analysis_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "PENDING",
            AnalysisStatus::Running => "RUNNING",
            AnalysisStatus::Completed => "COMPLETED",
            AnalysisStatus::Failed => "FAILED",
        }
    }

    /// Checks if state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Completed | AnalysisStatus::Failed)
    }

    /// Checks if transition to target state is valid
    pub fn can_transition_to(&self, target: AnalysisStatus) -> bool {
        match (self, target) {
            (AnalysisStatus::Pending, AnalysisStatus::Running) => true,
            (AnalysisStatus::Pending, AnalysisStatus::Failed) => true,
            (AnalysisStatus::Running, AnalysisStatus::Completed) => true,
            (AnalysisStatus::Running, AnalysisStatus::Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: Uuid,
    pub repository_id: Uuid,

    /// User who requested the analysis
    pub user_id: Uuid,

    pub kind: AnalysisKind,
    pub status: AnalysisStatus,

    /// Pull request number (PR reviews only)
    pub pr_number: Option<i32>,

    pub commit_sha: Option<String>,
    pub summary: Option<String>,

    /// Structured findings
    pub result: Option<JsonValue>,

    pub created_at: DateTime<Utc>,

    /// Set when the analysis reaches a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

/// Analysis joined with its repository name, for dashboards
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisListItem {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub repository_full_name: String,
    pub user_id: Uuid,
    pub kind: AnalysisKind,
    pub status: AnalysisStatus,
    pub pr_number: Option<i32>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnalysis {
    pub repository_id: Uuid,
    pub user_id: Uuid,
    pub kind: AnalysisKind,
    pub pr_number: Option<i32>,
    pub commit_sha: Option<String>,
}

impl Analysis {
    pub async fn create(pool: &PgPool, data: CreateAnalysis) -> Result<Self, sqlx::Error> {
        let analysis = sqlx::query_as::<_, Analysis>(
            r#"
            INSERT INTO analyses (repository_id, user_id, kind, pr_number, commit_sha)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, repository_id, user_id, kind, status, pr_number, commit_sha,
                      summary, result, created_at, completed_at
            "#,
        )
        .bind(data.repository_id)
        .bind(data.user_id)
        .bind(data.kind)
        .bind(data.pr_number)
        .bind(&data.commit_sha)
        .fetch_one(pool)
        .await?;

        Ok(analysis)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let analysis = sqlx::query_as::<_, Analysis>(
            r#"
            SELECT id, repository_id, user_id, kind, status, pr_number, commit_sha,
                   summary, result, created_at, completed_at
            FROM analyses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(analysis)
    }

    /// Moves an analysis to `status`, recording summary and result
    ///
    /// The update only applies when `from` is still the stored status, so two
    /// racing updates cannot both move the same row. Returns None when the
    /// row doesn't exist or has already left `from`.
    pub async fn transition(
        pool: &PgPool,
        id: Uuid,
        from: AnalysisStatus,
        to: AnalysisStatus,
        summary: Option<&str>,
        result: Option<&JsonValue>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let analysis = sqlx::query_as::<_, Analysis>(
            r#"
            UPDATE analyses
            SET status = $3,
                summary = COALESCE($4, summary),
                result = COALESCE($5, result),
                completed_at = CASE WHEN $6 THEN NOW() ELSE completed_at END
            WHERE id = $1 AND status = $2
            RETURNING id, repository_id, user_id, kind, status, pr_number, commit_sha,
                      summary, result, created_at, completed_at
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(summary)
        .bind(result)
        .bind(to.is_terminal())
        .fetch_optional(pool)
        .await?;

        Ok(analysis)
    }

    /// Lists analyses of a repository, newest first
    pub async fn list_by_repository(
        pool: &PgPool,
        repository_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let analyses = sqlx::query_as::<_, Analysis>(
            r#"
            SELECT id, repository_id, user_id, kind, status, pr_number, commit_sha,
                   summary, result, created_at, completed_at
            FROM analyses
            WHERE repository_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(repository_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(analyses)
    }

    /// Most recent analyses across an organization's repositories
    pub async fn list_recent_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AnalysisListItem>, sqlx::Error> {
        let analyses = sqlx::query_as::<_, AnalysisListItem>(
            r#"
            SELECT a.id, a.repository_id, r.full_name AS repository_full_name, a.user_id,
                   a.kind, a.status, a.pr_number, a.summary, a.created_at, a.completed_at
            FROM analyses a
            JOIN repositories r ON r.id = a.repository_id
            WHERE r.organization_id = $1
            ORDER BY a.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(organization_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(analyses)
    }

    /// Counts analyses across an organization's repositories since `since`
    pub async fn count_for_organization_since(
        pool: &PgPool,
        organization_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM analyses a
            JOIN repositories r ON r.id = a.repository_id
            WHERE r.organization_id = $1 AND a.created_at >= $2
            "#,
        )
        .bind(organization_id)
        .bind(since)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Counts analyses of one kind requested by a user since `since`
    pub async fn count_for_user_since(
        pool: &PgPool,
        user_id: Uuid,
        kind: AnalysisKind,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM analyses
            WHERE user_id = $1 AND kind = $2 AND created_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(since)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}
