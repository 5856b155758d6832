/// Connected source repository
///
/// # Schema
///
/// ```sql
/// CREATE TABLE repositories (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     full_name VARCHAR(512) NOT NULL,
///     url VARCHAR(1024) NOT NULL,
///     provider VARCHAR(50) NOT NULL DEFAULT 'github',
///     default_branch VARCHAR(255) NOT NULL DEFAULT 'main',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT repositories_org_full_name_unique UNIQUE (organization_id, full_name)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Name of the per-organization uniqueness constraint on `full_name`
pub const FULL_NAME_UNIQUE_CONSTRAINT: &str = "repositories_org_full_name_unique";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: Uuid,
    pub organization_id: Uuid,

    /// Short name, e.g. `api`
    pub name: String,

    /// Owner-qualified name, e.g. `acme/api`
    pub full_name: String,

    pub url: String,
    pub provider: String,
    pub default_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for connecting a repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRepository {
    pub organization_id: Uuid,
    pub full_name: String,
    pub url: String,
    pub provider: Option<String>,
    pub default_branch: Option<String>,
}

/// Short name of an owner-qualified repository name
pub fn short_name(full_name: &str) -> &str {
    full_name.rsplit('/').next().unwrap_or(full_name)
}

impl Repository {
    /// Connects a repository to an organization
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on [`FULL_NAME_UNIQUE_CONSTRAINT`] when
    /// the organization already has a repository with that full name.
    pub async fn create(pool: &PgPool, data: CreateRepository) -> Result<Self, sqlx::Error> {
        let repository = sqlx::query_as::<_, Repository>(
            r#"
            INSERT INTO repositories (organization_id, name, full_name, url, provider, default_branch)
            VALUES ($1, $2, $3, $4, COALESCE($5, 'github'), COALESCE($6, 'main'))
            RETURNING id, organization_id, name, full_name, url, provider, default_branch,
                      created_at, updated_at
            "#,
        )
        .bind(data.organization_id)
        .bind(short_name(&data.full_name))
        .bind(&data.full_name)
        .bind(&data.url)
        .bind(&data.provider)
        .bind(&data.default_branch)
        .fetch_one(pool)
        .await?;

        Ok(repository)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let repository = sqlx::query_as::<_, Repository>(
            r#"
            SELECT id, organization_id, name, full_name, url, provider, default_branch,
                   created_at, updated_at
            FROM repositories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(repository)
    }

    /// Lists repositories of an organization by full name
    pub async fn list_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let repositories = sqlx::query_as::<_, Repository>(
            r#"
            SELECT id, organization_id, name, full_name, url, provider, default_branch,
                   created_at, updated_at
            FROM repositories
            WHERE organization_id = $1
            ORDER BY full_name ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(pool)
        .await?;

        Ok(repositories)
    }

    /// Disconnects a repository, dropping its analyses
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM repositories WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("acme/api"), "api");
        assert_eq!(short_name("gitlab/group/sub/project"), "project");
        assert_eq!(short_name("standalone"), "standalone");
    }
}
