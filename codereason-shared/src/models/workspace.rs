/// Workspace model and database operations
///
/// A workspace groups chat sessions and members inside one organization.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE workspaces (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::workspace_member::WorkspaceRole;

/// Workspace model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,

    /// Creator (None once the creating user is deleted)
    pub created_by: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkspace {
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Input for updating a workspace
///
/// Only non-None fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWorkspace {
    pub name: Option<String>,

    /// New description (use Some(None) to clear)
    pub description: Option<Option<String>>,
}

impl Workspace {
    /// Creates a workspace and makes the creator its ADMIN
    ///
    /// Both rows are written in one transaction.
    pub async fn create(
        pool: &PgPool,
        data: CreateWorkspace,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let workspace = sqlx::query_as::<_, Workspace>(
            r#"
            INSERT INTO workspaces (organization_id, name, description, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, organization_id, name, description, created_by, created_at, updated_at
            "#,
        )
        .bind(data.organization_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO workspace_members (workspace_id, user_id, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(workspace.id)
        .bind(created_by)
        .bind(WorkspaceRole::Admin)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            workspace_id = %workspace.id,
            organization_id = %workspace.organization_id,
            "Workspace created"
        );
        Ok(workspace)
    }

    /// Finds a workspace by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let workspace = sqlx::query_as::<_, Workspace>(
            r#"
            SELECT id, organization_id, name, description, created_by, created_at, updated_at
            FROM workspaces
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(workspace)
    }

    /// Lists workspaces of an organization, newest first
    pub async fn list_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let workspaces = sqlx::query_as::<_, Workspace>(
            r#"
            SELECT id, organization_id, name, description, created_by, created_at, updated_at
            FROM workspaces
            WHERE organization_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(organization_id)
        .fetch_all(pool)
        .await?;

        Ok(workspaces)
    }

    /// Updates a workspace
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateWorkspace,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE workspaces SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, organization_id, name, description, created_by, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, Workspace>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a workspace along with its members and chat sessions
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = $1")
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
    fn test_update_workspace_default() {
        let update = UpdateWorkspace::default();
        assert!(update.name.is_none());
        assert!(update.description.is_none());
    }

    #[test]
    fn test_workspace_serializes_camel_case() {
        let ws = Workspace {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Backend".to_string(),
            description: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&ws).unwrap();
        assert!(json.get("organizationId").is_some());
        assert!(json.get("createdBy").is_some());
    }
}
