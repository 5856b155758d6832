/// Workspace membership model and database operations
///
/// # Roles
///
/// - **ADMIN**: rename/delete the workspace, manage its members
/// - **EDITOR**: create and edit chat sessions
/// - **VIEWER**: read-only
///
/// Organization OWNERs and ADMINs act as workspace ADMIN without a row here;
/// that rule lives in [`crate::auth::authorization`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Role of a user inside a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "workspace_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceRole {
    Admin,
    Editor,
    Viewer,
}

impl WorkspaceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceRole::Admin => "ADMIN",
            WorkspaceRole::Editor => "EDITOR",
            WorkspaceRole::Viewer => "VIEWER",
        }
    }

    /// Can create and modify content
    pub fn can_write(&self) -> bool {
        matches!(self, WorkspaceRole::Admin | WorkspaceRole::Editor)
    }

    /// Hierarchy: Admin > Editor > Viewer
    pub fn has_permission(&self, required: &WorkspaceRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            WorkspaceRole::Admin => 3,
            WorkspaceRole::Editor => 2,
            WorkspaceRole::Viewer => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMember {
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: WorkspaceRole,
    pub created_at: DateTime<Utc>,
}

/// Workspace membership joined with the member's profile
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMemberDetail {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: WorkspaceRole,
    pub created_at: DateTime<Utc>,
}

impl WorkspaceMember {
    /// Adds a user to a workspace
    pub async fn create(
        pool: &PgPool,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<Self, sqlx::Error> {
        let member = sqlx::query_as::<_, WorkspaceMember>(
            r#"
            INSERT INTO workspace_members (workspace_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING workspace_id, user_id, role, created_at
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(pool)
        .await?;

        Ok(member)
    }

    /// Gets a user's explicit role in a workspace
    pub async fn get_role(
        pool: &PgPool,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<WorkspaceRole>, sqlx::Error> {
        let role: Option<WorkspaceRole> = sqlx::query_scalar(
            "SELECT role FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }

    pub async fn update_role(
        pool: &PgPool,
        workspace_id: Uuid,
        user_id: Uuid,
        role: WorkspaceRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, WorkspaceMember>(
            r#"
            UPDATE workspace_members
            SET role = $3
            WHERE workspace_id = $1 AND user_id = $2
            RETURNING workspace_id, user_id, role, created_at
            "#,
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        Ok(member)
    }

    pub async fn delete(pool: &PgPool, workspace_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM workspace_members WHERE workspace_id = $1 AND user_id = $2")
                .bind(workspace_id)
                .bind(user_id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists members of a workspace with their profiles
    pub async fn list_by_workspace(
        pool: &PgPool,
        workspace_id: Uuid,
    ) -> Result<Vec<WorkspaceMemberDetail>, sqlx::Error> {
        let members = sqlx::query_as::<_, WorkspaceMemberDetail>(
            r#"
            SELECT u.id AS user_id, u.email, u.name, u.avatar_url, m.role, m.created_at
            FROM workspace_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.workspace_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_role_write_access() {
        assert!(WorkspaceRole::Admin.can_write());
        assert!(WorkspaceRole::Editor.can_write());
        assert!(!WorkspaceRole::Viewer.can_write());
    }

    #[test]
    fn test_workspace_role_hierarchy() {
        assert!(WorkspaceRole::Admin.has_permission(&WorkspaceRole::Editor));
        assert!(WorkspaceRole::Editor.has_permission(&WorkspaceRole::Viewer));
        assert!(!WorkspaceRole::Viewer.has_permission(&WorkspaceRole::Editor));
        assert_eq!(WorkspaceRole::Viewer.as_str(), "VIEWER");
    }
}
