/// Organization membership model and database operations
///
/// Implements the many-to-many relationship between users and organizations
/// with a role per membership.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE organization_role AS ENUM ('OWNER', 'ADMIN', 'MEMBER');
///
/// CREATE TABLE organization_members (
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role organization_role NOT NULL DEFAULT 'MEMBER',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (organization_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **OWNER**: billing, delete organization, everything an admin can do
/// - **ADMIN**: manage members, invitations, repositories and workspaces
/// - **MEMBER**: run analyses, create workspaces, read organization data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Role of a user inside an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "organization_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganizationRole {
    /// Full control including billing and deletion
    Owner,

    /// Manages members, invitations, repositories and workspaces
    Admin,

    /// Regular member
    Member,
}

impl OrganizationRole {
    /// Converts role to its stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationRole::Owner => "OWNER",
            OrganizationRole::Admin => "ADMIN",
            OrganizationRole::Member => "MEMBER",
        }
    }

    /// Can invite, remove and re-role members
    pub fn can_manage_members(&self) -> bool {
        matches!(self, OrganizationRole::Owner | OrganizationRole::Admin)
    }

    /// Can connect and disconnect repositories
    pub fn can_manage_repositories(&self) -> bool {
        matches!(self, OrganizationRole::Owner | OrganizationRole::Admin)
    }

    /// Can delete the organization
    pub fn can_delete_organization(&self) -> bool {
        matches!(self, OrganizationRole::Owner)
    }

    /// Checks if this role has at least the permission level of `required`
    ///
    /// Hierarchy: Owner > Admin > Member
    pub fn has_permission(&self, required: &OrganizationRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            OrganizationRole::Owner => 3,
            OrganizationRole::Admin => 2,
            OrganizationRole::Member => 1,
        }
    }
}

/// Membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMember {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: OrganizationRole,
    pub created_at: DateTime<Utc>,
}

/// Membership joined with the member's profile, for member lists
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationMemberDetail {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: OrganizationRole,
    pub created_at: DateTime<Utc>,
}

/// Input for adding a user to an organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganizationMember {
    pub organization_id: Uuid,
    pub user_id: Uuid,

    /// Role to assign (defaults to Member)
    #[serde(default = "default_role")]
    pub role: OrganizationRole,
}

fn default_role() -> OrganizationRole {
    OrganizationRole::Member
}

impl OrganizationMember {
    /// Adds a user to an organization
    ///
    /// # Errors
    ///
    /// Returns an error if the membership already exists (primary key
    /// violation) or either side doesn't exist.
    pub async fn create(pool: &PgPool, data: CreateOrganizationMember) -> Result<Self, sqlx::Error> {
        let member = sqlx::query_as::<_, OrganizationMember>(
            r#"
            INSERT INTO organization_members (organization_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING organization_id, user_id, role, created_at
            "#,
        )
        .bind(data.organization_id)
        .bind(data.user_id)
        .bind(data.role)
        .fetch_one(pool)
        .await?;

        Ok(member)
    }

    /// Gets a user's role in an organization
    ///
    /// Returns None when the user is not a member.
    pub async fn get_role(
        pool: &PgPool,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrganizationRole>, sqlx::Error> {
        let role: Option<OrganizationRole> = sqlx::query_scalar(
            r#"
            SELECT role FROM organization_members
            WHERE organization_id = $1 AND user_id = $2
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }

    /// Checks if a user belongs to an organization
    pub async fn is_member(
        pool: &PgPool,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM organization_members
                WHERE organization_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Updates a member's role
    ///
    /// Returns None if the membership doesn't exist.
    pub async fn update_role(
        pool: &PgPool,
        organization_id: Uuid,
        user_id: Uuid,
        role: OrganizationRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let member = sqlx::query_as::<_, OrganizationMember>(
            r#"
            UPDATE organization_members
            SET role = $3
            WHERE organization_id = $1 AND user_id = $2
            RETURNING organization_id, user_id, role, created_at
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        Ok(member)
    }

    /// Removes a user from an organization
    ///
    /// Workspace memberships inside the organization are removed with it.
    pub async fn delete(
        pool: &PgPool,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM workspace_members
            WHERE user_id = $2
              AND workspace_id IN (SELECT id FROM workspaces WHERE organization_id = $1)
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "DELETE FROM organization_members WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists members of an organization with their profiles
    pub async fn list_by_organization(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<Vec<OrganizationMemberDetail>, sqlx::Error> {
        let members = sqlx::query_as::<_, OrganizationMemberDetail>(
            r#"
            SELECT u.id AS user_id, u.email, u.name, u.avatar_url, m.role, m.created_at
            FROM organization_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Counts members of an organization
    pub async fn count_by_organization(pool: &PgPool, organization_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM organization_members WHERE organization_id = $1",
        )
        .bind(organization_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_as_str() {
        assert_eq!(OrganizationRole::Owner.as_str(), "OWNER");
        assert_eq!(OrganizationRole::Admin.as_str(), "ADMIN");
        assert_eq!(OrganizationRole::Member.as_str(), "MEMBER");
    }

    #[test]
    fn test_role_permissions() {
        assert!(OrganizationRole::Owner.can_manage_members());
        assert!(OrganizationRole::Owner.can_delete_organization());

        assert!(OrganizationRole::Admin.can_manage_members());
        assert!(OrganizationRole::Admin.can_manage_repositories());
        assert!(!OrganizationRole::Admin.can_delete_organization());

        assert!(!OrganizationRole::Member.can_manage_members());
        assert!(!OrganizationRole::Member.can_manage_repositories());
        assert!(!OrganizationRole::Member.can_delete_organization());
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(OrganizationRole::Owner.has_permission(&OrganizationRole::Admin));
        assert!(OrganizationRole::Admin.has_permission(&OrganizationRole::Admin));
        assert!(OrganizationRole::Admin.has_permission(&OrganizationRole::Member));
        assert!(!OrganizationRole::Member.has_permission(&OrganizationRole::Admin));
        assert!(!OrganizationRole::Admin.has_permission(&OrganizationRole::Owner));
    }

    #[test]
    fn test_role_deserializes_uppercase() {
        let role: OrganizationRole = serde_json::from_str("\"ADMIN\"").unwrap();
        assert_eq!(role, OrganizationRole::Admin);
    }

    #[test]
    fn test_create_member_default_role() {
        assert_eq!(default_role(), OrganizationRole::Member);
    }
}
