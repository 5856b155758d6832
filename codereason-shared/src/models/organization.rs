/// Organization model and database operations
///
/// Organizations are the top-level tenancy container. Repositories and
/// workspaces belong to exactly one organization; users join through
/// [`OrganizationMember`](super::organization_member::OrganizationMember).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE organizations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     slug VARCHAR(255) NOT NULL UNIQUE,
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use codereason_shared::models::organization::{CreateOrganization, Organization};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, owner_id: Uuid) -> Result<(), sqlx::Error> {
/// let org = Organization::create_with_owner(
///     &pool,
///     CreateOrganization { name: "Acme".to_string() },
///     owner_id,
/// )
/// .await?;
/// println!("Created {} ({})", org.name, org.slug);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::organization_member::OrganizationRole;

/// Organization model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Unique organization ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// URL-safe unique identifier
    pub slug: String,

    /// User who created the organization and pays for it
    pub owner_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Organization as seen by one of its members
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub owner_id: Uuid,

    /// Caller's role in the organization
    pub role: OrganizationRole,

    /// Number of members
    pub member_count: i64,

    /// Number of workspaces
    pub workspace_count: i64,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a new organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    /// Display name
    pub name: String,
}

/// Builds a slug from a display name plus a short random suffix
///
/// The suffix keeps slugs unique without a lookup round trip.
pub fn slugify(name: &str) -> String {
    let mut base = String::with_capacity(name.len());
    let mut last_dash = true;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            base.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            base.push('-');
            last_dash = true;
        }
    }

    let base = base.trim_end_matches('-');
    let base = if base.is_empty() { "org" } else { base };
    let base: String = base.chars().take(48).collect();
    let suffix: [u8; 3] = rand::random();

    format!("{}-{}", base.trim_end_matches('-'), hex::encode(suffix))
}

impl Organization {
    /// Creates an organization and its OWNER membership in one transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the owner doesn't exist or the database fails. On
    /// error nothing is persisted.
    pub async fn create_with_owner(
        pool: &PgPool,
        data: CreateOrganization,
        owner_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let org = sqlx::query_as::<_, Organization>(
            r#"
            INSERT INTO organizations (name, slug, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, owner_id, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .bind(slugify(&data.name))
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO organization_members (organization_id, user_id, role)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(org.id)
        .bind(owner_id)
        .bind(OrganizationRole::Owner)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(organization_id = %org.id, owner_id = %owner_id, "Organization created");
        Ok(org)
    }

    /// Finds an organization by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            SELECT id, name, slug, owner_id, created_at, updated_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(org)
    }

    /// Renames an organization
    pub async fn rename(pool: &PgPool, id: Uuid, name: &str) -> Result<Option<Self>, sqlx::Error> {
        let org = sqlx::query_as::<_, Organization>(
            r#"
            UPDATE organizations
            SET name = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, slug, owner_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(pool)
        .await?;

        Ok(org)
    }

    /// Deletes an organization
    ///
    /// Cascades to memberships, workspaces, repositories, analyses and
    /// invitations.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists the organizations a user belongs to, oldest membership first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<OrganizationSummary>, sqlx::Error> {
        let orgs = sqlx::query_as::<_, OrganizationSummary>(
            r#"
            SELECT o.id, o.name, o.slug, o.owner_id, m.role,
                   (SELECT COUNT(*) FROM organization_members om WHERE om.organization_id = o.id) AS member_count,
                   (SELECT COUNT(*) FROM workspaces w WHERE w.organization_id = o.id) AS workspace_count,
                   o.created_at
            FROM organizations o
            JOIN organization_members m ON m.organization_id = o.id
            WHERE m.user_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(orgs)
    }

    /// Counts organizations owned by a user
    pub async fn count_owned_by(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations WHERE owner_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
