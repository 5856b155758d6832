/// Workspace invitations
///
/// Same lifecycle as organization invitations (see
/// [`super::invitation`]), targeting a single workspace. Accepting one also
/// makes the user a MEMBER of the workspace's organization when they aren't
/// already in it.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE workspace_invitations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     workspace_id UUID NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
///     email VARCHAR(320) NOT NULL,
///     role workspace_role NOT NULL DEFAULT 'EDITOR',
///     token VARCHAR(128) NOT NULL UNIQUE,
///     invited_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     expires_at TIMESTAMPTZ NOT NULL,
///     accepted_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::invitation::{
    generate_invitation_token, InvitationError, InvitationStatus, INVITATION_TTL_DAYS,
};
use super::notification::{kind, NewNotification, UserNotification};
use super::organization_member::OrganizationRole;
use super::user::normalize_email;
use super::workspace_member::WorkspaceRole;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceInvitation {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub email: String,
    pub role: WorkspaceRole,

    #[serde(skip_serializing)]
    pub token: String,

    pub invited_by: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceInvitationDetail {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub workspace_name: String,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub email: String,
    pub role: WorkspaceRole,
    pub inviter_name: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,

    #[sqlx(skip)]
    pub valid: bool,

    #[sqlx(skip)]
    pub is_expired: bool,

    #[sqlx(skip)]
    pub is_accepted: bool,
}

impl WorkspaceInvitation {
    pub fn status(&self, now: DateTime<Utc>) -> InvitationStatus {
        InvitationStatus::evaluate(self.expires_at, self.accepted_at, now)
    }

    pub async fn create(
        pool: &PgPool,
        workspace_id: Uuid,
        email: &str,
        role: WorkspaceRole,
        invited_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let expires_at = Utc::now() + Duration::days(INVITATION_TTL_DAYS);

        let invitation = sqlx::query_as::<_, WorkspaceInvitation>(
            r#"
            INSERT INTO workspace_invitations (workspace_id, email, role, token, invited_by, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, workspace_id, email, role, token, invited_by, expires_at,
                      accepted_at, created_at
            "#,
        )
        .bind(workspace_id)
        .bind(normalize_email(email))
        .bind(role)
        .bind(generate_invitation_token())
        .bind(invited_by)
        .bind(expires_at)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            invitation_id = %invitation.id,
            workspace_id = %workspace_id,
            "Workspace invitation created"
        );
        Ok(invitation)
    }

    pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Option<Self>, sqlx::Error> {
        let invitation = sqlx::query_as::<_, WorkspaceInvitation>(
            r#"
            SELECT id, workspace_id, email, role, token, invited_by, expires_at,
                   accepted_at, created_at
            FROM workspace_invitations
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?;

        Ok(invitation)
    }

    /// Looks up a token and checks it targets `workspace_id`
    pub async fn validate(
        pool: &PgPool,
        token: &str,
        workspace_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<WorkspaceInvitationDetail, InvitationError> {
        let mut detail = sqlx::query_as::<_, WorkspaceInvitationDetail>(
            r#"
            SELECT i.id, i.workspace_id, w.name AS workspace_name,
                   o.id AS organization_id, o.name AS organization_name,
                   i.email, i.role, u.name AS inviter_name, i.expires_at, i.accepted_at
            FROM workspace_invitations i
            JOIN workspaces w ON w.id = i.workspace_id
            JOIN organizations o ON o.id = w.organization_id
            LEFT JOIN users u ON u.id = i.invited_by
            WHERE i.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or(InvitationError::NotFound)?;

        if detail.workspace_id != workspace_id {
            return Err(InvitationError::TargetMismatch("workspace"));
        }

        let status = InvitationStatus::evaluate(detail.expires_at, detail.accepted_at, now);
        detail.valid = status.valid;
        detail.is_expired = status.is_expired;
        detail.is_accepted = status.is_accepted;

        Ok(detail)
    }

    pub async fn list_pending(pool: &PgPool, workspace_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let invitations = sqlx::query_as::<_, WorkspaceInvitation>(
            r#"
            SELECT id, workspace_id, email, role, token, invited_by, expires_at,
                   accepted_at, created_at
            FROM workspace_invitations
            WHERE workspace_id = $1 AND accepted_at IS NULL AND expires_at >= NOW()
            ORDER BY created_at DESC
            "#,
        )
        .bind(workspace_id)
        .fetch_all(pool)
        .await?;

        Ok(invitations)
    }

    pub async fn revoke(pool: &PgPool, workspace_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM workspace_invitations WHERE id = $1 AND workspace_id = $2 AND accepted_at IS NULL",
        )
        .bind(id)
        .bind(workspace_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Accepts a workspace invitation
    ///
    /// In one transaction: stamps `accepted_at`, adds the organization
    /// membership if missing, then adds the workspace membership.
    pub async fn accept(
        pool: &PgPool,
        token: &str,
        user_id: Uuid,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, InvitationError> {
        let invitation = Self::find_by_token(pool, token)
            .await?
            .ok_or(InvitationError::NotFound)?;

        if invitation.email != normalize_email(user_email) {
            return Err(InvitationError::EmailMismatch);
        }
        invitation.status(now).ensure_usable()?;

        let mut tx = pool.begin().await?;

        let accepted = sqlx::query_as::<_, WorkspaceInvitation>(
            r#"
            UPDATE workspace_invitations
            SET accepted_at = $2
            WHERE id = $1 AND accepted_at IS NULL
            RETURNING id, workspace_id, email, role, token, invited_by, expires_at,
                      accepted_at, created_at
            "#,
        )
        .bind(invitation.id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(InvitationError::AlreadyAccepted)?;

        sqlx::query(
            r#"
            INSERT INTO organization_members (organization_id, user_id, role)
            SELECT organization_id, $2, $3 FROM workspaces WHERE id = $1
            ON CONFLICT (organization_id, user_id) DO NOTHING
            "#,
        )
        .bind(accepted.workspace_id)
        .bind(user_id)
        .bind(OrganizationRole::Member)
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO workspace_members (workspace_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (workspace_id, user_id) DO NOTHING
            "#,
        )
        .bind(accepted.workspace_id)
        .bind(user_id)
        .bind(accepted.role)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(InvitationError::AlreadyMember);
        }

        if let Some(inviter) = accepted.invited_by {
            let body = format!("{} joined your workspace.", accepted.email);
            let link = format!("/workspaces/{}", accepted.workspace_id);
            UserNotification::create(
                &mut *tx,
                NewNotification {
                    user_id: inviter,
                    kind: kind::INVITATION_ACCEPTED,
                    title: "Invitation accepted",
                    body: &body,
                    link: Some(link.as_str()),
                },
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            invitation_id = %accepted.id,
            workspace_id = %accepted.workspace_id,
            user_id = %user_id,
            "Workspace invitation accepted"
        );
        Ok(accepted)
    }

    /// Deletes workspace invitations that expired before `cutoff` unaccepted
    pub async fn delete_expired_before(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM workspace_invitations WHERE accepted_at IS NULL AND expires_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invitation(expires_at: DateTime<Utc>, accepted_at: Option<DateTime<Utc>>) -> WorkspaceInvitation {
        WorkspaceInvitation {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            email: "dev@example.com".to_string(),
            role: WorkspaceRole::Editor,
            token: generate_invitation_token(),
            invited_by: None,
            expires_at,
            accepted_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_uses_shared_rules() {
        let now = Utc::now();
        assert!(invitation(now + Duration::hours(1), None).status(now).valid);
        assert!(invitation(now - Duration::hours(1), None).status(now).is_expired);
        assert!(invitation(now + Duration::hours(1), Some(now)).status(now).is_accepted);
    }

    #[test]
    fn test_token_not_serialized() {
        let json = serde_json::to_value(invitation(Utc::now(), None)).unwrap();
        assert!(json.get("token").is_none());
        assert_eq!(json["role"], "EDITOR");
    }
}
