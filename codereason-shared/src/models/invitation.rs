/// Organization invitations
///
/// An invitation is a single-use token addressed to an email address. It is
/// validated by plain equality lookup; there is nothing to verify
/// cryptographically.
///
/// # Status
///
/// `is_expired` and `is_accepted` are computed independently: an accepted
/// invitation whose expiry has also passed reports both. It is valid only
/// when neither holds.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE invitations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     email VARCHAR(320) NOT NULL,
///     role organization_role NOT NULL DEFAULT 'MEMBER',
///     token VARCHAR(128) NOT NULL UNIQUE,
///     invited_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     expires_at TIMESTAMPTZ NOT NULL,
///     accepted_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use codereason_shared::models::invitation::Invitation;
/// use chrono::Utc;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let detail = Invitation::validate(&pool, "4f9c...", org_id, Utc::now()).await?;
/// if detail.valid {
///     println!("Invitation for {} is usable", detail.email);
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::notification::{kind, NewNotification, UserNotification};
use super::organization_member::OrganizationRole;
use super::user::normalize_email;

/// Days an invitation stays usable
pub const INVITATION_TTL_DAYS: i64 = 7;

/// Random bytes in an invitation token (hex-encoded to twice this length)
const TOKEN_BYTES: usize = 32;

/// Invitation lookup and acceptance errors
#[derive(Debug, Error)]
pub enum InvitationError {
    #[error("Invitation not found")]
    NotFound,

    #[error("Invitation does not belong to this {0}")]
    TargetMismatch(&'static str),

    #[error("Invitation has expired")]
    Expired,

    #[error("Invitation has already been accepted")]
    AlreadyAccepted,

    #[error("Invitation was sent to a different email address")]
    EmailMismatch,

    #[error("User is already a member")]
    AlreadyMember,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Expiry and acceptance state of an invitation at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationStatus {
    pub valid: bool,
    pub is_expired: bool,
    pub is_accepted: bool,
}

impl InvitationStatus {
    pub fn evaluate(
        expires_at: DateTime<Utc>,
        accepted_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let is_expired = expires_at < now;
        let is_accepted = accepted_at.is_some();

        Self {
            valid: !is_expired && !is_accepted,
            is_expired,
            is_accepted,
        }
    }

    /// Maps an unusable status to the error acceptance should report
    pub fn ensure_usable(&self) -> Result<(), InvitationError> {
        if self.is_accepted {
            Err(InvitationError::AlreadyAccepted)
        } else if self.is_expired {
            Err(InvitationError::Expired)
        } else {
            Ok(())
        }
    }
}

/// Generates a random hex invitation token
pub fn generate_invitation_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::random();
    hex::encode(bytes)
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: Uuid,
    pub organization_id: Uuid,

    /// Invitee address, stored lowercase
    pub email: String,

    /// Role granted on acceptance
    pub role: OrganizationRole,

    /// Never serialized back to clients after creation
    #[serde(skip_serializing)]
    pub token: String,

    pub invited_by: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// What the validation endpoint reports about a token
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InvitationDetail {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub email: String,
    pub role: OrganizationRole,
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

impl InvitationDetail {
    fn with_status(mut self, now: DateTime<Utc>) -> Self {
        let status = InvitationStatus::evaluate(self.expires_at, self.accepted_at, now);
        self.valid = status.valid;
        self.is_expired = status.is_expired;
        self.is_accepted = status.is_accepted;
        self
    }
}

impl Invitation {
    /// Status of this invitation at `now`
    pub fn status(&self, now: DateTime<Utc>) -> InvitationStatus {
        InvitationStatus::evaluate(self.expires_at, self.accepted_at, now)
    }

    /// Creates an invitation valid for [`INVITATION_TTL_DAYS`]
    pub async fn create(
        pool: &PgPool,
        organization_id: Uuid,
        email: &str,
        role: OrganizationRole,
        invited_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let expires_at = Utc::now() + Duration::days(INVITATION_TTL_DAYS);

        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO invitations (organization_id, email, role, token, invited_by, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, organization_id, email, role, token, invited_by, expires_at,
                      accepted_at, created_at
            "#,
        )
        .bind(organization_id)
        .bind(normalize_email(email))
        .bind(role)
        .bind(generate_invitation_token())
        .bind(invited_by)
        .bind(expires_at)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            invitation_id = %invitation.id,
            organization_id = %organization_id,
            "Organization invitation created"
        );
        Ok(invitation)
    }

    pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Option<Self>, sqlx::Error> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT id, organization_id, email, role, token, invited_by, expires_at,
                   accepted_at, created_at
            FROM invitations
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?;

        Ok(invitation)
    }

    /// Looks up a token and checks it targets `organization_id`
    ///
    /// # Errors
    ///
    /// - `NotFound` when no invitation has this token
    /// - `TargetMismatch` when it belongs to another organization
    pub async fn validate(
        pool: &PgPool,
        token: &str,
        organization_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<InvitationDetail, InvitationError> {
        let detail = sqlx::query_as::<_, InvitationDetail>(
            r#"
            SELECT i.id, i.organization_id, o.name AS organization_name, i.email, i.role,
                   u.name AS inviter_name, i.expires_at, i.accepted_at
            FROM invitations i
            JOIN organizations o ON o.id = i.organization_id
            LEFT JOIN users u ON u.id = i.invited_by
            WHERE i.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or(InvitationError::NotFound)?;

        if detail.organization_id != organization_id {
            return Err(InvitationError::TargetMismatch("organization"));
        }

        Ok(detail.with_status(now))
    }

    /// Pending (unaccepted, unexpired) invitations of an organization
    pub async fn list_pending(
        pool: &PgPool,
        organization_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let invitations = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT id, organization_id, email, role, token, invited_by, expires_at,
                   accepted_at, created_at
            FROM invitations
            WHERE organization_id = $1 AND accepted_at IS NULL AND expires_at >= NOW()
            ORDER BY created_at DESC
            "#,
        )
        .bind(organization_id)
        .fetch_all(pool)
        .await?;

        Ok(invitations)
    }

    /// Revokes an unaccepted invitation
    pub async fn revoke(pool: &PgPool, organization_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM invitations WHERE id = $1 AND organization_id = $2 AND accepted_at IS NULL",
        )
        .bind(id)
        .bind(organization_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Accepts an invitation on behalf of a signed-in user
    ///
    /// Inserts the membership, stamps `accepted_at` and notifies the inviter in
    /// one transaction.
    /// The stamp is conditional on `accepted_at IS NULL`, so two concurrent
    /// acceptances of the same token cannot both succeed.
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

        let accepted = sqlx::query_as::<_, Invitation>(
            r#"
            UPDATE invitations
            SET accepted_at = $2
            WHERE id = $1 AND accepted_at IS NULL
            RETURNING id, organization_id, email, role, token, invited_by, expires_at,
                      accepted_at, created_at
            "#,
        )
        .bind(invitation.id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(InvitationError::AlreadyAccepted)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO organization_members (organization_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (organization_id, user_id) DO NOTHING
            "#,
        )
        .bind(accepted.organization_id)
        .bind(user_id)
        .bind(accepted.role)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(InvitationError::AlreadyMember);
        }

        if let Some(inviter) = accepted.invited_by {
            let body = format!("{} accepted your invitation.", accepted.email);
            let link = format!("/organizations/{}/members", accepted.organization_id);
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
            organization_id = %accepted.organization_id,
            user_id = %user_id,
            "Organization invitation accepted"
        );
        Ok(accepted)
    }

    /// Deletes invitations that expired before `cutoff` without being accepted
    pub async fn delete_expired_before(
        pool: &PgPool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM invitations WHERE accepted_at IS NULL AND expires_at < $1")
                .bind(cutoff)
                .execute(pool)
                .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_fresh_invitation_is_valid() {
        let now = Utc::now();
        let status = InvitationStatus::evaluate(now + Duration::days(1), None, now);
        assert!(status.valid);
        assert!(!status.is_expired);
        assert!(!status.is_accepted);
        assert!(status.ensure_usable().is_ok());
    }

    #[test]
    fn test_status_expired() {
        let now = Utc::now();
        let status = InvitationStatus::evaluate(now - Duration::seconds(1), None, now);
        assert!(!status.valid);
        assert!(status.is_expired);
        assert!(!status.is_accepted);
        assert!(matches!(status.ensure_usable(), Err(InvitationError::Expired)));
    }

    #[test]
    fn test_status_accepted_and_expired_are_independent() {
        let now = Utc::now();
        let accepted = Some(now - Duration::days(3));

        let both = InvitationStatus::evaluate(now - Duration::days(1), accepted, now);
        assert!(both.is_expired);
        assert!(both.is_accepted);
        assert!(!both.valid);

        let accepted_only = InvitationStatus::evaluate(now + Duration::days(1), accepted, now);
        assert!(!accepted_only.is_expired);
        assert!(accepted_only.is_accepted);
        assert!(matches!(accepted_only.ensure_usable(), Err(InvitationError::AlreadyAccepted)));
    }

    #[test]
    fn test_status_expiry_boundary() {
        let now = Utc::now();
        let status = InvitationStatus::evaluate(now, None, now);
        assert!(!status.is_expired, "expiry is strict: expires_at == now is still valid");
    }

    #[test]
    fn test_token_shape() {
        let token = generate_invitation_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_invitation_token());
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let now = Utc::now();
        let json = serde_json::to_value(InvitationStatus::evaluate(now, None, now)).unwrap();
        assert_eq!(json["isExpired"], false);
        assert_eq!(json["isAccepted"], false);
        assert_eq!(json["valid"], true);
    }
}
