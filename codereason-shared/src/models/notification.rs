/// In-app user notifications
///
/// # Schema
///
/// ```sql
/// CREATE TABLE user_notifications (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     kind VARCHAR(64) NOT NULL,
///     title VARCHAR(255) NOT NULL,
///     body TEXT NOT NULL,
///     link VARCHAR(1024),
///     read_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Notification kinds emitted by the platform
pub mod kind {
    pub const TRIAL_EXPIRED: &str = "TRIAL_EXPIRED";
    pub const TRIAL_STARTED: &str = "TRIAL_STARTED";
    pub const REFERRAL_REDEEMED: &str = "REFERRAL_REDEEMED";
    pub const INVITATION_ACCEPTED: &str = "INVITATION_ACCEPTED";
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for a new notification
#[derive(Debug, Clone)]
pub struct NewNotification<'a> {
    pub user_id: Uuid,
    pub kind: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub link: Option<&'a str>,
}

impl UserNotification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    /// Inserts a notification on the given connection
    pub async fn create(
        conn: &mut PgConnection,
        data: NewNotification<'_>,
    ) -> Result<Self, sqlx::Error> {
        let notification = sqlx::query_as::<_, UserNotification>(
            r#"
            INSERT INTO user_notifications (user_id, kind, title, body, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, kind, title, body, link, read_at, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.kind)
        .bind(data.title)
        .bind(data.body)
        .bind(data.link)
        .fetch_one(conn)
        .await?;

        Ok(notification)
    }

    /// Lists a user's notifications, newest first
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let notifications = sqlx::query_as::<_, UserNotification>(
            r#"
            SELECT id, user_id, kind, title, body, link, read_at, created_at
            FROM user_notifications
            WHERE user_id = $1 AND ($2 = FALSE OR read_at IS NULL)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(notifications)
    }

    pub async fn count_unread(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Marks one notification read
    ///
    /// Scoped to `user_id`; returns None when the notification doesn't exist
    /// or belongs to someone else. Already-read rows keep their timestamp.
    pub async fn mark_read(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let notification = sqlx::query_as::<_, UserNotification>(
            r#"
            UPDATE user_notifications
            SET read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, kind, title, body, link, read_at, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(notification)
    }

    /// Marks every unread notification of a user read
    pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_notifications SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
