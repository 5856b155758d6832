/// Credit ledger
///
/// Append-only. A user's balance is the sum of their rows; grants are
/// positive, consumption negative.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE credits (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     amount INTEGER NOT NULL,
///     reason VARCHAR(255) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Credit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i32,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Credit {
    /// Appends a ledger row
    ///
    /// Takes a connection so it can join a caller's transaction
    /// (`&mut *tx`).
    pub async fn grant(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: i32,
        reason: &str,
    ) -> Result<Self, sqlx::Error> {
        let credit = sqlx::query_as::<_, Credit>(
            r#"
            INSERT INTO credits (user_id, amount, reason)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, amount, reason, created_at
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(reason)
        .fetch_one(conn)
        .await?;

        Ok(credit)
    }

    /// Current balance
    pub async fn balance(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM credits WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(balance)
    }

    /// Ledger history, newest first
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let credits = sqlx::query_as::<_, Credit>(
            r#"
            SELECT id, user_id, amount, reason, created_at
            FROM credits
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(credits)
    }
}
