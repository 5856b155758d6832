/// Referrals and referral redemption
///
/// Every user carries a referral code. Another user may redeem one code,
/// once; both parties receive [`REFERRAL_CREDIT_AMOUNT`] credits and the
/// referrer is notified.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE referrals (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     referrer_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     referee_id UUID NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT referrals_no_self CHECK (referrer_id <> referee_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::credit::Credit;
use super::notification::{kind, NewNotification, UserNotification};
use super::user::User;

/// Credits granted to each side of a redeemed referral
pub const REFERRAL_CREDIT_AMOUNT: i32 = 5;

#[derive(Debug, Error)]
pub enum ReferralError {
    #[error("Referral code not found")]
    UnknownCode,

    #[error("You cannot redeem your own referral code")]
    SelfReferral,

    #[error("A referral code has already been redeemed for this account")]
    AlreadyRedeemed,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referee_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Referral overview for the referral page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSummary {
    pub referral_code: String,
    pub referred_count: i64,
    pub credit_balance: i64,

    /// Whether this user has redeemed someone else's code
    pub has_redeemed: bool,
}

impl Referral {
    /// Referral through which `referee_id` joined, if any
    pub async fn find_by_referee(
        pool: &PgPool,
        referee_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let referral = sqlx::query_as::<_, Referral>(
            "SELECT id, referrer_id, referee_id, created_at FROM referrals WHERE referee_id = $1",
        )
        .bind(referee_id)
        .fetch_optional(pool)
        .await?;

        Ok(referral)
    }

    pub async fn count_by_referrer(pool: &PgPool, referrer_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM referrals WHERE referrer_id = $1")
            .bind(referrer_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn summary(pool: &PgPool, user: &User) -> Result<ReferralSummary, sqlx::Error> {
        let referred_count = Self::count_by_referrer(pool, user.id).await?;
        let credit_balance = Credit::balance(pool, user.id).await?;
        let has_redeemed = Self::find_by_referee(pool, user.id).await?.is_some();

        Ok(ReferralSummary {
            referral_code: user.referral_code.clone(),
            referred_count,
            credit_balance,
            has_redeemed,
        })
    }

    /// Redeems `code` for `referee`
    ///
    /// The referral row, both credit grants and the referrer's notification
    /// are written in one transaction. The unique `referee_id` column makes a
    /// second redemption fail even when two requests race.
    pub async fn redeem(pool: &PgPool, referee: &User, code: &str) -> Result<Self, ReferralError> {
        let referrer = User::find_by_referral_code(pool, code)
            .await?
            .ok_or(ReferralError::UnknownCode)?;

        if referrer.id == referee.id {
            return Err(ReferralError::SelfReferral);
        }

        let mut tx = pool.begin().await?;

        let referral = sqlx::query_as::<_, Referral>(
            r#"
            INSERT INTO referrals (referrer_id, referee_id)
            VALUES ($1, $2)
            ON CONFLICT (referee_id) DO NOTHING
            RETURNING id, referrer_id, referee_id, created_at
            "#,
        )
        .bind(referrer.id)
        .bind(referee.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ReferralError::AlreadyRedeemed)?;

        Credit::grant(&mut *tx, referrer.id, REFERRAL_CREDIT_AMOUNT, "Referral bonus").await?;
        Credit::grant(&mut *tx, referee.id, REFERRAL_CREDIT_AMOUNT, "Referral signup bonus").await?;

        let who = referee.name.as_deref().unwrap_or(&referee.email);
        let body = format!(
            "{} joined with your referral code. You earned {} credits.",
            who, REFERRAL_CREDIT_AMOUNT
        );
        UserNotification::create(
            &mut *tx,
            NewNotification {
                user_id: referrer.id,
                kind: kind::REFERRAL_REDEEMED,
                title: "Referral redeemed",
                body: &body,
                link: Some("/referrals"),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            referral_id = %referral.id,
            referrer_id = %referrer.id,
            referee_id = %referee.id,
            "Referral redeemed"
        );
        Ok(referral)
    }
}
