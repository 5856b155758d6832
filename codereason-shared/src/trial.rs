/// Trial status resolution
///
/// A trial is a time-boxed elevation of a FREE user to TRIAL. The stored
/// state is `trial_started_at`, `trial_ends_at` and `is_trial_active` on the
/// user row. Once `trial_ends_at` passes, the next read flips the flag off and
/// drops a TRIAL tier back to FREE.
///
/// # Transition
///
/// ```text
/// FREE (never trialed) --start_trial--> TRIAL, active
/// TRIAL, active --trial_ends_at < now--> FREE, inactive
/// ```
///
/// The expiry transition is a single conditional UPDATE
/// (`WHERE is_trial_active = TRUE AND trial_ends_at < now`). Concurrent
/// resolvers race on that row lock; exactly one sees `RETURNING` produce a
/// row, and only that one writes the `TRIAL_EXPIRED` notification. Every
/// other caller re-reads the already-expired user.
///
/// # Example
///
/// ```no_run
/// use codereason_shared::trial::resolve_trial_status;
/// use chrono::Utc;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let resolved = resolve_trial_status(&pool, user_id, Utc::now()).await?;
/// println!(
///     "active={} days_remaining={}",
///     resolved.status.is_trial_active, resolved.status.days_remaining
/// );
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::notification::{kind, NewNotification, UserNotification};
use crate::models::user::{SubscriptionTier, User};

/// Default trial length in days
pub const DEFAULT_TRIAL_DAYS: i64 = 14;

const TRIAL_EXPIRED_TITLE: &str = "Your trial has ended";
const TRIAL_EXPIRED_BODY: &str =
    "Your trial has ended and your account is back on the Free plan. Upgrade to keep higher limits.";
const BILLING_LINK: &str = "/settings/billing";

#[derive(Debug, Error)]
pub enum TrialError {
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("A trial has already been used on this account")]
    AlreadyUsed,

    #[error("Trials are only available on the Free plan (current: {})", .0.as_str())]
    NotEligible(SubscriptionTier),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Trial state of a user at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialStatus {
    /// Trial flagged active and not past its end
    pub is_trial_active: bool,

    /// A trial was started and its end has passed
    pub is_expired: bool,

    pub trial_started_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,

    /// Whole days left, rounded up; 0 when inactive
    pub days_remaining: i64,

    /// Tier used for quota lookups
    pub tier: SubscriptionTier,
}

impl TrialStatus {
    /// Evaluates a user's trial without touching the database
    ///
    /// A user whose stored flag is still set but whose end has passed is
    /// reported as the expiry transition would leave them.
    pub fn evaluate(user: &User, now: DateTime<Utc>) -> Self {
        let due = is_expiry_due(user, now);
        let is_trial_active = user.is_trial_active && !due;
        let is_expired = user.trial_started_at.is_some()
            && user.trial_ends_at.map_or(false, |ends| ends < now);

        let days_remaining = match (is_trial_active, user.trial_ends_at) {
            (true, Some(ends)) => ceil_days(ends - now),
            _ => 0,
        };

        let stored = if due {
            downgraded_tier(user.subscription_tier)
        } else {
            user.subscription_tier
        };

        TrialStatus {
            is_trial_active,
            is_expired,
            trial_started_at: user.trial_started_at,
            trial_ends_at: user.trial_ends_at,
            days_remaining,
            tier: stored.effective(is_trial_active),
        }
    }
}

/// Whether the stored state still needs the expiry transition
pub fn is_expiry_due(user: &User, now: DateTime<Utc>) -> bool {
    user.is_trial_active && user.trial_ends_at.map_or(false, |ends| ends < now)
}

fn downgraded_tier(tier: SubscriptionTier) -> SubscriptionTier {
    match tier {
        SubscriptionTier::Trial => SubscriptionTier::Free,
        other => other,
    }
}

fn ceil_days(left: Duration) -> i64 {
    let secs = left.num_seconds().max(0);
    (secs + 86_399) / 86_400
}

/// Outcome of [`resolve_trial_status`]
#[derive(Debug, Clone)]
pub struct ResolvedTrial {
    /// User row after any transition
    pub user: User,

    pub status: TrialStatus,

    /// True only for the call that performed the expiry
    pub expired_now: bool,
}

/// Reads a user's trial state, expiring it when its end has passed
///
/// # Errors
///
/// Returns `UserNotFound` for an unknown ID, `Database` otherwise.
pub async fn resolve_trial_status(
    pool: &PgPool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<ResolvedTrial, TrialError> {
    let user = User::find_by_id(pool, user_id)
        .await?
        .ok_or(TrialError::UserNotFound(user_id))?;

    if !is_expiry_due(&user, now) {
        let status = TrialStatus::evaluate(&user, now);
        return Ok(ResolvedTrial {
            user,
            status,
            expired_now: false,
        });
    }

    let mut tx = pool.begin().await?;

    let flipped = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET is_trial_active = FALSE,
            subscription_tier = CASE WHEN subscription_tier = 'TRIAL'
                                     THEN 'FREE'::subscription_tier
                                     ELSE subscription_tier END,
            updated_at = NOW()
        WHERE id = $1 AND is_trial_active = TRUE AND trial_ends_at < $2
        RETURNING id, subject, email, name, avatar_url, subscription_tier,
                  trial_started_at, trial_ends_at, is_trial_active, referral_code,
                  created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(user) = flipped else {
        // Another request expired it first
        tx.rollback().await?;
        let user = User::find_by_id(pool, user_id)
            .await?
            .ok_or(TrialError::UserNotFound(user_id))?;
        let status = TrialStatus::evaluate(&user, now);
        return Ok(ResolvedTrial {
            user,
            status,
            expired_now: false,
        });
    };

    UserNotification::create(
        &mut *tx,
        NewNotification {
            user_id,
            kind: kind::TRIAL_EXPIRED,
            title: TRIAL_EXPIRED_TITLE,
            body: TRIAL_EXPIRED_BODY,
            link: Some(BILLING_LINK),
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, "Trial expired");

    let status = TrialStatus::evaluate(&user, now);
    Ok(ResolvedTrial {
        user,
        status,
        expired_now: true,
    })
}

/// Starts a trial of `days` days for a FREE user who never had one
///
/// # Errors
///
/// - `AlreadyUsed` when the user has trialed before
/// - `NotEligible` when the user is on a paid tier
pub async fn start_trial(
    pool: &PgPool,
    user_id: Uuid,
    now: DateTime<Utc>,
    days: i64,
) -> Result<User, TrialError> {
    let ends_at = now + Duration::days(days);
    let mut tx = pool.begin().await?;

    let started = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET subscription_tier = 'TRIAL',
            trial_started_at = $2,
            trial_ends_at = $3,
            is_trial_active = TRUE,
            updated_at = NOW()
        WHERE id = $1 AND trial_started_at IS NULL AND subscription_tier = 'FREE'
        RETURNING id, subject, email, name, avatar_url, subscription_tier,
                  trial_started_at, trial_ends_at, is_trial_active, referral_code,
                  created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(now)
    .bind(ends_at)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(user) = started else {
        tx.rollback().await?;
        let user = User::find_by_id(pool, user_id)
            .await?
            .ok_or(TrialError::UserNotFound(user_id))?;
        return Err(if user.has_used_trial() {
            TrialError::AlreadyUsed
        } else {
            TrialError::NotEligible(user.subscription_tier)
        });
    };

    let body = format!("Your {}-day trial is active. Enjoy the higher limits.", days);
    UserNotification::create(
        &mut *tx,
        NewNotification {
            user_id,
            kind: kind::TRIAL_STARTED,
            title: "Trial started",
            body: &body,
            link: Some(BILLING_LINK),
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, ends_at = %ends_at, "Trial started");
    Ok(user)
}

/// Expires every trial whose end has passed
///
/// Same guard as [`resolve_trial_status`], applied to all rows at once, with
/// one notification per expired user. Returns the number of users expired.
pub async fn expire_due_trials(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, TrialError> {
    let result = sqlx::query(
        r#"
        WITH expired AS (
            UPDATE users
            SET is_trial_active = FALSE,
                subscription_tier = CASE WHEN subscription_tier = 'TRIAL'
                                         THEN 'FREE'::subscription_tier
                                         ELSE subscription_tier END,
                updated_at = NOW()
            WHERE is_trial_active = TRUE AND trial_ends_at < $1
            RETURNING id
        )
        INSERT INTO user_notifications (user_id, kind, title, body, link)
        SELECT id, $2, $3, $4, $5 FROM expired
        "#,
    )
    .bind(now)
    .bind(kind::TRIAL_EXPIRED)
    .bind(TRIAL_EXPIRED_TITLE)
    .bind(TRIAL_EXPIRED_BODY)
    .bind(BILLING_LINK)
    .execute(pool)
    .await?;

    let expired = result.rows_affected();
    if expired > 0 {
        tracing::info!(count = expired, "Expired due trials");
    }

    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(
        tier: SubscriptionTier,
        started: Option<DateTime<Utc>>,
        ends: Option<DateTime<Utc>>,
        active: bool,
    ) -> User {
        User {
            id: Uuid::new_v4(),
            subject: "user_test".to_string(),
            email: "dev@example.com".to_string(),
            name: None,
            avatar_url: None,
            subscription_tier: tier,
            trial_started_at: started,
            trial_ends_at: ends,
            is_trial_active: active,
            referral_code: "ABCDEFGH".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_never_trialed() {
        let now = Utc::now();
        let status = TrialStatus::evaluate(&user(SubscriptionTier::Free, None, None, false), now);
        assert!(!status.is_trial_active);
        assert!(!status.is_expired);
        assert_eq!(status.days_remaining, 0);
        assert_eq!(status.tier, SubscriptionTier::Free);
    }

    #[test]
    fn test_active_trial() {
        let now = Utc::now();
        let u = user(
            SubscriptionTier::Trial,
            Some(now - Duration::days(4)),
            Some(now + Duration::days(10)),
            true,
        );
        let status = TrialStatus::evaluate(&u, now);
        assert!(status.is_trial_active);
        assert!(!status.is_expired);
        assert_eq!(status.days_remaining, 10);
        assert_eq!(status.tier, SubscriptionTier::Trial);
        assert!(!is_expiry_due(&u, now));
    }

    #[test]
    fn test_partial_day_rounds_up() {
        let now = Utc::now();
        let u = user(
            SubscriptionTier::Trial,
            Some(now - Duration::days(13)),
            Some(now + Duration::hours(5)),
            true,
        );
        assert_eq!(TrialStatus::evaluate(&u, now).days_remaining, 1);
    }

    #[test]
    fn test_due_trial_reports_post_transition_state() {
        let now = Utc::now();
        let u = user(
            SubscriptionTier::Trial,
            Some(now - Duration::days(15)),
            Some(now - Duration::days(1)),
            true,
        );
        assert!(is_expiry_due(&u, now));

        let status = TrialStatus::evaluate(&u, now);
        assert!(!status.is_trial_active);
        assert!(status.is_expired);
        assert_eq!(status.days_remaining, 0);
        assert_eq!(status.tier, SubscriptionTier::Free);
    }

    #[test]
    fn test_already_expired_trial_is_stable() {
        let now = Utc::now();
        let u = user(
            SubscriptionTier::Free,
            Some(now - Duration::days(30)),
            Some(now - Duration::days(16)),
            false,
        );
        assert!(!is_expiry_due(&u, now));
        let first = TrialStatus::evaluate(&u, now);
        let second = TrialStatus::evaluate(&u, now);
        assert_eq!(first, second);
        assert!(first.is_expired);
    }

    #[test]
    fn test_paid_tier_not_downgraded_by_stale_flag() {
        let now = Utc::now();
        let u = user(
            SubscriptionTier::Pro,
            Some(now - Duration::days(20)),
            Some(now - Duration::days(6)),
            true,
        );
        assert_eq!(TrialStatus::evaluate(&u, now).tier, SubscriptionTier::Pro);
    }

    #[test]
    fn test_free_with_active_flag_counts_as_trial() {
        let now = Utc::now();
        let u = user(
            SubscriptionTier::Free,
            Some(now),
            Some(now + Duration::days(14)),
            true,
        );
        assert_eq!(TrialStatus::evaluate(&u, now).tier, SubscriptionTier::Trial);
    }

    #[test]
    fn test_trial_error_display() {
        let err = TrialError::NotEligible(SubscriptionTier::Pro);
        assert_eq!(
            err.to_string(),
            "Trials are only available on the Free plan (current: PRO)"
        );
    }
}
