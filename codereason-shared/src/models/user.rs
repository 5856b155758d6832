/// User model and database operations
///
/// Users are never registered through this service. The identity provider owns
/// credentials; a `users` row is created the first time a verified subject
/// reaches the API and is keyed by that subject from then on.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     subject VARCHAR(255) NOT NULL UNIQUE,
///     email VARCHAR(320) NOT NULL,
///     name VARCHAR(255),
///     avatar_url VARCHAR(512),
///     subscription_tier subscription_tier NOT NULL DEFAULT 'FREE',
///     trial_started_at TIMESTAMPTZ,
///     trial_ends_at TIMESTAMPTZ,
///     is_trial_active BOOLEAN NOT NULL DEFAULT FALSE,
///     referral_code VARCHAR(16) NOT NULL UNIQUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use codereason_shared::models::user::{IdentityProfile, User};
/// use codereason_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let profile = IdentityProfile {
///     subject: "user_2abc".to_string(),
///     email: "dev@example.com".to_string(),
///     name: Some("Dev".to_string()),
/// };
///
/// let user = User::find_or_create(&pool, &profile).await?;
/// println!("User {} is on {}", user.id, user.subscription_tier.as_str());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Subscription tiers gating usage quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_tier", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionTier {
    /// Default tier for every new user
    Free,

    /// Time-boxed promotional elevation
    Trial,

    /// Paid tier
    Pro,

    /// Custom contract, unlimited usage
    Enterprise,
}

impl SubscriptionTier {
    /// Converts tier to its stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "FREE",
            SubscriptionTier::Trial => "TRIAL",
            SubscriptionTier::Pro => "PRO",
            SubscriptionTier::Enterprise => "ENTERPRISE",
        }
    }

    /// Tier used for quota lookups
    ///
    /// An active trial lifts a FREE user to TRIAL. Paid tiers are never
    /// lowered by the trial flag.
    pub fn effective(self, trial_active: bool) -> Self {
        match (self, trial_active) {
            (SubscriptionTier::Free, true) => SubscriptionTier::Trial,
            (tier, _) => tier,
        }
    }
}

/// User account mirrored from the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Stable subject identifier issued by the identity provider
    pub subject: String,

    /// Email address, stored lowercase
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// Optional avatar URL
    pub avatar_url: Option<String>,

    /// Current subscription tier
    pub subscription_tier: SubscriptionTier,

    /// When the trial started (None if never trialed)
    pub trial_started_at: Option<DateTime<Utc>>,

    /// When the trial ends or ended
    pub trial_ends_at: Option<DateTime<Utc>>,

    /// Whether the trial is still flagged active
    pub is_trial_active: bool,

    /// Code other users redeem to credit this user
    pub referral_code: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Tier used for quota lookups, taking the trial flag into account
    pub fn effective_tier(&self) -> SubscriptionTier {
        self.subscription_tier.effective(self.is_trial_active)
    }

    /// Whether a trial was ever started for this user
    pub fn has_used_trial(&self) -> bool {
        self.trial_started_at.is_some()
    }
}

/// Identity attributes carried by a verified token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityProfile {
    /// Stable subject identifier
    pub subject: String,

    /// Email address
    pub email: String,

    /// Optional display name
    pub name: Option<String>,
}

/// Input for updating a user's profile
///
/// All fields are optional. Only non-None fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    /// New display name (use Some(None) to clear)
    pub name: Option<Option<String>>,

    /// New avatar URL (use Some(None) to clear)
    pub avatar_url: Option<Option<String>>,
}

/// Alphabet for referral codes (no 0/O/1/I to avoid transcription mistakes)
const REFERRAL_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated referral codes
pub const REFERRAL_CODE_LEN: usize = 8;

/// Generates a random referral code
pub fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| REFERRAL_ALPHABET[rng.gen_range(0..REFERRAL_ALPHABET.len())] as char)
        .collect()
}

/// Normalizes an email address for storage and comparison
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, subject, email, name, avatar_url, subscription_tier,
                   trial_started_at, trial_ends_at, is_trial_active, referral_code,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by identity provider subject
    pub async fn find_by_subject(pool: &PgPool, subject: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, subject, email, name, avatar_url, subscription_tier,
                   trial_started_at, trial_ends_at, is_trial_active, referral_code,
                   created_at, updated_at
            FROM users
            WHERE subject = $1
            "#,
        )
        .bind(subject)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by referral code (case-insensitive)
    pub async fn find_by_referral_code(
        pool: &PgPool,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, subject, email, name, avatar_url, subscription_tier,
                   trial_started_at, trial_ends_at, is_trial_active, referral_code,
                   created_at, updated_at
            FROM users
            WHERE referral_code = $1
            "#,
        )
        .bind(code.trim().to_uppercase())
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Returns the user for a verified identity, creating it on first sign-in
    ///
    /// Concurrent first requests for the same subject converge on one row:
    /// the insert is `ON CONFLICT (subject) DO NOTHING` and the loser re-reads.
    /// A referral code collision is retried with a fresh code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable or every referral code
    /// attempt collides.
    pub async fn find_or_create(pool: &PgPool, profile: &IdentityProfile) -> Result<Self, sqlx::Error> {
        if let Some(user) = Self::find_by_subject(pool, &profile.subject).await? {
            return Ok(user);
        }

        let email = normalize_email(&profile.email);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let inserted = sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (subject, email, name, referral_code)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (subject) DO NOTHING
                RETURNING id, subject, email, name, avatar_url, subscription_tier,
                          trial_started_at, trial_ends_at, is_trial_active, referral_code,
                          created_at, updated_at
                "#,
            )
            .bind(&profile.subject)
            .bind(&email)
            .bind(&profile.name)
            .bind(generate_referral_code())
            .fetch_optional(pool)
            .await;

            match inserted {
                Ok(Some(user)) => {
                    tracing::info!(user_id = %user.id, subject = %user.subject, "Created user on first sign-in");
                    return Ok(user);
                }
                Ok(None) => {
                    return Self::find_by_subject(pool, &profile.subject)
                        .await?
                        .ok_or(sqlx::Error::RowNotFound);
                }
                Err(sqlx::Error::Database(db_err))
                    if attempts < 3
                        && db_err.constraint() == Some("users_referral_code_key") =>
                {
                    tracing::debug!("Referral code collision, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Updates a user's profile
    ///
    /// Only non-None fields in `data` will be updated.
    ///
    /// # Returns
    ///
    /// The updated user if found, None if user doesn't exist
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.avatar_url.is_some() {
            bind_count += 1;
            query.push_str(&format!(", avatar_url = ${}", bind_count));
        }

        query.push_str(
            " WHERE id = $1 RETURNING id, subject, email, name, avatar_url, subscription_tier, \
             trial_started_at, trial_ends_at, is_trial_active, referral_code, created_at, updated_at",
        );

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(avatar_url) = data.avatar_url {
            q = q.bind(avatar_url);
        }

        q.fetch_optional(pool).await
    }

    /// Sets a user's subscription tier (billing webhook / admin path)
    pub async fn set_tier(
        pool: &PgPool,
        id: Uuid,
        tier: SubscriptionTier,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET subscription_tier = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, subject, email, name, avatar_url, subscription_tier,
                      trial_started_at, trial_ends_at, is_trial_active, referral_code,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(tier)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Deletes a user and everything they own
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
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
    fn test_tier_serializes_uppercase() {
        let json = serde_json::to_string(&SubscriptionTier::Enterprise).unwrap();
        assert_eq!(json, "\"ENTERPRISE\"");
    }

    #[test]
    fn test_effective_tier() {
        assert_eq!(SubscriptionTier::Free.effective(true), SubscriptionTier::Trial);
        assert_eq!(SubscriptionTier::Free.effective(false), SubscriptionTier::Free);
        assert_eq!(SubscriptionTier::Pro.effective(true), SubscriptionTier::Pro);
        assert_eq!(SubscriptionTier::Enterprise.effective(false), SubscriptionTier::Enterprise);
    }

    #[test]
    fn test_referral_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), REFERRAL_CODE_LEN);
        assert!(code.bytes().all(|b| REFERRAL_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Dev@Example.COM "), "dev@example.com");
    }

    #[test]
    fn test_update_user_default() {
        let update = UpdateUser::default();
        assert!(update.name.is_none());
        assert!(update.avatar_url.is_none());
    }
}
