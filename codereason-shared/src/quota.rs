/// Usage limits per subscription tier
///
/// Limits are monthly and static. A limit of `-1` means unlimited. Usage is
/// the number of rows created since the first instant of the current UTC
/// calendar month.
///
/// # Limits by Tier
///
/// | tier       | billing analyses | PR reviews | owned organizations |
/// |------------|------------------|------------|---------------------|
/// | FREE       | 10               | 5          | 1                   |
/// | TRIAL      | 10               | 5          | 3                   |
/// | PRO        | 1,000            | 100        | 10                  |
/// | ENTERPRISE | unlimited        | unlimited  | unlimited           |
///
/// Billing analyses and PR reviews are separate tables on purpose: the
/// billing page counts every analysis in an organization, the PR review
/// quota counts one user's PR reviews.
///
/// The trial flag lifts a FREE user to TRIAL for lookups (see
/// [`SubscriptionTier::effective`]).
///
/// # Example
///
/// ```no_run
/// use codereason_shared::quota::QuotaEnforcer;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let enforcer = QuotaEnforcer::new(pool);
///
/// let usage = enforcer.organization_usage(org_id).await?;
/// println!("{}/{} analyses, {} left", usage.analyses_run, usage.analyses_limit, usage.remaining);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::analysis::{Analysis, AnalysisKind};
use crate::models::organization::Organization;
use crate::models::user::SubscriptionTier;
use crate::trial::{resolve_trial_status, TrialError};

/// Quota enforcement error
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("{} limit exceeded ({}/{})", .quota_type.as_str(), .used, .limit)]
    LimitExceeded {
        quota_type: QuotaType,
        limit: i64,
        used: i64,
    },

    #[error("Organization not found: {0}")]
    OrganizationNotFound(Uuid),

    #[error(transparent)]
    Trial(#[from] TrialError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Which monthly quota is being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaType {
    /// Analyses across an organization (billing page)
    BillingAnalyses,

    /// PR reviews run by one user
    PrReviews,

    /// Organizations owned by one user (not monthly)
    Organizations,
}

impl QuotaType {
    /// Human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaType::BillingAnalyses => "Monthly analyses",
            QuotaType::PrReviews => "Monthly PR reviews",
            QuotaType::Organizations => "Organizations",
        }
    }
}

/// A limit, where `-1` is unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quota(i64);

impl Quota {
    pub const UNLIMITED: Quota = Quota(-1);

    pub const fn limited(limit: i64) -> Self {
        Quota(limit)
    }

    pub fn is_unlimited(&self) -> bool {
        self.0 < 0
    }

    /// Raw value, `-1` for unlimited
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// `max(0, limit - used)`, or `-1` when unlimited
    pub fn remaining(&self, used: i64) -> i64 {
        if self.is_unlimited() {
            -1
        } else {
            (self.0 - used).max(0)
        }
    }

    /// Whether one more unit fits
    pub fn allows(&self, used: i64) -> bool {
        self.is_unlimited() || used < self.0
    }
}

/// Monthly analyses shown on the billing page
pub fn billing_analysis_limit(tier: SubscriptionTier, trial_active: bool) -> Quota {
    match tier.effective(trial_active) {
        SubscriptionTier::Free | SubscriptionTier::Trial => Quota::limited(10),
        SubscriptionTier::Pro => Quota::limited(1_000),
        SubscriptionTier::Enterprise => Quota::UNLIMITED,
    }
}

/// Monthly PR reviews per user
pub fn pr_review_limit(tier: SubscriptionTier, trial_active: bool) -> Quota {
    match tier.effective(trial_active) {
        SubscriptionTier::Free | SubscriptionTier::Trial => Quota::limited(5),
        SubscriptionTier::Pro => Quota::limited(100),
        SubscriptionTier::Enterprise => Quota::UNLIMITED,
    }
}

/// Organizations a user may own
pub fn organization_limit(tier: SubscriptionTier, trial_active: bool) -> Quota {
    match tier.effective(trial_active) {
        SubscriptionTier::Free => Quota::limited(1),
        SubscriptionTier::Trial => Quota::limited(3),
        SubscriptionTier::Pro => Quota::limited(10),
        SubscriptionTier::Enterprise => Quota::UNLIMITED,
    }
}

/// First instant of `now`'s calendar month, UTC
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Billing usage of an organization for the current month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub analyses_run: i64,
    pub analyses_limit: i64,
    pub remaining: i64,

    /// Tier the limit was taken from
    pub tier: SubscriptionTier,
}

impl UsageReport {
    pub fn new(tier: SubscriptionTier, limit: Quota, used: i64) -> Self {
        UsageReport {
            analyses_run: used,
            analyses_limit: limit.as_i64(),
            remaining: limit.remaining(used),
            tier,
        }
    }
}

/// Result of quota check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCheckResult {
    /// Whether one more unit is within quota
    pub allowed: bool,

    pub used: i64,

    /// Raw limit, `-1` for unlimited
    pub limit: i64,

    pub remaining: i64,
}

impl QuotaCheckResult {
    pub fn evaluate(limit: Quota, used: i64) -> Self {
        QuotaCheckResult {
            allowed: limit.allows(used),
            used,
            limit: limit.as_i64(),
            remaining: limit.remaining(used),
        }
    }

    fn into_enforced(self, quota_type: QuotaType) -> Result<Self, QuotaError> {
        if self.allowed {
            Ok(self)
        } else {
            Err(QuotaError::LimitExceeded {
                quota_type,
                limit: self.limit,
                used: self.used,
            })
        }
    }
}

/// Quota enforcement service
///
/// Resolves trials before every lookup, so an expired trial never grants
/// trial limits.
#[derive(Clone)]
pub struct QuotaEnforcer {
    db: PgPool,
}

impl QuotaEnforcer {
    pub fn new(db: PgPool) -> Self {
        QuotaEnforcer { db }
    }

    /// Billing usage of an organization this month
    ///
    /// The limit comes from the organization owner's tier.
    ///
    /// # Errors
    ///
    /// `OrganizationNotFound` for an unknown organization.
    pub async fn organization_usage(&self, organization_id: Uuid) -> Result<UsageReport, QuotaError> {
        let now = Utc::now();
        let org = Organization::find_by_id(&self.db, organization_id)
            .await?
            .ok_or(QuotaError::OrganizationNotFound(organization_id))?;

        let owner = resolve_trial_status(&self.db, org.owner_id, now).await?;
        let tier = owner.status.tier;
        let limit = billing_analysis_limit(tier, false);
        let used =
            Analysis::count_for_organization_since(&self.db, organization_id, month_start(now)).await?;

        Ok(UsageReport::new(tier, limit, used))
    }

    /// PR reviews run by a user this month
    pub async fn review_usage(&self, user_id: Uuid) -> Result<QuotaCheckResult, QuotaError> {
        let now = Utc::now();
        let user = resolve_trial_status(&self.db, user_id, now).await?;
        let limit = pr_review_limit(user.status.tier, false);
        let used = Analysis::count_for_user_since(
            &self.db,
            user_id,
            AnalysisKind::PrReview,
            month_start(now),
        )
        .await?;

        Ok(QuotaCheckResult::evaluate(limit, used))
    }

    /// Organizations a user owns, against their limit
    pub async fn organization_count(&self, user_id: Uuid) -> Result<QuotaCheckResult, QuotaError> {
        let user = resolve_trial_status(&self.db, user_id, Utc::now()).await?;
        let limit = organization_limit(user.status.tier, false);
        let used = Organization::count_owned_by(&self.db, user_id).await?;

        Ok(QuotaCheckResult::evaluate(limit, used))
    }

    /// Fails with `LimitExceeded` when the user has no PR reviews left
    pub async fn enforce_review(&self, user_id: Uuid) -> Result<QuotaCheckResult, QuotaError> {
        self.review_usage(user_id)
            .await?
            .into_enforced(QuotaType::PrReviews)
    }

    /// Fails with `LimitExceeded` when the user can't own another organization
    pub async fn enforce_organization(&self, user_id: Uuid) -> Result<QuotaCheckResult, QuotaError> {
        self.organization_count(user_id)
            .await?
            .into_enforced(QuotaType::Organizations)
    }
}
