/// Integration tests for trials, invitations and referrals
///
/// Skipped when `DATABASE_URL` is unset.

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{Duration, Utc};
use codereason_shared::auth::jwt::{create_token, IdentityClaims};
use codereason_shared::auth::middleware::authenticate;
use codereason_shared::db::migrations::run_migrations;
use codereason_shared::models::credit::Credit;
use codereason_shared::models::invitation::{Invitation, InvitationError};
use codereason_shared::models::notification::{kind, UserNotification};
use codereason_shared::models::organization::{CreateOrganization, Organization};
use codereason_shared::models::organization_member::{OrganizationMember, OrganizationRole};
use codereason_shared::models::referral::{Referral, ReferralError, REFERRAL_CREDIT_AMOUNT};
use codereason_shared::models::user::{IdentityProfile, SubscriptionTier, User};
use codereason_shared::quota::{QuotaEnforcer, QuotaError};
use codereason_shared::trial::{expire_due_trials, resolve_trial_status, start_trial, TrialError};
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    run_migrations(&pool).await.ok()?;
    Some(pool)
}

async fn new_user(pool: &PgPool) -> User {
    let id = Uuid::new_v4();
    User::find_or_create(
        pool,
        &IdentityProfile {
            subject: format!("user_{}", id.simple()),
            email: format!("Test-{}@Example.com", id.simple()),
            name: Some("Test User".to_string()),
        },
    )
    .await
    .unwrap()
}

async fn backdate_trial_end(pool: &PgPool, user_id: Uuid) {
    sqlx::query("UPDATE users SET trial_ends_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
}

async fn count_kind(pool: &PgPool, user_id: Uuid, notification_kind: &str) -> usize {
    UserNotification::list_by_user(pool, user_id, false, 100)
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.kind == notification_kind)
        .count()
}

#[tokio::test]
async fn test_find_or_create_is_stable() {
    let Some(pool) = test_pool().await else { return };
    let user = new_user(&pool).await;

    assert_eq!(user.email, user.email.to_lowercase());
    assert_eq!(user.subscription_tier, SubscriptionTier::Free);

    let again = User::find_or_create(
        &pool,
        &IdentityProfile {
            subject: user.subject.clone(),
            email: user.email.clone(),
            name: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(again.id, user.id);
    assert_eq!(again.referral_code, user.referral_code);
}

#[tokio::test]
async fn test_trial_lifecycle() {
    let Some(pool) = test_pool().await else { return };
    let user = new_user(&pool).await;

    let trialing = start_trial(&pool, user.id, Utc::now(), 14).await.unwrap();
    assert_eq!(trialing.subscription_tier, SubscriptionTier::Trial);
    assert!(trialing.is_trial_active);

    let second = start_trial(&pool, user.id, Utc::now(), 14).await;
    assert!(matches!(second, Err(TrialError::AlreadyUsed)));

    backdate_trial_end(&pool, user.id).await;

    let resolved = resolve_trial_status(&pool, user.id, Utc::now()).await.unwrap();
    assert!(resolved.expired_now);
    assert!(resolved.status.is_expired);
    assert_eq!(resolved.user.subscription_tier, SubscriptionTier::Free);

    // A second read must not expire or notify again
    let again = resolve_trial_status(&pool, user.id, Utc::now()).await.unwrap();
    assert!(!again.expired_now);
    assert_eq!(count_kind(&pool, user.id, kind::TRIAL_EXPIRED).await, 1);

    let retry = start_trial(&pool, user.id, Utc::now(), 14).await;
    assert!(matches!(retry, Err(TrialError::AlreadyUsed)));
}

#[tokio::test]
async fn test_paid_upgrade_survives_trial_expiry() {
    let Some(pool) = test_pool().await else { return };
    let user = new_user(&pool).await;
    start_trial(&pool, user.id, Utc::now(), 14).await.unwrap();

    sqlx::query("UPDATE users SET subscription_tier = 'PRO' WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();
    backdate_trial_end(&pool, user.id).await;

    let resolved = resolve_trial_status(&pool, user.id, Utc::now()).await.unwrap();
    assert!(resolved.expired_now);
    assert!(!resolved.user.is_trial_active);
    assert_eq!(resolved.user.subscription_tier, SubscriptionTier::Pro);
}

#[tokio::test]
async fn test_authentication_expires_ended_trial() {
    let Some(pool) = test_pool().await else { return };
    let user = new_user(&pool).await;
    start_trial(&pool, user.id, Utc::now(), 14).await.unwrap();
    backdate_trial_end(&pool, user.id).await;

    let issuer = "https://id.example.com";
    let secret = "account-flow-secret-at-least-32-bytes";
    let claims = IdentityClaims::new(&user.subject, &user.email, None, issuer);
    let token = create_token(&claims, secret).unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let auth = authenticate(&pool, &headers, secret, issuer).await.unwrap();
    assert_eq!(auth.user_id, user.id);
    assert_eq!(auth.tier, SubscriptionTier::Free);

    let stored = User::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert!(!stored.is_trial_active);
    assert_eq!(count_kind(&pool, user.id, kind::TRIAL_EXPIRED).await, 1);
}

#[tokio::test]
async fn test_concurrent_expiry_notifies_once() {
    let Some(pool) = test_pool().await else { return };
    let user = new_user(&pool).await;
    start_trial(&pool, user.id, Utc::now(), 14).await.unwrap();
    backdate_trial_end(&pool, user.id).await;

    let now = Utc::now();
    let (a, b, swept) = tokio::join!(
        resolve_trial_status(&pool, user.id, now),
        resolve_trial_status(&pool, user.id, now),
        expire_due_trials(&pool, now),
    );
    let flips = [a.unwrap().expired_now, b.unwrap().expired_now]
        .iter()
        .filter(|f| **f)
        .count();
    let swept = swept.unwrap();

    // The sweep may also expire other test users' trials
    assert!(flips <= 1);
    assert_eq!(count_kind(&pool, user.id, kind::TRIAL_EXPIRED).await, 1);
    assert!(flips == 1 || swept >= 1);
}

#[tokio::test]
async fn test_paid_tier_cannot_start_trial() {
    let Some(pool) = test_pool().await else { return };
    let user = new_user(&pool).await;
    User::set_tier(&pool, user.id, SubscriptionTier::Pro).await.unwrap();

    let result = start_trial(&pool, user.id, Utc::now(), 14).await;
    assert!(matches!(result, Err(TrialError::NotEligible(SubscriptionTier::Pro))));
}

#[tokio::test]
async fn test_organization_quota_follows_trial() {
    let Some(pool) = test_pool().await else { return };
    let user = new_user(&pool).await;
    let quota = QuotaEnforcer::new(pool.clone());

    quota.enforce_organization(user.id).await.unwrap();
    Organization::create_with_owner(&pool, CreateOrganization { name: "First".into() }, user.id)
        .await
        .unwrap();

    let blocked = quota.enforce_organization(user.id).await;
    assert!(matches!(blocked, Err(QuotaError::LimitExceeded { limit: 1, used: 1, .. })));

    start_trial(&pool, user.id, Utc::now(), 14).await.unwrap();
    let allowed = quota.enforce_organization(user.id).await.unwrap();
    assert_eq!(allowed.limit, 3);
    assert_eq!(allowed.remaining, 2);
}

#[tokio::test]
async fn test_invitation_accept_flow() {
    let Some(pool) = test_pool().await else { return };
    let owner = new_user(&pool).await;
    let invitee = new_user(&pool).await;
    let org = Organization::create_with_owner(&pool, CreateOrganization { name: "Acme".into() }, owner.id)
        .await
        .unwrap();

    let invitation =
        Invitation::create(&pool, org.id, &invitee.email.to_uppercase(), OrganizationRole::Admin, owner.id)
            .await
            .unwrap();
    assert_eq!(invitation.token.len(), 64);

    let detail = Invitation::validate(&pool, &invitation.token, org.id, Utc::now()).await.unwrap();
    assert!(detail.valid);
    assert_eq!(detail.organization_name, "Acme");

    let wrong_org = Invitation::validate(&pool, &invitation.token, Uuid::new_v4(), Utc::now()).await;
    assert!(matches!(wrong_org, Err(InvitationError::TargetMismatch(_))));

    let stranger = new_user(&pool).await;
    let mismatch = Invitation::accept(&pool, &invitation.token, stranger.id, &stranger.email, Utc::now()).await;
    assert!(matches!(mismatch, Err(InvitationError::EmailMismatch)));

    Invitation::accept(&pool, &invitation.token, invitee.id, &invitee.email, Utc::now())
        .await
        .unwrap();
    let role = OrganizationMember::get_role(&pool, org.id, invitee.id).await.unwrap();
    assert_eq!(role, Some(OrganizationRole::Admin));

    let twice = Invitation::accept(&pool, &invitation.token, invitee.id, &invitee.email, Utc::now()).await;
    assert!(matches!(twice, Err(InvitationError::AlreadyAccepted)));
}

#[tokio::test]
async fn test_expired_invitation_is_rejected() {
    let Some(pool) = test_pool().await else { return };
    let owner = new_user(&pool).await;
    let invitee = new_user(&pool).await;
    let org = Organization::create_with_owner(&pool, CreateOrganization { name: "Late".into() }, owner.id)
        .await
        .unwrap();
    let invitation = Invitation::create(&pool, org.id, &invitee.email, OrganizationRole::Member, owner.id)
        .await
        .unwrap();

    let later = Utc::now() + Duration::days(8);
    let detail = Invitation::validate(&pool, &invitation.token, org.id, later).await.unwrap();
    assert!(detail.is_expired);
    assert!(!detail.valid);

    let result = Invitation::accept(&pool, &invitation.token, invitee.id, &invitee.email, later).await;
    assert!(matches!(result, Err(InvitationError::Expired)));
}

#[tokio::test]
async fn test_referral_redeem() {
    let Some(pool) = test_pool().await else { return };
    let referrer = new_user(&pool).await;
    let referee = new_user(&pool).await;

    let own = Referral::redeem(&pool, &referrer, &referrer.referral_code).await;
    assert!(matches!(own, Err(ReferralError::SelfReferral)));

    let unknown = Referral::redeem(&pool, &referee, "NOPE0000").await;
    assert!(matches!(unknown, Err(ReferralError::UnknownCode)));

    Referral::redeem(&pool, &referee, &referrer.referral_code).await.unwrap();
    assert_eq!(Credit::balance(&pool, referrer.id).await.unwrap(), REFERRAL_CREDIT_AMOUNT as i64);
    assert_eq!(Credit::balance(&pool, referee.id).await.unwrap(), REFERRAL_CREDIT_AMOUNT as i64);
    assert_eq!(count_kind(&pool, referrer.id, kind::REFERRAL_REDEEMED).await, 1);

    let again = Referral::redeem(&pool, &referee, &referrer.referral_code).await;
    assert!(matches!(again, Err(ReferralError::AlreadyRedeemed)));

    let summary = Referral::summary(&pool, &referrer).await.unwrap();
    assert_eq!(summary.referred_count, 1);
    assert!(!summary.has_redeemed);
}
