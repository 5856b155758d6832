/// Maintenance sweep against a real database
///
/// Skipped when `DATABASE_URL` is unset.

use chrono::{Duration, Utc};
use codereason_shared::db::migrations::run_migrations;
use codereason_shared::models::invitation::Invitation;
use codereason_shared::models::organization::{CreateOrganization, Organization};
use codereason_shared::models::organization_member::OrganizationRole;
use codereason_shared::models::user::{IdentityProfile, SubscriptionTier, User};
use codereason_shared::trial::start_trial;
use codereason_worker::jobs::{InvitationCleanupJob, TrialExpiryJob};
use codereason_worker::sweeper::Sweeper;
use sqlx::PgPool;
use std::sync::Arc;
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
            email: format!("worker-{}@example.com", id.simple()),
            name: None,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_sweep_expires_trials_and_cleans_invitations() {
    let Some(pool) = test_pool().await else { return };

    let owner = new_user(&pool).await;
    start_trial(&pool, owner.id, Utc::now(), 14).await.unwrap();

    let org = Organization::create_with_owner(
        &pool,
        CreateOrganization { name: "Sweep".into() },
        owner.id,
    )
    .await
    .unwrap();
    let invitation = Invitation::create(
        &pool,
        org.id,
        "stale@example.com",
        OrganizationRole::Member,
        owner.id,
    )
    .await
    .unwrap();

    let mut sweeper = Sweeper::new(pool.clone(), std::time::Duration::from_secs(60));
    sweeper.register_job(Arc::new(TrialExpiryJob));
    sweeper.register_job(Arc::new(InvitationCleanupJob::new(Duration::days(30))));

    // Both the trial and the invitation are still current
    let reports = sweeper.run_once(Utc::now()).await;
    assert!(reports.iter().all(|r| r.outcome.is_ok()));
    let user = User::find_by_id(&pool, owner.id).await.unwrap().unwrap();
    assert_eq!(user.subscription_tier, SubscriptionTier::Trial);
    assert!(Invitation::find_by_token(&pool, &invitation.token).await.unwrap().is_some());

    // Sixty days on, the trial has ended and the invitation expired over 30 days ago
    let later = Utc::now() + Duration::days(60);
    let reports = sweeper.run_once(later).await;
    assert!(reports.iter().all(|r| r.outcome.is_ok()));

    let user = User::find_by_id(&pool, owner.id).await.unwrap().unwrap();
    assert_eq!(user.subscription_tier, SubscriptionTier::Free);
    assert!(!user.is_trial_active);
    assert!(Invitation::find_by_token(&pool, &invitation.token).await.unwrap().is_none());

    // A second pass finds nothing left for this user
    let again = sweeper.run_once(later).await;
    assert!(again.iter().all(|r| r.outcome.is_ok()));
    let user = User::find_by_id(&pool, owner.id).await.unwrap().unwrap();
    assert_eq!(user.subscription_tier, SubscriptionTier::Free);
}
