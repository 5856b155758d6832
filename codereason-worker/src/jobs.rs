/// Maintenance jobs run by the sweeper
///
/// Each job is one idempotent bulk statement. Running a job twice at the same
/// instant changes nothing the second time.
///
/// # Example
///
/// ```no_run
/// use codereason_worker::jobs::{MaintenanceJob, TrialExpiryJob};
/// use chrono::Utc;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let expired = TrialExpiryJob.run(&pool, Utc::now()).await?;
/// println!("Expired {} trials", expired);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use codereason_shared::models::{invitation::Invitation, workspace_invitation::WorkspaceInvitation};
use codereason_shared::trial::{expire_due_trials, TrialError};
use sqlx::PgPool;

/// Job error types
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Trial expiry failed: {0}")]
    Trial(#[from] TrialError),
}

pub type JobResult<T> = Result<T, JobError>;

/// A periodic bulk operation
#[async_trait]
pub trait MaintenanceJob: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Runs one pass as of `now` and returns the number of rows affected
    async fn run(&self, pool: &PgPool, now: DateTime<Utc>) -> JobResult<u64>;
}

/// Downgrades users whose trial ended
///
/// Requests also expire trials lazily; this catches users who never come back.
pub struct TrialExpiryJob;

#[async_trait]
impl MaintenanceJob for TrialExpiryJob {
    fn name(&self) -> &str {
        "trial_expiry"
    }

    async fn run(&self, pool: &PgPool, now: DateTime<Utc>) -> JobResult<u64> {
        Ok(expire_due_trials(pool, now).await?)
    }
}

/// Deletes organization and workspace invitations that expired unaccepted
/// more than `retention` ago
pub struct InvitationCleanupJob {
    retention: Duration,
}

impl InvitationCleanupJob {
    pub fn new(retention: Duration) -> Self {
        Self { retention }
    }

    /// Invitations that expired before this instant are deleted
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }
}

#[async_trait]
impl MaintenanceJob for InvitationCleanupJob {
    fn name(&self) -> &str {
        "invitation_cleanup"
    }

    async fn run(&self, pool: &PgPool, now: DateTime<Utc>) -> JobResult<u64> {
        let cutoff = self.cutoff(now);
        let organization = Invitation::delete_expired_before(pool, cutoff).await?;
        let workspace = WorkspaceInvitation::delete_expired_before(pool, cutoff).await?;

        Ok(organization + workspace)
    }
}
