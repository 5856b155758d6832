/// Maintenance sweep loop
///
/// Runs every registered job once per interval until the shutdown token is
/// cancelled. A failing job is logged and retried on the next tick; it never
/// stops the loop or the other jobs.
///
/// # Example
///
/// ```no_run
/// use codereason_worker::jobs::TrialExpiryJob;
/// use codereason_worker::sweeper::Sweeper;
/// use sqlx::PgPool;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example(pool: PgPool) {
/// let mut sweeper = Sweeper::new(pool, Duration::from_secs(60));
/// sweeper.register_job(Arc::new(TrialExpiryJob));
///
/// let shutdown = sweeper.shutdown_token();
/// tokio::spawn(async move { sweeper.run().await });
///
/// // Later...
/// shutdown.cancel();
/// # }
/// ```

use crate::jobs::MaintenanceJob;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome of one job in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job: String,

    /// Rows affected, or the error message
    pub outcome: Result<u64, String>,
}

pub struct Sweeper {
    db: PgPool,
    interval: Duration,
    jobs: Vec<Arc<dyn MaintenanceJob>>,
    shutdown_token: CancellationToken,
}

impl Sweeper {
    pub fn new(db: PgPool, interval: Duration) -> Self {
        Sweeper {
            db,
            interval,
            jobs: Vec::new(),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn register_job(&mut self, job: Arc<dyn MaintenanceJob>) {
        tracing::info!(job = %job.name(), "Registering maintenance job");
        self.jobs.push(job);
    }

    /// Cancelling this token stops the loop after the current pass
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs every job once, in registration order
    pub async fn run_once(&self, now: DateTime<Utc>) -> Vec<JobReport> {
        let mut reports = Vec::with_capacity(self.jobs.len());

        for job in &self.jobs {
            let outcome = match job.run(&self.db, now).await {
                Ok(affected) => {
                    if affected > 0 {
                        tracing::info!(job = %job.name(), affected, "Maintenance job finished");
                    } else {
                        tracing::debug!(job = %job.name(), "Maintenance job had nothing to do");
                    }
                    Ok(affected)
                }
                Err(e) => {
                    tracing::error!(job = %job.name(), error = %e, "Maintenance job failed");
                    Err(e.to_string())
                }
            };

            reports.push(JobReport {
                job: job.name().to_string(),
                outcome,
            });
        }

        reports
    }

    /// Runs passes until shutdown
    ///
    /// The first pass starts immediately.
    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            jobs = self.jobs.len(),
            "Sweeper starting"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_once(Utc::now()).await;
                }
            }
        }

        tracing::info!("Sweeper shut down");
    }
}
