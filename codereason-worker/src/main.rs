//! # CodeReason Worker
//!
//! Periodically expires ended trials and deletes long-expired invitations.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/codereason cargo run -p codereason-worker
//! ```

use codereason_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
};
use codereason_worker::{
    config::WorkerConfig,
    jobs::{InvitationCleanupJob, TrialExpiryJob},
    sweeper::Sweeper,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codereason_worker=debug,codereason_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "CodeReason Worker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = WorkerConfig::from_env()?;
    let pool = create_pool(config.pool_config()).await?;
    run_migrations(&pool).await?;

    let mut sweeper = Sweeper::new(pool.clone(), config.sweep_interval);
    sweeper.register_job(Arc::new(TrialExpiryJob));
    sweeper.register_job(Arc::new(InvitationCleanupJob::new(config.invitation_retention)));

    let shutdown = sweeper.shutdown_token();
    let handle = tokio::spawn(async move { sweeper.run().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, finishing current pass...");
    shutdown.cancel();
    handle.await?;

    close_pool(pool).await;
    Ok(())
}
