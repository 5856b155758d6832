/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 5)
/// - `SWEEP_INTERVAL_SECS`: Seconds between maintenance passes (default: 60)
/// - `INVITATION_RETENTION_DAYS`: Days an expired, unaccepted invitation is
///   kept before deletion (default: 30)

use codereason_shared::db::pool::DatabaseConfig;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub sweep_interval: Duration,
    pub invitation_retention: chrono::Duration,
}

impl WorkerConfig {
    /// Loads configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()?;
        let interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()?;
        let retention_days = env::var("INVITATION_RETENTION_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<i64>()?;

        Self::new(database_url, max_connections, interval_secs, retention_days)
    }

    fn new(
        database_url: String,
        max_connections: u32,
        interval_secs: u64,
        retention_days: i64,
    ) -> anyhow::Result<Self> {
        if interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be positive");
        }
        if retention_days < 0 {
            anyhow::bail!("INVITATION_RETENTION_DAYS cannot be negative");
        }

        Ok(Self {
            database_url,
            max_connections,
            sweep_interval: Duration::from_secs(interval_secs),
            invitation_retention: chrono::Duration::days(retention_days),
        })
    }

    pub fn pool_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            max_connections: self.max_connections,
            min_connections: 1,
            ..DatabaseConfig::from_url(&self.database_url)
        }
    }
}
