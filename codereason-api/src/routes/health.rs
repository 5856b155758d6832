/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "migrationsUpToDate": true,
///   "pool": { "activeConnections": 1, "idleConnections": 1, "totalConnections": 2 }
/// }
/// ```
///
/// Always answers 200; a failing database is reported as `degraded`.

use crate::app::AppState;
use axum::{extract::State, Json};
use codereason_shared::db::{
    migrations::get_migration_status,
    pool::{get_pool_stats, health_check as db_health_check, PoolStats},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub migrations_up_to_date: bool,
    pub pool: Option<PoolStats>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = match db_health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    };

    let migrations_up_to_date = if connected {
        get_migration_status(&state.db)
            .await
            .map(|status| status.is_up_to_date)
            .unwrap_or(false)
    } else {
        false
    };

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        migrations_up_to_date,
        pool: connected.then(|| get_pool_stats(&state.db)),
    })
}
