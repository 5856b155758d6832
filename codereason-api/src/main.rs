//! # CodeReason API Server
//!
//! Serves the JSON API behind the CodeReason web app.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/codereason \
//! IDENTITY_SECRET=... IDENTITY_ISSUER=https://id.example.com \
//! cargo run -p codereason-api
//! ```
//!
//! Migrations run on startup. See `config` for every variable.

use codereason_api::{
    app::{build_router, AppState},
    config::Config,
};
use codereason_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool},
};
use redis::aio::ConnectionManager;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codereason_api=debug,codereason_shared=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "CodeReason API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let pool = create_pool(config.pool_config()).await?;
    run_migrations(&pool).await?;

    let redis = match &config.redis_url {
        Some(url) => Some(connect_redis(url).await?),
        None => {
            tracing::warn!("REDIS_URL not set, rate limiting disabled");
            None
        }
    };

    let address = config.bind_address();
    let app = build_router(AppState::new(pool.clone(), config, redis));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn connect_redis(url: &str) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;
    tracing::info!("Connected to Redis");
    Ok(manager)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
