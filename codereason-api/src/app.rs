/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use codereason_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config, None));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use codereason_shared::{auth::middleware::authenticate, quota::QuotaEnforcer};
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into each handler through `State`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Redis connection for rate limiting, if configured
    pub redis: Option<ConnectionManager>,

    /// Tier limit checks
    pub quota: QuotaEnforcer,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, redis: Option<ConnectionManager>) -> Self {
        Self {
            quota: QuotaEnforcer::new(db.clone()),
            db,
            config: Arc::new(config),
            redis,
        }
    }
}

/// Builds the complete router
///
/// # Architecture
///
/// ```text
/// /health                                   public
/// /api/invitations/validate                 public
/// /api/workspace-invitations/validate       public
/// /api/...                                  identity token + rate limit
/// ```
///
/// The full route table is in `routes`.
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, compression, request tracing, then per-router
/// authentication and rate limiting.
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{
        analyses, billing, chat_sessions, health, invitations, me, notifications, organizations,
        pages, referrals, repositories, trial, workspace_invitations, workspaces,
    };

    let public_routes = Router::new()
        .route("/invitations/validate", get(invitations::validate_invitation))
        .route(
            "/workspace-invitations/validate",
            get(workspace_invitations::validate_invitation),
        );

    let protected_routes = Router::new()
        // Account
        .route("/me", get(me::get_me).patch(me::update_me))
        .route("/trial", get(trial::get_trial_status))
        .route("/trial/start", post(trial::start_trial))
        .route("/billing/usage", get(billing::get_usage))
        .route("/billing/reviews", get(billing::get_review_usage))
        .route("/referrals", get(referrals::get_referrals))
        .route("/referrals/redeem", post(referrals::redeem_referral))
        .route("/credits", get(referrals::list_credits))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/:id/read", post(notifications::mark_read))
        // Organizations
        .route(
            "/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/organizations/:id",
            get(organizations::get_organization)
                .patch(organizations::rename_organization)
                .delete(organizations::delete_organization),
        )
        .route("/organizations/:id/members", get(organizations::list_members))
        .route(
            "/organizations/:id/members/:user_id",
            patch(organizations::update_member_role).delete(organizations::remove_member),
        )
        .route(
            "/organizations/:id/invitations",
            get(invitations::list_invitations).post(invitations::create_invitation),
        )
        .route(
            "/organizations/:id/invitations/:invitation_id",
            axum::routing::delete(invitations::revoke_invitation),
        )
        .route("/invitations/accept", post(invitations::accept_invitation))
        .route(
            "/organizations/:id/workspaces",
            get(workspaces::list_workspaces).post(workspaces::create_workspace),
        )
        .route(
            "/organizations/:id/repositories",
            get(repositories::list_repositories).post(repositories::connect_repository),
        )
        // Workspaces
        .route(
            "/workspaces/:id",
            get(workspaces::get_workspace)
                .patch(workspaces::update_workspace)
                .delete(workspaces::delete_workspace),
        )
        .route("/workspaces/:id/members", get(workspaces::list_members))
        .route(
            "/workspaces/:id/members/:user_id",
            patch(workspaces::update_member_role).delete(workspaces::remove_member),
        )
        .route(
            "/workspaces/:id/invitations",
            get(workspace_invitations::list_invitations)
                .post(workspace_invitations::create_invitation),
        )
        .route(
            "/workspaces/:id/invitations/:invitation_id",
            axum::routing::delete(workspace_invitations::revoke_invitation),
        )
        .route(
            "/workspace-invitations/accept",
            post(workspace_invitations::accept_invitation),
        )
        .route(
            "/workspaces/:id/chat-sessions",
            get(chat_sessions::list_sessions).post(chat_sessions::create_session),
        )
        // Chat
        .route(
            "/chat-sessions/:id",
            get(chat_sessions::get_session)
                .patch(chat_sessions::rename_session)
                .delete(chat_sessions::delete_session),
        )
        .route("/chat-sessions/:id/messages", post(chat_sessions::append_message))
        // Repositories and analyses
        .route(
            "/repositories/:id",
            get(repositories::get_repository).delete(repositories::disconnect_repository),
        )
        .route(
            "/repositories/:id/analyses",
            get(analyses::list_analyses).post(analyses::create_analysis),
        )
        .route(
            "/analyses/:id",
            get(analyses::get_analysis).patch(analyses::update_analysis),
        )
        // Page data
        .route("/pages/dashboard", get(pages::dashboard))
        .route("/pages/workspaces/:id", get(pages::workspace_page))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::rate_limit_layer,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            identity_auth_layer,
        ));

    let api_routes = Router::new().merge(public_routes).merge(protected_routes);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Identity authentication layer
///
/// Validates the bearer token, finds or creates the caller's user row and
/// puts an `AuthContext` into the request extensions.
async fn identity_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = &state.config.identity;
    let auth = authenticate(&state.db, req.headers(), &identity.secret, &identity.issuer).await?;

    tracing::debug!(user_id = %auth.user_id, "Request authenticated");
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
