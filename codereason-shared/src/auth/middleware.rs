/// Request authentication for Axum
///
/// Validates the identity provider's bearer token, resolves it to a `users`
/// row (creating the row on first sign-in) and produces the [`AuthContext`]
/// that handlers read from request extensions.
///
/// # Request Extensions
///
/// After successful authentication the API layer adds:
/// - `AuthContext`: user ID, subject, email and tier of the caller
///
/// # Example
///
/// ```no_run
/// use axum::Extension;
/// use codereason_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, user {}!", auth.user_id)
/// }
/// ```

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};
use crate::models::user::{SubscriptionTier, User};
use crate::trial::{is_expiry_due, resolve_trial_status};

/// Authentication context added to request extensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Local user ID
    pub user_id: Uuid,

    /// Identity provider subject
    pub subject: String,

    /// Email address, lowercase
    pub email: String,

    /// Effective tier when the request was authenticated
    pub tier: SubscriptionTier,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            subject: user.subject.clone(),
            email: user.email.clone(),
            tier: user.effective_tier(),
        }
    }
}

/// Error type for authentication
#[derive(Debug)]
pub enum AuthError {
    /// Missing authorization header
    MissingCredentials,

    /// Invalid authorization header format
    InvalidFormat(String),

    /// Token validation failed
    InvalidToken(String),

    /// Database error
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing credentials".to_string(),
            ),
            AuthError::InvalidFormat(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AuthError::DatabaseError(msg) => {
                tracing::error!("Authentication database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    }
}

/// Extracts the bearer token from an `Authorization` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Authenticates a request from its headers
///
/// Validates the bearer token against `secret` and `issuer`, then finds or
/// creates the user for its subject. A trial that ended is expired before the
/// tier is read, so rate limits never see a stale TRIAL tier.
///
/// # Errors
///
/// - `MissingCredentials` / `InvalidFormat` for a missing or malformed header
/// - `InvalidToken` when validation fails
/// - `DatabaseError` when the user lookup fails
pub async fn authenticate(
    pool: &PgPool,
    headers: &HeaderMap,
    secret: &str,
    issuer: &str,
) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let claims = validate_token(token, secret, issuer)?;

    let user = User::find_or_create(pool, &claims.into_profile())
        .await
        .map_err(|e| AuthError::DatabaseError(format!("Database error: {}", e)))?;

    let now = Utc::now();
    let user = if is_expiry_due(&user, now) {
        resolve_trial_status(pool, user.id, now)
            .await
            .map_err(|e| AuthError::DatabaseError(format!("Trial resolution failed: {}", e)))?
            .user
    } else {
        user
    };

    Ok(AuthContext::from_user(&user))
}
