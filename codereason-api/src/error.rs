/// Error handling for the API server
///
/// Every handler returns `Result<T, ApiError>`. Library errors from
/// `codereason-shared` convert into `ApiError` through `From`, so handlers can
/// use `?` directly.
///
/// # Example
///
/// ```
/// use codereason_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(name: Option<String>) -> ApiResult<Json<Value>> {
///     let name = name.ok_or_else(|| ApiError::BadRequest("name is required".to_string()))?;
///     Ok(Json(json!({ "name": name })))
/// }
/// ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use codereason_shared::{
    auth::{authorization::AuthzError, jwt::JwtError, middleware::AuthError},
    models::{invitation::InvitationError, referral::ReferralError},
    quota::QuotaError,
    trial::TrialError,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Usage quota exhausted (403)
    QuotaExceeded(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Request body failed validation (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded { retry_after: u64, message: String },

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Field errors for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::QuotaExceeded(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for a missing resource
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => {
                write!(f, "Rate limit exceeded: {}", message)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retry_after = match &self {
            ApiError::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        };

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::QuotaExceeded(msg) => ("quota_exceeded", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::RateLimitExceeded { message, .. } => ("rate_limit_exceeded", message, None),
            ApiError::InternalError(msg) => {
                // Logged here, never sent to the client
                tracing::error!(error = %msg, "Internal error");
                ("internal_error", "An internal error occurred".to_string(), None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                let what = db_err.constraint().unwrap_or("unique constraint").to_string();
                ApiError::Conflict(format!("Already exists ({})", what))
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                ApiError::NotFound("Referenced resource not found".to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing credentials".to_string()),
            AuthError::InvalidFormat(msg) | AuthError::InvalidToken(msg) => {
                ApiError::Unauthorized(msg)
            }
            AuthError::DatabaseError(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        AuthError::from(err).into()
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::DatabaseError(err) => err.into(),
            other => ApiError::Forbidden(other.to_string()),
        }
    }
}

impl From<TrialError> for ApiError {
    fn from(err: TrialError) -> Self {
        match err {
            TrialError::UserNotFound(_) => ApiError::not_found("User"),
            TrialError::AlreadyUsed | TrialError::NotEligible(_) => {
                ApiError::Conflict(err.to_string())
            }
            TrialError::Database(err) => err.into(),
        }
    }
}

impl From<QuotaError> for ApiError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::LimitExceeded { .. } => ApiError::QuotaExceeded(err.to_string()),
            QuotaError::OrganizationNotFound(_) => ApiError::not_found("Organization"),
            QuotaError::Trial(err) => err.into(),
            QuotaError::Database(err) => err.into(),
        }
    }
}

impl From<InvitationError> for ApiError {
    fn from(err: InvitationError) -> Self {
        match err {
            InvitationError::NotFound => ApiError::not_found("Invitation"),
            InvitationError::TargetMismatch(_) | InvitationError::EmailMismatch => {
                ApiError::Forbidden(err.to_string())
            }
            InvitationError::Expired | InvitationError::AlreadyAccepted => {
                ApiError::BadRequest(err.to_string())
            }
            InvitationError::AlreadyMember => ApiError::Conflict(err.to_string()),
            InvitationError::Database(err) => err.into(),
        }
    }
}

impl From<ReferralError> for ApiError {
    fn from(err: ReferralError) -> Self {
        match err {
            ReferralError::UnknownCode => ApiError::not_found("Referral code"),
            ReferralError::SelfReferral => ApiError::BadRequest(err.to_string()),
            ReferralError::AlreadyRedeemed => ApiError::Conflict(err.to_string()),
            ReferralError::Database(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codereason_shared::models::organization_member::OrganizationRole;
    use codereason_shared::quota::QuotaType;
    use uuid::Uuid;
    use validator::Validate;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::not_found("Workspace");
        assert_eq!(err.to_string(), "Not found: Workspace not found");
    }

    #[test]
    fn test_rate_limit_response_has_retry_after() {
        let response = ApiError::RateLimitExceeded {
            retry_after: 12,
            message: "slow down".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "12");
    }

    #[test]
    fn test_library_error_statuses() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (InvitationError::NotFound.into(), StatusCode::NOT_FOUND),
            (InvitationError::TargetMismatch("organization").into(), StatusCode::FORBIDDEN),
            (InvitationError::EmailMismatch.into(), StatusCode::FORBIDDEN),
            (InvitationError::Expired.into(), StatusCode::BAD_REQUEST),
            (InvitationError::AlreadyAccepted.into(), StatusCode::BAD_REQUEST),
            (InvitationError::AlreadyMember.into(), StatusCode::CONFLICT),
            (ReferralError::UnknownCode.into(), StatusCode::NOT_FOUND),
            (ReferralError::SelfReferral.into(), StatusCode::BAD_REQUEST),
            (ReferralError::AlreadyRedeemed.into(), StatusCode::CONFLICT),
            (TrialError::AlreadyUsed.into(), StatusCode::CONFLICT),
            (TrialError::UserNotFound(Uuid::nil()).into(), StatusCode::NOT_FOUND),
            (
                QuotaError::LimitExceeded {
                    quota_type: QuotaType::PrReviews,
                    limit: 5,
                    used: 5,
                }
                .into(),
                StatusCode::FORBIDDEN,
            ),
            (
                AuthzError::InsufficientRole {
                    required: OrganizationRole::Admin,
                    actual: OrganizationRole::Member,
                }
                .into(),
                StatusCode::FORBIDDEN,
            ),
            (AuthError::MissingCredentials.into(), StatusCode::UNAUTHORIZED),
            (sqlx::Error::RowNotFound.into(), StatusCode::NOT_FOUND),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{}", err);
        }
    }

    #[derive(Validate)]
    struct Named {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
    }

    #[test]
    fn test_validation_errors_map_to_400() {
        let errors = Named { name: String::new() }.validate().unwrap_err();
        let err = ApiError::from(errors);

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details.len(), 1);
                assert_eq!(details[0].field, "name");
                assert_eq!(details[0].message, "Name is required");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
