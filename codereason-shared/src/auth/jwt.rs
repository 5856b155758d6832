/// Identity token validation
///
/// Users sign in with an external identity provider, which hands the client a
/// signed JWT. This service only validates those tokens; it never issues
/// them outside tests and local tooling.
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256) with a secret shared with the
///   identity provider
/// - **Validation**: Signature, expiration, not-before and issuer checks
/// - **Secret Management**: Secrets should be at least 32 bytes (256 bits)
///
/// # Claims
///
/// - `sub`: Stable subject identifier assigned by the provider
/// - `email`: Verified email address
/// - `name`: Optional display name
/// - `iss`, `iat`, `exp`, `nbf`: Standard claims
///
/// # Example
///
/// ```
/// use codereason_shared::auth::jwt::{create_token, validate_token, IdentityClaims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let claims = IdentityClaims::new("user_2abc", "dev@example.com", None, "https://id.example.com");
/// let token = create_token(&claims, "your-secret-key")?;
///
/// let validated = validate_token(&token, "your-secret-key", "https://id.example.com")?;
/// assert_eq!(validated.sub, "user_2abc");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::user::IdentityProfile;

/// Lifetime of tokens minted by [`IdentityClaims::new`]
const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 1;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Invalid issuer
    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },

    /// Required identity claim is empty
    #[error("Missing claim: {0}")]
    MissingClaim(&'static str),
}

/// Claims carried by an identity provider token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (stable provider user ID)
    pub sub: String,

    /// Email address
    pub email: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl IdentityClaims {
    /// Creates claims valid for one hour
    pub fn new(
        subject: impl Into<String>,
        email: impl Into<String>,
        name: Option<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self::with_expiration(
            subject,
            email,
            name,
            issuer,
            Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS),
        )
    }

    /// Creates claims with custom expiration
    pub fn with_expiration(
        subject: impl Into<String>,
        email: impl Into<String>,
        name: Option<String>,
        issuer: impl Into<String>,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: subject.into(),
            email: email.into(),
            name,
            iss: issuer.into(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Identity attributes used to find or create the user row
    pub fn into_profile(self) -> IdentityProfile {
        IdentityProfile {
            subject: self.sub,
            email: self.email,
            name: self.name,
        }
    }
}

/// Creates a signed token from claims
///
/// Used by tests and local tooling to stand in for the identity provider.
pub fn create_token(claims: &IdentityClaims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates an identity token and extracts its claims
///
/// Verifies:
/// - Signature is valid
/// - Token hasn't expired
/// - Issuer is `issuer`
/// - Token is not used before nbf time
/// - `sub` and `email` are non-empty
pub fn validate_token(token: &str, secret: &str, issuer: &str) -> Result<IdentityClaims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<IdentityClaims>(token, &key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
                expected: issuer.to_string(),
            },
            _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
        }
    })?;

    let claims = token_data.claims;
    if claims.sub.trim().is_empty() {
        return Err(JwtError::MissingClaim("sub"));
    }
    if claims.email.trim().is_empty() {
        return Err(JwtError::MissingClaim("email"));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";
    const ISSUER: &str = "https://id.example.com";

    #[test]
    fn test_claims_creation() {
        let claims = IdentityClaims::new("user_1", "dev@example.com", None, ISSUER);

        assert_eq!(claims.sub, "user_1");
        assert_eq!(claims.iss, ISSUER);
        assert!(!claims.is_expired());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_create_and_validate_token() {
        let claims = IdentityClaims::new(
            "user_1",
            "dev@example.com",
            Some("Dev".to_string()),
            ISSUER,
        );
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET, ISSUER).expect("Should validate token");
        assert_eq!(validated, claims);

        let profile = validated.into_profile();
        assert_eq!(profile.subject, "user_1");
        assert_eq!(profile.name.as_deref(), Some("Dev"));
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let claims = IdentityClaims::new("user_1", "dev@example.com", None, ISSUER);
        let token = create_token(&claims, "secret1").expect("Should create token");

        assert!(validate_token(&token, "wrong-secret", ISSUER).is_err());
    }

    #[test]
    fn test_validate_wrong_issuer() {
        let claims = IdentityClaims::new("user_1", "dev@example.com", None, "https://other");
        let token = create_token(&claims, SECRET).unwrap();

        let result = validate_token(&token, SECRET, ISSUER);
        assert!(matches!(result, Err(JwtError::InvalidIssuer { .. })));
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = IdentityClaims::with_expiration(
            "user_1",
            "dev@example.com",
            None,
            ISSUER,
            Duration::seconds(-3600),
        );
        assert!(claims.is_expired());

        let token = create_token(&claims, SECRET).expect("Should create token");
        let result = validate_token(&token, SECRET, ISSUER);
        assert!(matches!(result.unwrap_err(), JwtError::Expired));
    }

    #[test]
    fn test_validate_empty_subject() {
        let claims = IdentityClaims::new("", "dev@example.com", None, ISSUER);
        let token = create_token(&claims, SECRET).unwrap();

        let result = validate_token(&token, SECRET, ISSUER);
        assert!(matches!(result, Err(JwtError::MissingClaim("sub"))));
    }

    #[test]
    fn test_validate_garbage() {
        assert!(matches!(
            validate_token("not.a.jwt", SECRET, ISSUER),
            Err(JwtError::ValidationError(_))
        ));
    }
}
