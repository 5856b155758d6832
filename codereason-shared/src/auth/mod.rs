/// Authentication and authorization utilities
///
/// Credentials live with the external identity provider. This module only
/// validates the tokens it issues and checks membership roles.
///
/// # Modules
///
/// - [`jwt`]: Identity token validation
/// - [`middleware`]: Bearer-token authentication and `AuthContext`
/// - [`authorization`]: Organization and workspace role checks
///
/// # Example
///
/// ```no_run
/// use codereason_shared::auth::jwt::{create_token, validate_token, IdentityClaims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let claims = IdentityClaims::new("user_2abc", "dev@example.com", None, "https://id.example.com");
/// let token = create_token(&claims, "secret")?;
/// let claims = validate_token(&token, "secret", "https://id.example.com")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
