/// Database models for CodeReason
///
/// One module per table (chat messages live with their sessions). Each model
/// owns its SQL; handlers never write queries directly.
///
/// # Models
///
/// - `user`: Accounts mirrored from the identity provider, tiers and trials
/// - `organization`: Top-level tenants
/// - `organization_member`: User-organization relationships with roles
/// - `workspace`: Collaboration spaces inside an organization
/// - `workspace_member`: User-workspace relationships with roles
/// - `repository`: Connected source repositories
/// - `analysis`: Reasoning runs over repositories (PR reviews, full scans)
/// - `chat_session`: Workspace chat sessions and messages
/// - `invitation`: Organization invitations
/// - `workspace_invitation`: Workspace invitations
/// - `credit`: Credit ledger
/// - `referral`: Referral links and redemption
/// - `notification`: In-app notifications
///
/// # Example
///
/// ```no_run
/// use codereason_shared::models::organization::{CreateOrganization, Organization};
/// use codereason_shared::models::user::{IdentityProfile, User};
/// use codereason_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::find_or_create(&pool, &IdentityProfile {
///     subject: "user_2abc".to_string(),
///     email: "dev@example.com".to_string(),
///     name: None,
/// }).await?;
///
/// let org = Organization::create_with_owner(
///     &pool,
///     CreateOrganization { name: "Acme".to_string() },
///     user.id,
/// ).await?;
/// # Ok(())
/// # }
/// ```

pub mod analysis;
pub mod chat_session;
pub mod credit;
pub mod invitation;
pub mod notification;
pub mod organization;
pub mod organization_member;
pub mod referral;
pub mod repository;
pub mod user;
pub mod workspace;
pub mod workspace_invitation;
pub mod workspace_member;
