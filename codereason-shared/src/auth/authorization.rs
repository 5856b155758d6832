/// Authorization helpers and permission checks
///
/// # Permission Model
///
/// 1. **Organization Membership**: every organization-scoped resource requires
///    a membership row; its role is `OWNER > ADMIN > MEMBER`.
/// 2. **Workspace Membership**: workspace roles are `ADMIN > EDITOR > VIEWER`.
///    Organization OWNERs and ADMINs act as workspace ADMIN everywhere in
///    their organization.
/// 3. **Ownership**: some rows (analyses, chat sessions) can also be managed by
///    the user who created them.
///
/// Handlers map [`AuthzError`] to 403.
///
/// # Example
///
/// ```no_run
/// use codereason_shared::auth::authorization::require_org_role;
/// use codereason_shared::models::organization_member::OrganizationRole;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// // Require admin or higher
/// require_org_role(&pool, org_id, user_id, OrganizationRole::Admin).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::organization_member::{OrganizationMember, OrganizationRole};
use crate::models::workspace::Workspace;
use crate::models::workspace_member::{WorkspaceMember, WorkspaceRole};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// User is not a member of the organization
    #[error("Not a member of organization {0}")]
    NotOrganizationMember(Uuid),

    /// User doesn't have the required organization role
    #[error("Insufficient permissions: requires {}, has {}", .required.as_str(), .actual.as_str())]
    InsufficientRole {
        required: OrganizationRole,
        actual: OrganizationRole,
    },

    /// User has no access to the workspace
    #[error("Not a member of workspace {0}")]
    NotWorkspaceMember(Uuid),

    /// User doesn't have the required workspace role
    #[error("Insufficient workspace permissions: requires {}, has {}", .required.as_str(), .actual.as_str())]
    InsufficientWorkspaceRole {
        required: WorkspaceRole,
        actual: WorkspaceRole,
    },

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Checks that a user belongs to an organization and returns their role
pub async fn require_org_member(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Uuid,
) -> Result<OrganizationRole, AuthzError> {
    OrganizationMember::get_role(pool, organization_id, user_id)
        .await?
        .ok_or(AuthzError::NotOrganizationMember(organization_id))
}

/// Checks that a user has at least `required_role` in an organization
///
/// # Errors
///
/// - `NotOrganizationMember` if the user is not a member
/// - `InsufficientRole` if their role is lower
pub async fn require_org_role(
    pool: &PgPool,
    organization_id: Uuid,
    user_id: Uuid,
    required_role: OrganizationRole,
) -> Result<OrganizationRole, AuthzError> {
    let user_role = require_org_member(pool, organization_id, user_id).await?;

    if !user_role.has_permission(&required_role) {
        return Err(AuthzError::InsufficientRole {
            required: required_role,
            actual: user_role,
        });
    }

    Ok(user_role)
}

/// Workspace role a user acts with, given both memberships
///
/// No organization membership means no access, whatever the workspace row
/// says.
pub fn effective_workspace_role(
    organization_role: Option<OrganizationRole>,
    workspace_role: Option<WorkspaceRole>,
) -> Option<WorkspaceRole> {
    match (organization_role, workspace_role) {
        (None, _) => None,
        (Some(OrganizationRole::Owner | OrganizationRole::Admin), _) => Some(WorkspaceRole::Admin),
        (Some(OrganizationRole::Member), role) => role,
    }
}

/// Checks that a user can act in a workspace with at least `required_role`
///
/// Returns the role the user acts with.
pub async fn require_workspace_role(
    pool: &PgPool,
    workspace: &Workspace,
    user_id: Uuid,
    required_role: WorkspaceRole,
) -> Result<WorkspaceRole, AuthzError> {
    let org_role = OrganizationMember::get_role(pool, workspace.organization_id, user_id).await?;
    let ws_role = WorkspaceMember::get_role(pool, workspace.id, user_id).await?;

    let role = effective_workspace_role(org_role, ws_role)
        .ok_or(AuthzError::NotWorkspaceMember(workspace.id))?;

    if !role.has_permission(&required_role) {
        return Err(AuthzError::InsufficientWorkspaceRole {
            required: required_role,
            actual: role,
        });
    }

    Ok(role)
}

/// Allows the creator of a resource, or an organization ADMIN+
pub async fn require_owner_or_org_admin(
    pool: &PgPool,
    auth: &AuthContext,
    organization_id: Uuid,
    resource_owner_id: Uuid,
) -> Result<(), AuthzError> {
    if auth.user_id == resource_owner_id {
        require_org_member(pool, organization_id, auth.user_id).await?;
        return Ok(());
    }

    require_org_role(pool, organization_id, auth.user_id, OrganizationRole::Admin).await?;
    Ok(())
}
