/// API route handlers, one module per resource
///
/// # Routes
///
/// All `/api` routes take camelCase JSON and require
/// `Authorization: Bearer <identity token>` unless marked public.
///
/// ```text
/// GET    /health                                        public
/// GET    /api/me                   PATCH /api/me
/// GET    /api/trial                POST  /api/trial/start
/// GET    /api/billing/usage?organizationId=
/// GET    /api/billing/reviews
/// GET    /api/referrals            POST  /api/referrals/redeem
/// GET    /api/credits
/// GET    /api/notifications?unreadOnly=
/// POST   /api/notifications/:id/read
/// POST   /api/notifications/read-all
/// GET    /api/organizations        POST  /api/organizations
/// GET    /api/organizations/:id    PATCH, DELETE
/// GET    /api/organizations/:id/members
/// PATCH  /api/organizations/:id/members/:user_id   DELETE
/// GET    /api/organizations/:id/invitations        POST
/// DELETE /api/organizations/:id/invitations/:invitation_id
/// GET    /api/invitations/validate?token=&org=               public
/// POST   /api/invitations/accept
/// GET    /api/organizations/:id/workspaces         POST
/// GET    /api/workspaces/:id       PATCH, DELETE
/// GET    /api/workspaces/:id/members
/// PATCH  /api/workspaces/:id/members/:user_id      DELETE
/// GET    /api/workspaces/:id/invitations           POST
/// DELETE /api/workspaces/:id/invitations/:invitation_id
/// GET    /api/workspace-invitations/validate?token=&workspace=   public
/// POST   /api/workspace-invitations/accept
/// GET    /api/workspaces/:id/chat-sessions         POST
/// GET    /api/chat-sessions/:id    PATCH, DELETE
/// POST   /api/chat-sessions/:id/messages
/// GET    /api/organizations/:id/repositories       POST
/// GET    /api/repositories/:id     DELETE
/// GET    /api/repositories/:id/analyses            POST
/// GET    /api/analyses/:id         PATCH
/// GET    /api/pages/dashboard?organizationId=
/// GET    /api/pages/workspaces/:id
/// ```

use crate::error::{ApiError, ApiResult};
use codereason_shared::models::{
    organization::Organization, repository::Repository, workspace::Workspace,
};
use sqlx::PgPool;
use uuid::Uuid;

pub mod analyses;
pub mod billing;
pub mod chat_sessions;
pub mod health;
pub mod invitations;
pub mod me;
pub mod notifications;
pub mod organizations;
pub mod pages;
pub mod referrals;
pub mod repositories;
pub mod trial;
pub mod workspace_invitations;
pub mod workspaces;

pub(crate) async fn fetch_organization(db: &PgPool, id: Uuid) -> ApiResult<Organization> {
    Organization::find_by_id(db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization"))
}

pub(crate) async fn fetch_workspace(db: &PgPool, id: Uuid) -> ApiResult<Workspace> {
    Workspace::find_by_id(db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Workspace"))
}

pub(crate) async fn fetch_repository(db: &PgPool, id: Uuid) -> ApiResult<Repository> {
    Repository::find_by_id(db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Repository"))
}

/// Clamps a client-supplied page size
pub(crate) fn page_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, max)
}
