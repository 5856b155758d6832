/// Workspace invitation endpoints
///
/// Same lifecycle as organization invitations, addressed to one workspace.
/// Accepting also adds the invitee to the workspace's organization as a
/// MEMBER when they aren't in it yet.
///
/// ```text
/// GET    /api/workspace-invitations/validate?token=<hex>&workspace=<uuid>   public
/// POST   /api/workspace-invitations/accept
/// GET    /api/workspaces/:id/invitations                  workspace ADMIN
/// POST   /api/workspaces/:id/invitations                  workspace ADMIN
/// DELETE /api/workspaces/:id/invitations/:invitation_id   workspace ADMIN
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    routes::{fetch_workspace, invitations::required_token_and_target},
};
use axum::{extract::State, http::StatusCode, Extension};
use chrono::Utc;
use codereason_shared::{
    auth::{authorization::require_workspace_role, middleware::AuthContext},
    models::{
        user::normalize_email,
        workspace_invitation::{WorkspaceInvitation, WorkspaceInvitationDetail},
        workspace_member::{WorkspaceMember, WorkspaceRole},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ValidateInvitationQuery {
    pub token: Option<String>,

    #[serde(alias = "workspaceId")]
    pub workspace: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,

    #[serde(default = "default_role")]
    pub role: WorkspaceRole,
}

fn default_role() -> WorkspaceRole {
    WorkspaceRole::Editor
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvitationResponse {
    #[serde(flatten)]
    pub invitation: WorkspaceInvitation,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvitationsResponse {
    pub invitations: Vec<WorkspaceInvitation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationResponse {
    pub workspace_id: Uuid,
    pub role: WorkspaceRole,
}

pub async fn validate_invitation(
    State(state): State<AppState>,
    Query(query): Query<ValidateInvitationQuery>,
) -> ApiResult<Json<WorkspaceInvitationDetail>> {
    let (token, workspace_id) =
        required_token_and_target(query.token, query.workspace, "workspace")?;

    let detail = WorkspaceInvitation::validate(&state.db, &token, workspace_id, Utc::now()).await?;
    Ok(Json(detail))
}

pub async fn list_invitations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ListInvitationsResponse>> {
    let workspace = fetch_workspace(&state.db, id).await?;
    require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Admin).await?;

    let invitations = WorkspaceInvitation::list_pending(&state.db, id).await?;
    Ok(Json(ListInvitationsResponse { invitations }))
}

pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateInvitationRequest>,
) -> ApiResult<(StatusCode, Json<CreatedInvitationResponse>)> {
    req.validate()?;

    let workspace = fetch_workspace(&state.db, id).await?;
    require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Admin).await?;

    let email = normalize_email(&req.email);
    let members = WorkspaceMember::list_by_workspace(&state.db, id).await?;
    if members.iter().any(|m| normalize_email(&m.email) == email) {
        return Err(ApiError::Conflict(
            "That address already belongs to a workspace member".to_string(),
        ));
    }

    let invitation =
        WorkspaceInvitation::create(&state.db, id, &email, req.role, auth.user_id).await?;
    let token = invitation.token.clone();

    Ok((
        StatusCode::CREATED,
        Json(CreatedInvitationResponse { invitation, token }),
    ))
}

pub async fn revoke_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, invitation_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let workspace = fetch_workspace(&state.db, id).await?;
    require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Admin).await?;

    if !WorkspaceInvitation::revoke(&state.db, id, invitation_id).await? {
        return Err(ApiError::not_found("Invitation"));
    }

    tracing::info!(workspace_id = %id, invitation_id = %invitation_id, "Workspace invitation revoked");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AcceptInvitationRequest>,
) -> ApiResult<Json<AcceptInvitationResponse>> {
    req.validate()?;

    let accepted = WorkspaceInvitation::accept(
        &state.db,
        req.token.trim(),
        auth.user_id,
        &auth.email,
        Utc::now(),
    )
    .await?;

    Ok(Json(AcceptInvitationResponse {
        workspace_id: accepted.workspace_id,
        role: accepted.role,
    }))
}
