/// Workspace endpoints
///
/// Any organization member may create a workspace and becomes its ADMIN.
/// Organization OWNERs and ADMINs act as workspace ADMIN everywhere in their
/// organization, so they can manage workspaces they never joined.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    routes::{fetch_organization, fetch_workspace},
};
use axum::{extract::State, http::StatusCode, Extension};
use codereason_shared::{
    auth::{
        authorization::{require_org_member, require_workspace_role},
        middleware::AuthContext,
    },
    models::{
        workspace::{CreateWorkspace, UpdateWorkspace, Workspace},
        workspace_member::{WorkspaceMember, WorkspaceMemberDetail, WorkspaceRole},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkspaceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

/// Partial update; an empty description clears it
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkspaceRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

impl UpdateWorkspaceRequest {
    fn into_update(self) -> UpdateWorkspace {
        UpdateWorkspace {
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description.map(|d| {
                let trimmed = d.trim().to_string();
                (!trimmed.is_empty()).then_some(trimmed)
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRoleRequest {
    pub role: WorkspaceRole,
}

/// Workspace with the role the caller acts with
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceResponse {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub role: WorkspaceRole,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWorkspacesResponse {
    pub workspaces: Vec<Workspace>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMembersResponse {
    pub members: Vec<WorkspaceMemberDetail>,
}

pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(organization_id): Path<Uuid>,
) -> ApiResult<Json<ListWorkspacesResponse>> {
    require_org_member(&state.db, organization_id, auth.user_id).await?;

    let workspaces = Workspace::list_by_organization(&state.db, organization_id).await?;
    Ok(Json(ListWorkspacesResponse { workspaces }))
}

pub async fn create_workspace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(organization_id): Path<Uuid>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> ApiResult<(StatusCode, Json<WorkspaceResponse>)> {
    req.validate()?;
    require_org_member(&state.db, organization_id, auth.user_id).await?;
    fetch_organization(&state.db, organization_id).await?;

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Name is required".to_string()));
    }

    let workspace = Workspace::create(
        &state.db,
        CreateWorkspace {
            organization_id,
            name,
            description: req.description.filter(|d| !d.trim().is_empty()),
        },
        auth.user_id,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(WorkspaceResponse {
            workspace,
            role: WorkspaceRole::Admin,
        }),
    ))
}

pub async fn get_workspace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let workspace = fetch_workspace(&state.db, id).await?;
    let role = require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Viewer)
        .await?;

    Ok(Json(WorkspaceResponse { workspace, role }))
}

pub async fn update_workspace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateWorkspaceRequest>,
) -> ApiResult<Json<WorkspaceResponse>> {
    req.validate()?;

    let workspace = fetch_workspace(&state.db, id).await?;
    let role =
        require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Admin).await?;

    let workspace = Workspace::update(&state.db, id, req.into_update())
        .await?
        .ok_or_else(|| ApiError::not_found("Workspace"))?;

    Ok(Json(WorkspaceResponse { workspace, role }))
}

pub async fn delete_workspace(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let workspace = fetch_workspace(&state.db, id).await?;
    require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Admin).await?;

    if !Workspace::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Workspace"));
    }

    tracing::info!(workspace_id = %id, user_id = %auth.user_id, "Workspace deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ListMembersResponse>> {
    let workspace = fetch_workspace(&state.db, id).await?;
    require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Viewer).await?;

    let members = WorkspaceMember::list_by_workspace(&state.db, id).await?;
    Ok(Json(ListMembersResponse { members }))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRoleRequest>,
) -> ApiResult<Json<WorkspaceMember>> {
    let workspace = fetch_workspace(&state.db, id).await?;
    require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Admin).await?;

    let member = WorkspaceMember::update_role(&state.db, id, user_id, req.role)
        .await?
        .ok_or_else(|| ApiError::not_found("Member"))?;

    tracing::info!(
        workspace_id = %id,
        member_id = %user_id,
        role = member.role.as_str(),
        "Workspace member role changed"
    );
    Ok(Json(member))
}

/// Removes a member, or lets a member leave
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let workspace = fetch_workspace(&state.db, id).await?;
    let required = if user_id == auth.user_id {
        WorkspaceRole::Viewer
    } else {
        WorkspaceRole::Admin
    };
    require_workspace_role(&state.db, &workspace, auth.user_id, required).await?;

    if !WorkspaceMember::delete(&state.db, id, user_id).await? {
        return Err(ApiError::not_found("Member"));
    }

    tracing::info!(workspace_id = %id, member_id = %user_id, "Workspace member removed");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_clears_empty_description() {
        let req = UpdateWorkspaceRequest {
            name: Some("  Backend ".to_string()),
            description: Some("   ".to_string()),
        };
        let update = req.into_update();
        assert_eq!(update.name.as_deref(), Some("Backend"));
        assert_eq!(update.description, Some(None));
    }

    #[test]
    fn test_update_request_leaves_absent_fields() {
        let req: UpdateWorkspaceRequest = serde_json::from_str("{}").unwrap();
        assert!(req.validate().is_ok());
        let update = req.into_update();
        assert!(update.name.is_none());
        assert!(update.description.is_none());
    }

    #[test]
    fn test_create_request_validation() {
        let req: CreateWorkspaceRequest =
            serde_json::from_str(r#"{"name":"","description":null}"#).unwrap();
        assert!(req.validate().is_err());

        let req: CreateWorkspaceRequest = serde_json::from_str(r#"{"name":"Backend"}"#).unwrap();
        assert!(req.validate().is_ok());
    }
}
