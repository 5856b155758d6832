/// Organization endpoints
///
/// # Roles
///
/// | Operation                 | Required role            |
/// |---------------------------|--------------------------|
/// | list, get, list members   | MEMBER                   |
/// | create                    | any user within quota    |
/// | rename                    | ADMIN                    |
/// | delete                    | OWNER                    |
/// | change member role        | ADMIN                    |
/// | remove member             | ADMIN, or the member     |
///
/// The OWNER membership is fixed: it can't be re-roled, assigned or removed.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    routes::fetch_organization,
};
use axum::{extract::State, http::StatusCode, Extension};
use codereason_shared::{
    auth::{
        authorization::{require_org_member, require_org_role},
        middleware::AuthContext,
    },
    models::{
        organization::{CreateOrganization, Organization, OrganizationSummary},
        organization_member::{OrganizationMember, OrganizationMemberDetail, OrganizationRole},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationNameRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRoleRequest {
    pub role: OrganizationRole,
}

/// Organization with the caller's role in it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    #[serde(flatten)]
    pub organization: Organization,
    pub role: OrganizationRole,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrganizationsResponse {
    pub organizations: Vec<OrganizationSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMembersResponse {
    pub members: Vec<OrganizationMemberDetail>,
}

pub async fn list_organizations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ListOrganizationsResponse>> {
    let organizations = Organization::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(ListOrganizationsResponse { organizations }))
}

/// Creates an organization owned by the caller
///
/// # Errors
///
/// - `400 Bad Request`: invalid name
/// - `403 Forbidden`: organization limit of the caller's tier reached
///
/// The limit is checked before the insert without a lock, so concurrent
/// requests can overshoot it.
pub async fn create_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<OrganizationNameRequest>,
) -> ApiResult<(StatusCode, Json<OrganizationResponse>)> {
    let name = req.name.trim().to_string();
    OrganizationNameRequest { name: name.clone() }.validate()?;

    state.quota.enforce_organization(auth.user_id).await?;

    let organization =
        Organization::create_with_owner(&state.db, CreateOrganization { name }, auth.user_id)
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(OrganizationResponse {
            organization,
            role: OrganizationRole::Owner,
        }),
    ))
}

pub async fn get_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrganizationResponse>> {
    let role = require_org_member(&state.db, id, auth.user_id).await?;
    let organization = fetch_organization(&state.db, id).await?;

    Ok(Json(OrganizationResponse { organization, role }))
}

pub async fn rename_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<OrganizationNameRequest>,
) -> ApiResult<Json<OrganizationResponse>> {
    let role = require_org_role(&state.db, id, auth.user_id, OrganizationRole::Admin).await?;

    let name = req.name.trim().to_string();
    OrganizationNameRequest { name: name.clone() }.validate()?;

    let organization = Organization::rename(&state.db, id, &name)
        .await?
        .ok_or_else(|| ApiError::not_found("Organization"))?;

    Ok(Json(OrganizationResponse { organization, role }))
}

pub async fn delete_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_org_role(&state.db, id, auth.user_id, OrganizationRole::Owner).await?;

    if !Organization::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Organization"));
    }

    tracing::info!(organization_id = %id, user_id = %auth.user_id, "Organization deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ListMembersResponse>> {
    require_org_member(&state.db, id, auth.user_id).await?;

    let members = OrganizationMember::list_by_organization(&state.db, id).await?;
    Ok(Json(ListMembersResponse { members }))
}

pub async fn update_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRoleRequest>,
) -> ApiResult<Json<OrganizationMember>> {
    require_org_role(&state.db, id, auth.user_id, OrganizationRole::Admin).await?;

    if req.role == OrganizationRole::Owner {
        return Err(ApiError::BadRequest(
            "Ownership cannot be assigned through a role change".to_string(),
        ));
    }

    let current = OrganizationMember::get_role(&state.db, id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member"))?;
    if current == OrganizationRole::Owner {
        return Err(ApiError::Forbidden(
            "The organization owner's role cannot be changed".to_string(),
        ));
    }

    let member = OrganizationMember::update_role(&state.db, id, user_id, req.role)
        .await?
        .ok_or_else(|| ApiError::not_found("Member"))?;

    tracing::info!(
        organization_id = %id,
        member_id = %user_id,
        role = member.role.as_str(),
        "Organization member role changed"
    );
    Ok(Json(member))
}

/// Removes a member, or lets a member leave
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    if user_id == auth.user_id {
        require_org_member(&state.db, id, auth.user_id).await?;
    } else {
        require_org_role(&state.db, id, auth.user_id, OrganizationRole::Admin).await?;
    }

    let role = OrganizationMember::get_role(&state.db, id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member"))?;
    if role == OrganizationRole::Owner {
        return Err(ApiError::Forbidden(
            "The organization owner cannot be removed".to_string(),
        ));
    }

    if !OrganizationMember::delete(&state.db, id, user_id).await? {
        return Err(ApiError::not_found("Member"));
    }

    tracing::info!(organization_id = %id, member_id = %user_id, "Organization member removed");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert!(OrganizationNameRequest { name: "Acme".to_string() }.validate().is_ok());
        assert!(OrganizationNameRequest { name: String::new() }.validate().is_err());
        assert!(OrganizationNameRequest { name: "x".repeat(101) }.validate().is_err());
    }

    #[test]
    fn test_role_request_parses_uppercase() {
        let req: UpdateMemberRoleRequest = serde_json::from_str(r#"{"role":"ADMIN"}"#).unwrap();
        assert_eq!(req.role, OrganizationRole::Admin);
        assert!(serde_json::from_str::<UpdateMemberRoleRequest>(r#"{"role":"admin"}"#).is_err());
    }
}
