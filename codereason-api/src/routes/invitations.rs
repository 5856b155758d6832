/// Organization invitation endpoints
///
/// # Endpoints
///
/// ```text
/// GET    /api/invitations/validate?token=<hex>&org=<uuid>         public
/// POST   /api/invitations/accept                { "token": "<hex>" }
/// GET    /api/organizations/:id/invitations                       ADMIN
/// POST   /api/organizations/:id/invitations     { "email", "role" } ADMIN
/// DELETE /api/organizations/:id/invitations/:invitation_id        ADMIN
/// ```
///
/// Validation answers 400 when `token` or `org` is missing, 404 for an unknown
/// token and 403 when the token belongs to another organization. Otherwise it
/// reports the invitation with `valid`, `isExpired` and `isAccepted`.
///
/// Invitations are not emailed; the token is returned once, on creation, for
/// the inviter to share.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    routes::fetch_organization,
};
use axum::{extract::State, http::StatusCode, Extension};
use chrono::Utc;
use codereason_shared::{
    auth::{authorization::require_org_role, middleware::AuthContext},
    models::{
        invitation::{Invitation, InvitationDetail},
        organization_member::{OrganizationMember, OrganizationRole},
        user::normalize_email,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ValidateInvitationQuery {
    pub token: Option<String>,

    #[serde(alias = "organizationId")]
    pub org: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,

    #[serde(default = "default_role")]
    pub role: OrganizationRole,
}

fn default_role() -> OrganizationRole {
    OrganizationRole::Member
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

/// Newly created invitation; the only response that carries the token
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedInvitationResponse {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListInvitationsResponse {
    pub invitations: Vec<Invitation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationResponse {
    pub organization_id: Uuid,
    pub role: OrganizationRole,
}

/// Pulls the required token and target id out of a validation query
pub(crate) fn required_token_and_target(
    token: Option<String>,
    target: Option<Uuid>,
    target_param: &str,
) -> ApiResult<(String, Uuid)> {
    let token = token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("token is required".to_string()))?;
    let target =
        target.ok_or_else(|| ApiError::BadRequest(format!("{} is required", target_param)))?;

    Ok((token, target))
}

pub async fn validate_invitation(
    State(state): State<AppState>,
    Query(query): Query<ValidateInvitationQuery>,
) -> ApiResult<Json<InvitationDetail>> {
    let (token, organization_id) = required_token_and_target(query.token, query.org, "org")?;

    let detail = Invitation::validate(&state.db, &token, organization_id, Utc::now()).await?;
    Ok(Json(detail))
}

pub async fn list_invitations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ListInvitationsResponse>> {
    require_org_role(&state.db, id, auth.user_id, OrganizationRole::Admin).await?;

    let invitations = Invitation::list_pending(&state.db, id).await?;
    Ok(Json(ListInvitationsResponse { invitations }))
}

/// Invites an email address into the organization
///
/// # Errors
///
/// - `400 Bad Request`: invalid email, or `role` is OWNER
/// - `403 Forbidden`: caller is not ADMIN+
/// - `409 Conflict`: the address already belongs to a member
pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateInvitationRequest>,
) -> ApiResult<(StatusCode, Json<CreatedInvitationResponse>)> {
    req.validate()?;
    require_org_role(&state.db, id, auth.user_id, OrganizationRole::Admin).await?;
    fetch_organization(&state.db, id).await?;

    if req.role == OrganizationRole::Owner {
        return Err(ApiError::BadRequest("Cannot invite as OWNER".to_string()));
    }

    let email = normalize_email(&req.email);
    let members = OrganizationMember::list_by_organization(&state.db, id).await?;
    if members.iter().any(|m| normalize_email(&m.email) == email) {
        return Err(ApiError::Conflict(
            "That address already belongs to a member".to_string(),
        ));
    }

    let invitation = Invitation::create(&state.db, id, &email, req.role, auth.user_id).await?;
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
    require_org_role(&state.db, id, auth.user_id, OrganizationRole::Admin).await?;

    if !Invitation::revoke(&state.db, id, invitation_id).await? {
        return Err(ApiError::not_found("Invitation"));
    }

    tracing::info!(organization_id = %id, invitation_id = %invitation_id, "Invitation revoked");
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts an invitation addressed to the caller's email
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AcceptInvitationRequest>,
) -> ApiResult<Json<AcceptInvitationResponse>> {
    req.validate()?;

    let accepted = Invitation::accept(
        &state.db,
        req.token.trim(),
        auth.user_id,
        &auth.email,
        Utc::now(),
    )
    .await?;

    Ok(Json(AcceptInvitationResponse {
        organization_id: accepted.organization_id,
        role: accepted.role,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_token_and_target() {
        let id = Uuid::new_v4();

        let (token, target) =
            required_token_and_target(Some(" abc ".to_string()), Some(id), "org").unwrap();
        assert_eq!(token, "abc");
        assert_eq!(target, id);

        let err = required_token_and_target(None, Some(id), "org").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = required_token_and_target(Some("  ".to_string()), Some(id), "org").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = required_token_and_target(Some("abc".to_string()), None, "org").unwrap_err();
        assert_eq!(err.to_string(), "Bad request: org is required");
    }

    #[test]
    fn test_create_request_defaults_to_member() {
        let req: CreateInvitationRequest =
            serde_json::from_str(r#"{"email":"new@example.com"}"#).unwrap();
        assert_eq!(req.role, OrganizationRole::Member);
        assert!(req.validate().is_ok());

        let req: CreateInvitationRequest =
            serde_json::from_str(r#"{"email":"not-an-email","role":"ADMIN"}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_query_accepts_both_names() {
        let id = Uuid::new_v4();
        let a: ValidateInvitationQuery =
            serde_json::from_value(serde_json::json!({ "token": "t", "org": id })).unwrap();
        let b: ValidateInvitationQuery =
            serde_json::from_value(serde_json::json!({ "token": "t", "organizationId": id }))
                .unwrap();
        assert_eq!(a.org, Some(id));
        assert_eq!(b.org, Some(id));
    }
}
