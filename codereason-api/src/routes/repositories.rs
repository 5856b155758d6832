/// Repository endpoints
///
/// Members list and read repositories. Connecting and disconnecting needs
/// ADMIN+. Connecting a full name the organization already has answers 409.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    routes::{fetch_organization, fetch_repository},
};
use axum::{extract::State, http::StatusCode, Extension};
use codereason_shared::{
    auth::{
        authorization::{require_org_member, require_org_role},
        middleware::AuthContext,
    },
    models::{
        organization_member::OrganizationRole,
        repository::{CreateRepository, Repository},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRepositoryRequest {
    /// Owner-qualified name, e.g. `acme/api`
    #[validate(custom(function = "validate_full_name"))]
    pub full_name: String,

    #[validate(url(message = "A valid repository URL is required"))]
    pub url: String,

    #[validate(length(min = 1, max = 50, message = "Provider must be 1-50 characters"))]
    pub provider: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Branch must be 1-255 characters"))]
    pub default_branch: Option<String>,
}

fn validate_full_name(full_name: &str) -> Result<(), ValidationError> {
    let valid = full_name.len() <= 512
        && full_name
            .split_once('/')
            .map(|(owner, name)| !owner.is_empty() && !name.is_empty())
            .unwrap_or(false)
        && !full_name.chars().any(char::is_whitespace);

    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("full_name");
        err.message = Some("Full name must look like owner/name".into());
        Err(err)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRepositoriesResponse {
    pub repositories: Vec<Repository>,
}

pub async fn list_repositories(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(organization_id): Path<Uuid>,
) -> ApiResult<Json<ListRepositoriesResponse>> {
    require_org_member(&state.db, organization_id, auth.user_id).await?;

    let repositories = Repository::list_by_organization(&state.db, organization_id).await?;
    Ok(Json(ListRepositoriesResponse { repositories }))
}

pub async fn connect_repository(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(organization_id): Path<Uuid>,
    Json(req): Json<ConnectRepositoryRequest>,
) -> ApiResult<(StatusCode, Json<Repository>)> {
    req.validate()?;
    require_org_role(&state.db, organization_id, auth.user_id, OrganizationRole::Admin).await?;
    fetch_organization(&state.db, organization_id).await?;

    let repository = Repository::create(
        &state.db,
        CreateRepository {
            organization_id,
            full_name: req.full_name,
            url: req.url,
            provider: req.provider,
            default_branch: req.default_branch,
        },
    )
    .await
    .map_err(|err| match ApiError::from(err) {
        ApiError::Conflict(_) => {
            ApiError::Conflict("Repository is already connected to this organization".to_string())
        }
        other => other,
    })?;

    tracing::info!(
        repository_id = %repository.id,
        organization_id = %organization_id,
        full_name = %repository.full_name,
        "Repository connected"
    );
    Ok((StatusCode::CREATED, Json(repository)))
}

pub async fn get_repository(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Repository>> {
    let repository = fetch_repository(&state.db, id).await?;
    require_org_member(&state.db, repository.organization_id, auth.user_id).await?;

    Ok(Json(repository))
}

pub async fn disconnect_repository(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let repository = fetch_repository(&state.db, id).await?;
    require_org_role(
        &state.db,
        repository.organization_id,
        auth.user_id,
        OrganizationRole::Admin,
    )
    .await?;

    if !Repository::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Repository"));
    }

    tracing::info!(repository_id = %id, "Repository disconnected");
    Ok(StatusCode::NO_CONTENT)
}
