/// Billing usage endpoints
///
/// # Endpoints
///
/// ```text
/// GET /api/billing/usage?organizationId=<uuid>
/// ```
///
/// ```json
/// { "analysesRun": 4, "analysesLimit": 10, "remaining": 6, "tier": "FREE" }
/// ```
///
/// The limit is the organization owner's, `-1` meaning unlimited. Any member
/// of the organization may read it.
///
/// ```text
/// GET /api/billing/reviews
/// ```
///
/// The caller's own PR review quota for this month.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Query},
};
use axum::{extract::State, Extension};
use codereason_shared::{
    auth::{authorization::require_org_member, middleware::AuthContext},
    quota::{QuotaCheckResult, UsageReport},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageQuery {
    pub organization_id: Option<Uuid>,
}

pub async fn get_usage(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Json<UsageReport>> {
    let organization_id = query
        .organization_id
        .ok_or_else(|| ApiError::BadRequest("organizationId is required".to_string()))?;

    require_org_member(&state.db, organization_id, auth.user_id).await?;

    let report = state.quota.organization_usage(organization_id).await?;
    Ok(Json(report))
}

pub async fn get_review_usage(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<QuotaCheckResult>> {
    Ok(Json(state.quota.review_usage(auth.user_id).await?))
}
