/// Analysis endpoints
///
/// # Endpoints
///
/// ```text
/// GET   /api/repositories/:id/analyses?limit=20&offset=0
/// POST  /api/repositories/:id/analyses   { "kind": "PR_REVIEW", "prNumber": 42 }
/// GET   /api/analyses/:id
/// PATCH /api/analyses/:id                { "status": "COMPLETED", "summary": "...", "result": {...} }
/// ```
///
/// Any organization member may list, read and request analyses. A
/// `PR_REVIEW` request counts against the caller's monthly PR review quota
/// and is refused with 403 once it is used up.
///
/// Only the requester or an organization ADMIN+ may move an analysis through
/// its states. A transition the state machine doesn't allow answers 400; one
/// that loses a race with another update answers 409.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    routes::{fetch_repository, page_limit},
};
use axum::{extract::State, http::StatusCode, Extension};
use codereason_shared::{
    auth::{
        authorization::{require_org_member, require_owner_or_org_admin},
        middleware::AuthContext,
    },
    models::analysis::{Analysis, AnalysisKind, AnalysisStatus, CreateAnalysis},
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAnalysesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnalysisRequest {
    pub kind: AnalysisKind,

    #[validate(range(min = 1, message = "PR number must be positive"))]
    pub pr_number: Option<i32>,

    #[validate(length(min = 7, max = 64, message = "Commit SHA must be 7-64 characters"))]
    pub commit_sha: Option<String>,
}

impl CreateAnalysisRequest {
    /// PR reviews name their pull request; full scans don't
    fn check_kind(&self) -> ApiResult<()> {
        match (self.kind, self.pr_number) {
            (AnalysisKind::PrReview, None) => Err(ApiError::BadRequest(
                "prNumber is required for PR reviews".to_string(),
            )),
            (AnalysisKind::FullScan, Some(_)) => Err(ApiError::BadRequest(
                "prNumber only applies to PR reviews".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnalysisRequest {
    pub status: AnalysisStatus,

    #[validate(length(max = 10000, message = "Summary must be at most 10000 characters"))]
    pub summary: Option<String>,

    pub result: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAnalysesResponse {
    pub analyses: Vec<Analysis>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_analyses(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(repository_id): Path<Uuid>,
    Query(query): Query<ListAnalysesQuery>,
) -> ApiResult<Json<ListAnalysesResponse>> {
    let repository = fetch_repository(&state.db, repository_id).await?;
    require_org_member(&state.db, repository.organization_id, auth.user_id).await?;

    let limit = page_limit(query.limit, 20, 100);
    let offset = query.offset.unwrap_or(0).max(0);
    let analyses = Analysis::list_by_repository(&state.db, repository_id, limit, offset).await?;

    Ok(Json(ListAnalysesResponse {
        analyses,
        limit,
        offset,
    }))
}

/// Starts an analysis of a repository
///
/// PR reviews count against the caller's monthly review quota. The quota is
/// read before the insert without a lock, so concurrent requests can overshoot
/// the limit by a few rows.
pub async fn create_analysis(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(repository_id): Path<Uuid>,
    Json(req): Json<CreateAnalysisRequest>,
) -> ApiResult<(StatusCode, Json<Analysis>)> {
    req.validate()?;
    req.check_kind()?;

    let repository = fetch_repository(&state.db, repository_id).await?;
    require_org_member(&state.db, repository.organization_id, auth.user_id).await?;

    if req.kind == AnalysisKind::PrReview {
        state.quota.enforce_review(auth.user_id).await?;
    }

    let analysis = Analysis::create(
        &state.db,
        CreateAnalysis {
            repository_id,
            user_id: auth.user_id,
            kind: req.kind,
            pr_number: req.pr_number,
            commit_sha: req.commit_sha,
        },
    )
    .await?;

    tracing::info!(
        analysis_id = %analysis.id,
        repository_id = %repository_id,
        kind = ?analysis.kind,
        "Analysis requested"
    );
    Ok((StatusCode::CREATED, Json(analysis)))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Analysis>> {
    let analysis = Analysis::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Analysis"))?;
    let repository = fetch_repository(&state.db, analysis.repository_id).await?;
    require_org_member(&state.db, repository.organization_id, auth.user_id).await?;

    Ok(Json(analysis))
}

pub async fn update_analysis(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAnalysisRequest>,
) -> ApiResult<Json<Analysis>> {
    req.validate()?;

    let analysis = Analysis::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Analysis"))?;
    let repository = fetch_repository(&state.db, analysis.repository_id).await?;
    require_owner_or_org_admin(&state.db, &auth, repository.organization_id, analysis.user_id)
        .await?;

    if !analysis.status.can_transition_to(req.status) {
        return Err(ApiError::BadRequest(format!(
            "Cannot move analysis from {} to {}",
            analysis.status.as_str(),
            req.status.as_str()
        )));
    }

    let updated = Analysis::transition(
        &state.db,
        id,
        analysis.status,
        req.status,
        req.summary.as_deref(),
        req.result.as_ref(),
    )
    .await?
    .ok_or_else(|| ApiError::Conflict("Analysis was updated concurrently".to_string()))?;

    tracing::info!(
        analysis_id = %id,
        from = analysis.status.as_str(),
        to = updated.status.as_str(),
        "Analysis status changed"
    );
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> CreateAnalysisRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_pr_review_needs_pr_number() {
        assert!(parse(r#"{"kind":"PR_REVIEW"}"#).check_kind().is_err());
        assert!(parse(r#"{"kind":"PR_REVIEW","prNumber":42}"#).check_kind().is_ok());
    }

    #[test]
    fn test_full_scan_rejects_pr_number() {
        assert!(parse(r#"{"kind":"FULL_SCAN"}"#).check_kind().is_ok());
        assert!(parse(r#"{"kind":"FULL_SCAN","prNumber":1}"#).check_kind().is_err());
    }

    #[test]
    fn test_create_request_field_validation() {
        assert!(parse(r#"{"kind":"PR_REVIEW","prNumber":0}"#).validate().is_err());
        assert!(parse(r#"{"kind":"FULL_SCAN","commitSha":"abc"}"#).validate().is_err());
        assert!(parse(r#"{"kind":"FULL_SCAN","commitSha":"0a1b2c3d"}"#).validate().is_ok());
    }

    #[test]
    fn test_update_request_parses_status() {
        let req: UpdateAnalysisRequest =
            serde_json::from_str(r#"{"status":"RUNNING"}"#).unwrap();
        assert_eq!(req.status, AnalysisStatus::Running);
        assert!(req.result.is_none());
    }
}
