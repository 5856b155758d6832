/// Trial endpoints
///
/// - `GET /api/trial`: current trial status (expires an overdue trial)
/// - `POST /api/trial/start`: starts the one trial a FREE account gets
///
/// `POST /api/trial/start` answers 409 when the trial was already used or the
/// account is on a paid tier.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::Json,
};
use axum::{extract::State, http::StatusCode, Extension};
use chrono::Utc;
use codereason_shared::{
    auth::middleware::AuthContext,
    trial::{resolve_trial_status, start_trial as begin_trial, TrialStatus},
};

pub async fn get_trial_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TrialStatus>> {
    let resolved = resolve_trial_status(&state.db, auth.user_id, Utc::now()).await?;
    Ok(Json(resolved.status))
}

pub async fn start_trial(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<(StatusCode, Json<TrialStatus>)> {
    let now = Utc::now();
    let user = begin_trial(&state.db, auth.user_id, now, state.config.trial_days).await?;

    Ok((StatusCode::CREATED, Json(TrialStatus::evaluate(&user, now))))
}
