/// Referral and credit endpoints
///
/// - `GET /api/referrals`: the caller's code, referral count and balance
/// - `POST /api/referrals/redeem`: redeem another user's code
/// - `GET /api/credits?limit=`: credit ledger, newest first

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Query},
    routes::page_limit,
};
use axum::{extract::State, http::StatusCode, Extension};
use codereason_shared::{
    auth::middleware::AuthContext,
    models::{
        credit::Credit,
        referral::{Referral, ReferralSummary, REFERRAL_CREDIT_AMOUNT},
        user::User,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RedeemRequest {
    #[validate(length(equal = 8, message = "Referral codes are 8 characters"))]
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResponse {
    pub referral: Referral,
    pub credits_granted: i32,
    pub credit_balance: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreditsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsResponse {
    pub balance: i64,
    pub entries: Vec<Credit>,
}

async fn current_user(db: &PgPool, user_id: Uuid) -> ApiResult<User> {
    User::find_by_id(db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

pub async fn get_referrals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ReferralSummary>> {
    let user = current_user(&state.db, auth.user_id).await?;
    Ok(Json(Referral::summary(&state.db, &user).await?))
}

pub async fn redeem_referral(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(mut req): Json<RedeemRequest>,
) -> ApiResult<(StatusCode, Json<RedeemResponse>)> {
    req.code = req.code.trim().to_uppercase();
    req.validate()?;

    let user = current_user(&state.db, auth.user_id).await?;
    let referral = Referral::redeem(&state.db, &user, &req.code).await?;
    let credit_balance = Credit::balance(&state.db, user.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(RedeemResponse {
            referral,
            credits_granted: REFERRAL_CREDIT_AMOUNT,
            credit_balance,
        }),
    ))
}

pub async fn list_credits(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<CreditsQuery>,
) -> ApiResult<Json<CreditsResponse>> {
    let limit = page_limit(query.limit, 50, 200);
    let balance = Credit::balance(&state.db, auth.user_id).await?;
    let entries = Credit::list_by_user(&state.db, auth.user_id, limit).await?;

    Ok(Json(CreditsResponse { balance, entries }))
}
