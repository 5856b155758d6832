/// Notification endpoints
///
/// - `GET /api/notifications?unreadOnly=true&limit=50`
/// - `POST /api/notifications/:id/read`
/// - `POST /api/notifications/read-all`
///
/// Notifications belong to one user; marking someone else's answers 404.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    routes::page_limit,
};
use axum::{extract::State, Extension};
use codereason_shared::{auth::middleware::AuthContext, models::notification::UserNotification};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    pub notifications: Vec<UserNotification>,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Json<NotificationsResponse>> {
    let limit = page_limit(query.limit, 50, 200);
    let notifications =
        UserNotification::list_by_user(&state.db, auth.user_id, query.unread_only, limit).await?;
    let unread_count = UserNotification::count_unread(&state.db, auth.user_id).await?;

    Ok(Json(NotificationsResponse {
        notifications,
        unread_count,
    }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserNotification>> {
    let notification = UserNotification::mark_read(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Notification"))?;

    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let updated = UserNotification::mark_all_read(&state.db, auth.user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
