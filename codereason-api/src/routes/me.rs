/// Current user endpoints
///
/// # Endpoints
///
/// - `GET /api/me`: profile, trial status, credit balance, unread count
/// - `PATCH /api/me`: update display name or avatar
///
/// Reading the profile resolves the trial first, so an overdue trial is
/// expired by the request that notices it.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::Json,
};
use axum::{extract::State, Extension};
use chrono::Utc;
use codereason_shared::{
    auth::middleware::AuthContext,
    models::{
        credit::Credit,
        notification::UserNotification,
        user::{UpdateUser, User},
    },
    trial::{resolve_trial_status, TrialStatus},
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateUrl, ValidationError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: User,
    pub trial: TrialStatus,
    pub credit_balance: i64,
    pub unread_notifications: i64,
}

/// Profile update; an empty string clears the field
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_avatar_url"))]
    pub avatar_url: Option<String>,
}

fn validate_avatar_url(url: &str) -> Result<(), ValidationError> {
    if url.is_empty() || (url.len() <= 2048 && url.starts_with("https://") && url.validate_url()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("avatar_url");
        err.message = Some("Avatar URL must be an https URL".into());
        Err(err)
    }
}

fn clearable(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| {
        let trimmed = v.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    })
}

impl UpdateMeRequest {
    fn into_update(self) -> UpdateUser {
        UpdateUser {
            name: clearable(self.name),
            avatar_url: clearable(self.avatar_url),
        }
    }
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let resolved = resolve_trial_status(&state.db, auth.user_id, Utc::now()).await?;
    let credit_balance = Credit::balance(&state.db, auth.user_id).await?;
    let unread_notifications = UserNotification::count_unread(&state.db, auth.user_id).await?;

    Ok(Json(MeResponse {
        user: resolved.user,
        trial: resolved.status,
        credit_balance,
        unread_notifications,
    }))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateMeRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let user = User::update(&state.db, auth.user_id, req.into_update())
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    tracing::info!(user_id = %user.id, "Profile updated");
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_clears() {
        let update = UpdateMeRequest {
            name: Some("  ".to_string()),
            avatar_url: None,
        }
        .into_update();

        assert_eq!(update.name, Some(None));
        assert_eq!(update.avatar_url, None);
    }

    #[test]
    fn test_name_is_trimmed() {
        let update = UpdateMeRequest {
            name: Some(" Ada ".to_string()),
            avatar_url: None,
        }
        .into_update();
        assert_eq!(update.name, Some(Some("Ada".to_string())));
    }

    #[test]
    fn test_avatar_url_validation() {
        assert!(validate_avatar_url("").is_ok());
        assert!(validate_avatar_url("https://cdn.example.com/a.png").is_ok());
        assert!(validate_avatar_url("http://cdn.example.com/a.png").is_err());
        assert!(validate_avatar_url("javascript:alert(1)").is_err());
    }
}
