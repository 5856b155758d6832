/// Chat session endpoints
///
/// Workspace VIEWERs can read sessions and transcripts. Starting a session and
/// appending messages needs EDITOR. Renaming or deleting a session is left to
/// the user who started it (while still an EDITOR) and to workspace ADMINs.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Json, OptionalJson, Path},
    routes::fetch_workspace,
};
use axum::{extract::State, http::StatusCode, Extension};
use codereason_shared::{
    auth::{authorization::require_workspace_role, middleware::AuthContext},
    models::{
        chat_session::{ChatMessage, ChatMessageRole, ChatSession, ChatSessionSummary},
        workspace::Workspace,
        workspace_member::WorkspaceRole,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RenameSessionRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AppendMessageRequest {
    #[serde(default = "default_message_role")]
    pub role: ChatMessageRole,

    #[validate(length(min = 1, max = 100000, message = "Content must be 1-100000 characters"))]
    pub content: String,
}

fn default_message_role() -> ChatMessageRole {
    ChatMessageRole::User
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsResponse {
    pub sessions: Vec<ChatSessionSummary>,
}

/// Session with its full transcript
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// Loads a session and its workspace, checking the caller's workspace role
async fn load_session(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    required: WorkspaceRole,
) -> ApiResult<(ChatSession, Workspace, WorkspaceRole)> {
    let session = ChatSession::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Chat session"))?;
    let workspace = fetch_workspace(&state.db, session.workspace_id).await?;
    let role = require_workspace_role(&state.db, &workspace, auth.user_id, required).await?;

    Ok((session, workspace, role))
}

/// Creator with write access, or a workspace ADMIN
fn can_manage(session: &ChatSession, auth: &AuthContext, role: WorkspaceRole) -> bool {
    role == WorkspaceRole::Admin || (session.user_id == auth.user_id && role.can_write())
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(workspace_id): Path<Uuid>,
) -> ApiResult<Json<ListSessionsResponse>> {
    let workspace = fetch_workspace(&state.db, workspace_id).await?;
    require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Viewer).await?;

    let sessions = ChatSession::list_by_workspace(&state.db, workspace_id).await?;
    Ok(Json(ListSessionsResponse { sessions }))
}

pub async fn create_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(workspace_id): Path<Uuid>,
    OptionalJson(body): OptionalJson<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<ChatSession>)> {
    let req = body.unwrap_or_default();
    req.validate()?;

    let workspace = fetch_workspace(&state.db, workspace_id).await?;
    require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Editor).await?;

    let title = req.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let session = ChatSession::create(&state.db, workspace_id, auth.user_id, title).await?;

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionResponse>> {
    let (session, _, _) = load_session(&state, &auth, id, WorkspaceRole::Viewer).await?;
    let messages = ChatSession::messages(&state.db, id).await?;

    Ok(Json(SessionResponse { session, messages }))
}

pub async fn rename_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameSessionRequest>,
) -> ApiResult<Json<ChatSession>> {
    let title = req.title.trim().to_string();
    RenameSessionRequest { title: title.clone() }.validate()?;

    let (session, _, role) = load_session(&state, &auth, id, WorkspaceRole::Viewer).await?;
    if !can_manage(&session, &auth, role) {
        return Err(ApiError::Forbidden(
            "Only the session's creator or a workspace admin can rename it".to_string(),
        ));
    }

    let session = ChatSession::rename(&state.db, id, &title)
        .await?
        .ok_or_else(|| ApiError::not_found("Chat session"))?;

    Ok(Json(session))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (session, workspace, role) = load_session(&state, &auth, id, WorkspaceRole::Viewer).await?;
    if !can_manage(&session, &auth, role) {
        return Err(ApiError::Forbidden(
            "Only the session's creator or a workspace admin can delete it".to_string(),
        ));
    }

    if !ChatSession::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Chat session"));
    }

    tracing::info!(session_id = %id, workspace_id = %workspace.id, "Chat session deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn append_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<AppendMessageRequest>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    req.validate()?;
    load_session(&state, &auth, id, WorkspaceRole::Editor).await?;

    let message = ChatSession::append_message(&state.db, id, req.role, &req.content).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use codereason_shared::models::user::SubscriptionTier;

    fn auth(user_id: Uuid) -> AuthContext {
        AuthContext {
            user_id,
            subject: "user_test".to_string(),
            email: "dev@example.com".to_string(),
            tier: SubscriptionTier::Free,
        }
    }

    fn session(user_id: Uuid) -> ChatSession {
        ChatSession {
            id: Uuid::new_v4(),
            workspace_id: Uuid::new_v4(),
            user_id,
            title: "New chat".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_manage() {
        let creator = Uuid::new_v4();
        let other = Uuid::new_v4();
        let session = session(creator);

        assert!(can_manage(&session, &auth(creator), WorkspaceRole::Editor));
        assert!(!can_manage(&session, &auth(creator), WorkspaceRole::Viewer));
        assert!(!can_manage(&session, &auth(other), WorkspaceRole::Editor));
        assert!(can_manage(&session, &auth(other), WorkspaceRole::Admin));
    }

    #[test]
    fn test_append_defaults_to_user_role() {
        let req: AppendMessageRequest = serde_json::from_str(r#"{"content":"hello"}"#).unwrap();
        assert_eq!(req.role, ChatMessageRole::User);
        assert!(req.validate().is_ok());

        let req: AppendMessageRequest =
            serde_json::from_str(r#"{"role":"ASSISTANT","content":""}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
