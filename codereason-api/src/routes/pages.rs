/// Page data endpoints
///
/// Each endpoint gathers everything one screen needs in a single response.
///
/// `GET /api/pages/dashboard?organizationId=` selects the requested
/// organization, or the caller's first one when none is given. Asking for an
/// organization the caller doesn't belong to answers 403. A caller with no
/// organizations gets `organization: null` and empty lists.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{Json, Path, Query},
    routes::fetch_workspace,
};
use axum::{extract::State, Extension};
use chrono::Utc;
use codereason_shared::{
    auth::{
        authorization::{require_org_member, require_workspace_role},
        middleware::AuthContext,
    },
    models::{
        analysis::{Analysis, AnalysisListItem},
        chat_session::{ChatSession, ChatSessionSummary},
        notification::UserNotification,
        organization::{Organization, OrganizationSummary},
        workspace::Workspace,
        workspace_member::{WorkspaceMember, WorkspaceMemberDetail, WorkspaceRole},
    },
    quota::UsageReport,
    trial::{resolve_trial_status, TrialStatus},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Analyses shown on the dashboard
const RECENT_ANALYSES: i64 = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub organizations: Vec<OrganizationSummary>,
    pub organization: Option<OrganizationSummary>,
    pub workspaces: Vec<Workspace>,
    pub recent_analyses: Vec<AnalysisListItem>,
    pub usage: Option<UsageReport>,
    pub unread_notifications: i64,
    pub trial: TrialStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacePageResponse {
    pub workspace: Workspace,
    pub role: WorkspaceRole,
    pub members: Vec<WorkspaceMemberDetail>,
    pub chat_sessions: Vec<ChatSessionSummary>,
}

/// Picks the organization a dashboard shows
fn select_organization(
    organizations: &[OrganizationSummary],
    requested: Option<Uuid>,
) -> Option<OrganizationSummary> {
    match requested {
        Some(id) => organizations.iter().find(|org| org.id == id).cloned(),
        None => organizations.first().cloned(),
    }
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<DashboardResponse>> {
    let trial = resolve_trial_status(&state.db, auth.user_id, Utc::now()).await?;
    let organizations = Organization::list_for_user(&state.db, auth.user_id).await?;

    if let Some(requested) = query.organization_id {
        require_org_member(&state.db, requested, auth.user_id).await?;
    }
    let organization = select_organization(&organizations, query.organization_id);

    let (workspaces, recent_analyses, usage) = match &organization {
        Some(org) => (
            Workspace::list_by_organization(&state.db, org.id).await?,
            Analysis::list_recent_by_organization(&state.db, org.id, RECENT_ANALYSES).await?,
            Some(state.quota.organization_usage(org.id).await?),
        ),
        None => (Vec::new(), Vec::new(), None),
    };

    let unread_notifications = UserNotification::count_unread(&state.db, auth.user_id).await?;

    Ok(Json(DashboardResponse {
        organizations,
        organization,
        workspaces,
        recent_analyses,
        usage,
        unread_notifications,
        trial: trial.status,
    }))
}

pub async fn workspace_page(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkspacePageResponse>> {
    let workspace = fetch_workspace(&state.db, id).await?;
    let role =
        require_workspace_role(&state.db, &workspace, auth.user_id, WorkspaceRole::Viewer).await?;

    let members = WorkspaceMember::list_by_workspace(&state.db, id).await?;
    let chat_sessions = ChatSession::list_by_workspace(&state.db, id).await?;

    Ok(Json(WorkspacePageResponse {
        workspace,
        role,
        members,
        chat_sessions,
    }))
}
