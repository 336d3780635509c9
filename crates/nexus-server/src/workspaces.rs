//! Workspace and membership endpoints.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Json;
use nexus_protocol::{
    MemberInvite, Membership, UserId, Workspace, WorkspaceCreate, WorkspaceId, WorkspaceRole,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::current_user;
use crate::error::ApiError;

/// Create a TEAM workspace; the creator becomes its ADMIN.
pub async fn create_workspace(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<WorkspaceCreate>,
) -> Result<Json<Workspace>, ApiError> {
    let user = current_user(&state, &headers).await?;
    let workspace = state
        .store
        .create_team_workspace(&params.name, user.id)
        .await?;
    Ok(Json(workspace))
}

pub async fn list_workspaces(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Workspace>>, ApiError> {
    let user = current_user(&state, &headers).await?;
    let workspaces = state.store.workspaces_for_user(user.id).await?;
    Ok(Json(workspaces))
}

pub async fn list_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<WorkspaceId>,
) -> Result<Json<Vec<Membership>>, ApiError> {
    let user = current_user(&state, &headers).await?;
    state.access.require_membership(user.id, workspace_id).await?;
    let members = state.store.members(workspace_id).await?;
    Ok(Json(members))
}

/// Invite an existing user by email. ADMIN only.
pub async fn invite_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<WorkspaceId>,
    Json(params): Json<MemberInvite>,
) -> Result<Json<Membership>, ApiError> {
    let user = current_user(&state, &headers).await?;
    let membership = state.access.require_membership(user.id, workspace_id).await?;
    membership.require_role(WorkspaceRole::Admin)?;

    let invitee = state
        .store
        .user_by_email(&params.email)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let added = state
        .store
        .add_member(workspace_id, invitee.user.id, params.role)
        .await?;
    Ok(Json(added))
}

/// Remove a member. ADMIN only; the store refuses to orphan a workspace
/// by removing its last admin, and personal workspaces are untouchable.
pub async fn remove_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, member_id)): Path<(WorkspaceId, UserId)>,
) -> Result<Json<Value>, ApiError> {
    let user = current_user(&state, &headers).await?;
    let membership = state.access.require_membership(user.id, workspace_id).await?;
    membership.require_role(WorkspaceRole::Admin)?;

    let removed = state.store.remove_member(workspace_id, member_id).await?;
    if !removed {
        return Err(ApiError::NotFound("membership"));
    }
    Ok(Json(json!({ "status": "success" })))
}
