//! Task endpoints.
//!
//! Each successful mutation commits first, then hands exactly one event to
//! the broadcaster. Publishing is fire-and-forget: the response never
//! waits on delivery, and a failed mutation publishes nothing.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use nexus_protocol::{
    Task, TaskCreate, TaskEvent, TaskId, TaskPatch, TaskStatus, TaskWithWorkspace, UserId,
    WorkspaceId,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::current_user;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<UserId>,
}

pub async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<WorkspaceId>,
    Json(params): Json<TaskCreate>,
) -> Result<Json<Task>, ApiError> {
    let user = current_user(&state, &headers).await?;
    state.access.require_membership(user.id, workspace_id).await?;

    let task = state.store.create_task(workspace_id, &params).await?;
    state
        .events
        .publish(workspace_id, &TaskEvent::Created { task: task.clone() });
    Ok(Json(task))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<WorkspaceId>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let user = current_user(&state, &headers).await?;
    state.access.require_membership(user.id, workspace_id).await?;
    let tasks = state
        .store
        .tasks_in_workspace(workspace_id, filter.status, filter.assignee_id)
        .await?;
    Ok(Json(tasks))
}

/// Tasks assigned to the caller across all their workspaces.
pub async fn my_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<TaskWithWorkspace>>, ApiError> {
    let user = current_user(&state, &headers).await?;
    let tasks = state.store.tasks_assigned_to(user.id).await?;
    Ok(Json(tasks))
}

/// Partial update. Access is checked against the task's own workspace.
pub async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<TaskId>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    let user = current_user(&state, &headers).await?;
    let task = state
        .store
        .task_by_id(task_id)
        .await?
        .ok_or(ApiError::NotFound("task"))?;
    state
        .access
        .require_membership(user.id, task.workspace_id)
        .await?;

    let updated = state
        .store
        .update_task(task_id, &patch)
        .await?
        .ok_or(ApiError::NotFound("task"))?;
    state.events.publish(
        updated.workspace_id,
        &TaskEvent::Updated {
            task: updated.clone(),
        },
    );
    Ok(Json(updated))
}

pub async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(task_id): Path<TaskId>,
) -> Result<Json<Value>, ApiError> {
    let user = current_user(&state, &headers).await?;
    let task = state
        .store
        .task_by_id(task_id)
        .await?
        .ok_or(ApiError::NotFound("task"))?;
    state
        .access
        .require_membership(user.id, task.workspace_id)
        .await?;

    let deleted = state.store.delete_task(task_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("task"));
    }
    state
        .events
        .publish(task.workspace_id, &TaskEvent::Deleted { task_id });
    Ok(Json(json!({ "status": "success", "message": "Task deleted" })))
}
