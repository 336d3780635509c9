//! Application state and router assembly.

use std::sync::Arc;

use axum::response::Json;
use axum::routing::{delete, get, patch, post};
use axum::{extract::State, Router};
use nexus_realtime::EventBroadcaster;
use nexus_store::Store;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::access::WorkspaceAccess;
use crate::auth::{self, Authenticator};
use crate::tasks;
use crate::workspaces;
use crate::ws::{self, RealtimeState};

/// Shared state for the REST routers. The single [`EventBroadcaster`]
/// (and the registry behind it) is the same instance the subscription
/// endpoint registers into — one broadcast domain per process.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub auth: Arc<Authenticator>,
    pub access: Arc<WorkspaceAccess>,
    pub events: EventBroadcaster,
}

/// Assemble the full application: REST API under `/api/v1`, the
/// subscription endpoint at `/ws/{workspace_id}`, and `/health`.
pub fn app(state: AppState, enable_cors: bool) -> Router {
    let realtime = RealtimeState {
        identity: Arc::clone(&state.auth),
        access: Arc::clone(&state.access),
        registry: Arc::clone(state.events.registry()),
    };

    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route(
            "/workspaces",
            post(workspaces::create_workspace).get(workspaces::list_workspaces),
        )
        .route(
            "/workspaces/{workspace_id}/members",
            get(workspaces::list_members).post(workspaces::invite_member),
        )
        .route(
            "/workspaces/{workspace_id}/members/{user_id}",
            delete(workspaces::remove_member),
        )
        .route(
            "/workspaces/{workspace_id}/tasks",
            post(tasks::create_task).get(tasks::list_tasks),
        )
        .route("/tasks/me", get(tasks::my_tasks))
        .route(
            "/tasks/{task_id}",
            patch(tasks::update_task).delete(tasks::delete_task),
        )
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/health", get(health))
        .with_state(state)
        .nest("/api/v1", api)
        .merge(ws::routes(realtime));

    if enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "subscribers": state.events.registry().total_subscribers(),
    }))
}
