//! End-to-end subscription tests — a live axum server with in-memory
//! identity/access seams, driven by real WebSocket clients: admission
//! rejection closes with a policy-violation frame, admitted members
//! receive published events, workspaces stay isolated.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use nexus_protocol::{
    AccessError, Membership, Task, TaskEvent, TaskPriority, TaskStatus, UserId, WorkspaceId,
    WorkspaceRole, POLICY_VIOLATION,
};
use nexus_realtime::{AccessGate, ConnectionRegistry, EventBroadcaster, IdentityResolver};
use nexus_server::ws::{routes, RealtimeState};
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};

// ─────────────────────────────────────────────────────────────────────────────
// Test server
// ─────────────────────────────────────────────────────────────────────────────

struct TestIdentity {
    tokens: HashMap<String, UserId>,
}

impl IdentityResolver for TestIdentity {
    async fn resolve(&self, credential: &str) -> Result<UserId, AccessError> {
        self.tokens
            .get(credential)
            .copied()
            .ok_or(AccessError::Unauthenticated)
    }
}

struct TestAccess {
    memberships: HashMap<(WorkspaceId, UserId), WorkspaceRole>,
}

impl AccessGate for TestAccess {
    async fn authorize(
        &self,
        principal_id: UserId,
        workspace_id: WorkspaceId,
    ) -> Result<Membership, AccessError> {
        self.memberships
            .get(&(workspace_id, principal_id))
            .map(|role| Membership {
                workspace_id,
                user_id: principal_id,
                role: *role,
            })
            .ok_or(AccessError::NotAMember)
    }
}

/// Start the subscription endpoint on a random port with fixed tokens and
/// memberships. Returns the port plus the registry/broadcaster pair the
/// server uses.
async fn start_test_server(
    tokens: &[(&str, UserId)],
    memberships: &[(WorkspaceId, UserId, WorkspaceRole)],
) -> (u16, Arc<ConnectionRegistry>, EventBroadcaster) {
    let registry = Arc::new(ConnectionRegistry::new());
    let broadcaster = EventBroadcaster::new(Arc::clone(&registry));

    let identity = TestIdentity {
        tokens: tokens
            .iter()
            .map(|(token, user)| (token.to_string(), *user))
            .collect(),
    };
    let access = TestAccess {
        memberships: memberships
            .iter()
            .map(|(workspace, user, role)| ((*workspace, *user), *role))
            .collect(),
    };

    let state = RealtimeState {
        identity: Arc::new(identity),
        access: Arc::new(access),
        registry: Arc::clone(&registry),
    };
    let app = routes(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (port, registry, broadcaster)
}

async fn connect(port: u16, workspace_id: WorkspaceId, token: &str) -> WsClient {
    let url = format!("ws://127.0.0.1:{port}/ws/{workspace_id}?token={token}");
    let (ws, _) = connect_async(&url).await.expect("failed to connect");
    ws
}

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Admission happens on the server after the upgrade completes; wait until
/// the registry reflects it before publishing.
async fn wait_for_subscribers(
    registry: &ConnectionRegistry,
    workspace_id: WorkspaceId,
    expected: usize,
) {
    for _ in 0..100 {
        if registry.subscriber_count(workspace_id) == expected {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "workspace {workspace_id} never reached {expected} subscriber(s), have {}",
        registry.subscriber_count(workspace_id)
    );
}

/// Expect the connection to be closed with a policy-violation frame.
async fn expect_policy_violation(ws: &mut WsClient) {
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for close frame")
        .expect("stream ended without close frame")
        .expect("websocket error");
    match msg {
        Message::Close(Some(frame)) => {
            assert_eq!(u16::from(frame.code), POLICY_VIOLATION, "close code");
        }
        other => panic!("expected policy-violation close, got {other:?}"),
    }
}

async fn next_json(ws: &mut WsClient) -> Value {
    let msg = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for event")
        .expect("stream ended")
        .expect("websocket error");
    let text = msg.into_text().unwrap();
    serde_json::from_str(&text).unwrap()
}

fn task_in_workspace(workspace_id: WorkspaceId) -> Task {
    let now = chrono::Utc::now();
    Task {
        id: 1,
        title: "Draft the announcement".into(),
        description: None,
        status: TaskStatus::Todo,
        priority: TaskPriority::P2,
        workspace_id,
        assignee_id: None,
        due_date: None,
        created_at: now,
        updated_at: now,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bad_token_is_rejected_with_policy_violation() {
    let (port, registry, _broadcaster) =
        start_test_server(&[("tok-u1", 1)], &[(10, 1, WorkspaceRole::Member)]).await;

    let mut ws = connect(port, 10, "forged").await;
    expect_policy_violation(&mut ws).await;
    assert!(registry.snapshot(10).is_empty());
}

#[tokio::test]
async fn non_member_is_rejected_with_policy_violation() {
    let (port, registry, _broadcaster) =
        start_test_server(&[("tok-u2", 2)], &[(10, 1, WorkspaceRole::Admin)]).await;

    let mut ws = connect(port, 10, "tok-u2").await;
    expect_policy_violation(&mut ws).await;
    assert!(registry.snapshot(10).is_empty());
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let (port, registry, _broadcaster) =
        start_test_server(&[("tok-u1", 1)], &[(10, 1, WorkspaceRole::Member)]).await;

    let url = format!("ws://127.0.0.1:{port}/ws/10");
    let (mut ws, _) = connect_async(&url).await.expect("failed to connect");
    expect_policy_violation(&mut ws).await;
    assert!(registry.snapshot(10).is_empty());
}

#[tokio::test]
async fn admitted_member_receives_published_events() {
    let (port, registry, broadcaster) =
        start_test_server(&[("tok-u1", 1)], &[(10, 1, WorkspaceRole::Member)]).await;

    let mut ws = connect(port, 10, "tok-u1").await;
    wait_for_subscribers(&registry, 10, 1).await;

    broadcaster.publish(
        10,
        &TaskEvent::Created {
            task: task_in_workspace(10),
        },
    );

    let json = next_json(&mut ws).await;
    assert_eq!(json["type"], "TASK_CREATED");
    assert_eq!(json["task"]["workspace_id"], 10);
    assert_eq!(json["task"]["title"], "Draft the announcement");
}

#[tokio::test]
async fn events_stay_inside_their_workspace() {
    let (port, registry, broadcaster) = start_test_server(
        &[("tok-u1", 1), ("tok-u2", 2)],
        &[(10, 1, WorkspaceRole::Member), (20, 2, WorkspaceRole::Member)],
    )
    .await;

    let mut ws_a = connect(port, 10, "tok-u1").await;
    let mut ws_b = connect(port, 20, "tok-u2").await;
    wait_for_subscribers(&registry, 10, 1).await;
    wait_for_subscribers(&registry, 20, 1).await;

    broadcaster.publish(
        10,
        &TaskEvent::Created {
            task: task_in_workspace(10),
        },
    );
    // Marker for workspace 20 — it must be the first thing B sees.
    broadcaster.publish(20, &TaskEvent::Deleted { task_id: 777 });

    let json_a = next_json(&mut ws_a).await;
    assert_eq!(json_a["type"], "TASK_CREATED");
    assert_eq!(json_a["task"]["workspace_id"], 10);

    let json_b = next_json(&mut ws_b).await;
    assert_eq!(json_b["type"], "TASK_DELETED");
    assert_eq!(json_b["task_id"], 777);
}

#[tokio::test]
async fn disconnect_unregisters_the_subscriber() {
    let (port, registry, _broadcaster) =
        start_test_server(&[("tok-u1", 1)], &[(10, 1, WorkspaceRole::Member)]).await;

    let mut ws = connect(port, 10, "tok-u1").await;
    wait_for_subscribers(&registry, 10, 1).await;

    ws.close(None).await.unwrap();
    wait_for_subscribers(&registry, 10, 0).await;
    assert_eq!(registry.total_subscribers(), 0);
}

#[tokio::test]
async fn sequential_publishes_arrive_in_order() {
    let (port, registry, broadcaster) =
        start_test_server(&[("tok-u1", 1)], &[(10, 1, WorkspaceRole::Member)]).await;

    let mut ws = connect(port, 10, "tok-u1").await;
    wait_for_subscribers(&registry, 10, 1).await;

    for task_id in 1..=4 {
        broadcaster.publish(10, &TaskEvent::Deleted { task_id });
    }
    for task_id in 1..=4 {
        let json = next_json(&mut ws).await;
        assert_eq!(json["task_id"], task_id);
    }
}
