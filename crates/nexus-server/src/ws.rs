//! WebSocket subscription endpoint.
//!
//! One streaming connection per workspace, opened with the bearer
//! credential as a query parameter (the browser WebSocket API cannot set
//! headers at open time). Admission runs before any data flows; a rejected
//! attempt is closed with a policy-violation frame and nothing else. Once
//! registered, the connection task pumps the subscriber's event queue to
//! the socket and watches for disconnect — it never polls.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use nexus_protocol::WorkspaceId;
use nexus_realtime::{
    AccessGate, Admission, ConnectionRegistry, IdentityResolver, Subscription,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// State for the subscription endpoint, generic over the identity and
/// access seams so tests can drive a live server with in-memory fakes.
pub struct RealtimeState<I, A> {
    pub identity: Arc<I>,
    pub access: Arc<A>,
    pub registry: Arc<ConnectionRegistry>,
}

// Manual impl: `derive(Clone)` would demand `I: Clone` + `A: Clone`.
impl<I, A> Clone for RealtimeState<I, A> {
    fn clone(&self) -> Self {
        Self {
            identity: Arc::clone(&self.identity),
            access: Arc::clone(&self.access),
            registry: Arc::clone(&self.registry),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubscribeParams {
    /// Bearer credential. Absent counts as an invalid credential and is
    /// rejected after the upgrade, like any other bad token.
    #[serde(default)]
    pub token: Option<String>,
}

pub fn routes<I, A>(state: RealtimeState<I, A>) -> Router
where
    I: IdentityResolver + Send + Sync + 'static,
    A: AccessGate + Send + Sync + 'static,
{
    Router::new()
        .route("/ws/{workspace_id}", get(subscribe::<I, A>))
        .with_state(state)
}

async fn subscribe<I, A>(
    ws: WebSocketUpgrade,
    Path(workspace_id): Path<WorkspaceId>,
    Query(params): Query<SubscribeParams>,
    State(state): State<RealtimeState<I, A>>,
) -> Response
where
    I: IdentityResolver + Send + Sync + 'static,
    A: AccessGate + Send + Sync + 'static,
{
    ws.on_upgrade(move |socket| serve_subscription(socket, state, workspace_id, params.token))
}

async fn serve_subscription<I, A>(
    mut socket: WebSocket,
    state: RealtimeState<I, A>,
    workspace_id: WorkspaceId,
    token: Option<String>,
) where
    I: IdentityResolver,
    A: AccessGate,
{
    let mut admission = Admission::new(Arc::clone(&state.registry), workspace_id);
    let credential = token.unwrap_or_default();

    let subscription = match admission
        .admit(&credential, state.identity.as_ref(), state.access.as_ref())
        .await
    {
        Ok(subscription) => subscription,
        Err(err) => {
            // Policy violation, nothing more: no events, no error body.
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: err.to_string().into(),
                })))
                .await;
            return;
        }
    };

    pump(socket, subscription).await;
}

/// Forward queued events to the socket until either side goes away, then
/// tear down exactly once (unregister itself tolerates the race with
/// delivery-failure pruning).
async fn pump(socket: WebSocket, mut subscription: Subscription) {
    let subscriber_id = subscription.handle().id();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = subscription.next_event() => match event {
                Some(payload) => {
                    if sink.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                // Queue closed: the handle was pruned out from under us.
                None => break,
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    debug!("websocket error for subscriber {subscriber_id}: {err}");
                    break;
                }
                // Inbound text/binary is ignored; the channel is server → client.
                Some(Ok(_)) => {}
            },
        }
    }

    subscription.close();
    debug!("subscriber {subscriber_id} disconnected");
}
