//! EventBroadcaster — workspace-scoped fan-out of task events.

use std::sync::Arc;

use nexus_protocol::{TaskEvent, WorkspaceId};
use tracing::{debug, warn};

use crate::registry::ConnectionRegistry;

/// Fans an event out to every handle currently registered for a workspace.
///
/// `publish` is the bridge between a committed task mutation and the live
/// subscribers: the mutation handler calls it exactly once after a
/// successful commit, and never for a failed one. It enqueues on each
/// subscriber's own queue and returns immediately — the mutation's caller
/// never waits on delivery, and events published in sequence by one caller
/// reach each surviving subscriber in that sequence.
///
/// Delivery is best-effort at-most-once. A handle whose channel has closed
/// is pruned from the registry and never notified again; the failure stays
/// local to that handle.
#[derive(Clone)]
pub struct EventBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl EventBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver `event` to every subscriber of `workspace_id`, independently
    /// per handle. Fire-and-forget from the caller's perspective.
    pub fn publish(&self, workspace_id: WorkspaceId, event: &TaskEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("failed to encode {} event: {err}", event.kind());
                return;
            }
        };

        let snapshot = self.registry.snapshot(workspace_id);
        if snapshot.is_empty() {
            return;
        }

        let mut stale = Vec::new();
        for handle in &snapshot {
            if handle.deliver(payload.clone()).is_err() {
                stale.push(handle.id());
            }
        }

        for subscriber_id in stale {
            debug!("pruning dead subscriber {subscriber_id} from workspace {workspace_id}");
            self.registry.unregister(workspace_id, subscriber_id);
        }

        debug!(
            "published {} to {} subscriber(s) of workspace {workspace_id}",
            event.kind(),
            snapshot.len()
        );
    }
}
