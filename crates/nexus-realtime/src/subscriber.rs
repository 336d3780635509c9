//! Subscriber handles — the sending side of one open subscription.

use nexus_protocol::{UserId, WorkspaceId};
use tokio::sync::mpsc;
use uuid::Uuid;

pub type SubscriberId = Uuid;

/// The subscriber's outbound channel is closed; it will never receive
/// another payload and should be pruned from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberGone;

/// One live, authenticated real-time connection, tagged with the workspace
/// it is registered under and the principal that authenticated it.
///
/// Exists only in process memory. Handles are cheap clones sharing one
/// unbounded queue; the registry stores one clone and snapshots hand out
/// more, so broadcast never delivers while holding a registry lock.
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    workspace_id: WorkspaceId,
    principal_id: UserId,
    tx: mpsc::UnboundedSender<String>,
}

impl SubscriberHandle {
    /// Create a handle and its receiving end. The receiver is pumped by the
    /// connection's own task; the handle goes into the registry.
    pub fn channel(
        workspace_id: WorkspaceId,
        principal_id: UserId,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: Uuid::new_v4(),
            workspace_id,
            principal_id,
            tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    pub fn principal_id(&self) -> UserId {
        self.principal_id
    }

    /// Enqueue a payload for this subscriber. Never blocks; fails only once
    /// the receiving side has gone away.
    pub fn deliver(&self, payload: String) -> Result<(), SubscriberGone> {
        self.tx.send(payload).map_err(|_| SubscriberGone)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
