//! Subscription admission — the authenticate → authorize → register gate.
//!
//! Every subscription runs the same sequence before it can receive
//! anything: resolve the bearer credential to a principal, confirm that
//! principal's membership in the requested workspace, and only then enter
//! the connection registry. Any failure closes the attempt before
//! registration, so a rejected subscriber never appears in a snapshot and
//! never sees workspace data.

use std::future::Future;
use std::sync::Arc;

use nexus_protocol::{AccessError, Membership, UserId, WorkspaceId};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::registry::ConnectionRegistry;
use crate::subscriber::SubscriberHandle;

/// Verifies a bearer credential and returns the authenticated principal.
/// Implemented by the server layer (token verification + user lookup).
pub trait IdentityResolver: Send + Sync {
    fn resolve(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<UserId, AccessError>> + Send;
}

/// Membership check for one (principal, workspace) pair: a direct keyed
/// lookup, no inheritance, no implicit admin bypass. Shared by REST
/// mutation handlers and subscription admission — nothing touches
/// workspace-scoped data without passing through here first.
pub trait AccessGate: Send + Sync {
    fn authorize(
        &self,
        principal_id: UserId,
        workspace_id: WorkspaceId,
    ) -> impl Future<Output = Result<Membership, AccessError>> + Send;
}

/// Lifecycle of one subscription attempt. `Closed` is terminal and
/// reachable from every prior state; there is no re-entry — reconnection
/// means a fresh [`Admission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    Pending,
    Authenticating,
    Authorized,
    Registered,
    Closed,
}

/// Drives one subscription attempt through the admission sequence.
pub struct Admission {
    registry: Arc<ConnectionRegistry>,
    workspace_id: WorkspaceId,
    state: AdmissionState,
}

impl Admission {
    pub fn new(registry: Arc<ConnectionRegistry>, workspace_id: WorkspaceId) -> Self {
        Self {
            registry,
            workspace_id,
            state: AdmissionState::Pending,
        }
    }

    pub fn state(&self) -> AdmissionState {
        self.state
    }

    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }

    /// Run the gate: authenticate, authorize, register. On success the
    /// subscription is live and will receive every event published to the
    /// workspace from this point on. On failure the machine lands in
    /// `Closed` without ever registering, and the caller must terminate
    /// the transport with a policy-violation signal.
    pub async fn admit<I, A>(
        &mut self,
        credential: &str,
        identity: &I,
        access: &A,
    ) -> Result<Subscription, AccessError>
    where
        I: IdentityResolver,
        A: AccessGate,
    {
        if self.state != AdmissionState::Pending {
            self.state = AdmissionState::Closed;
            return Err(AccessError::Unauthenticated);
        }

        self.state = AdmissionState::Authenticating;
        let principal_id = match identity.resolve(credential).await {
            Ok(principal_id) => principal_id,
            Err(err) => {
                self.state = AdmissionState::Closed;
                debug!("subscription to workspace {} rejected: {err}", self.workspace_id);
                return Err(err);
            }
        };

        let membership = match access.authorize(principal_id, self.workspace_id).await {
            Ok(membership) => membership,
            Err(err) => {
                self.state = AdmissionState::Closed;
                debug!(
                    "subscription to workspace {} rejected for principal {principal_id}: {err}",
                    self.workspace_id
                );
                return Err(err);
            }
        };
        self.state = AdmissionState::Authorized;

        let (handle, events) = SubscriberHandle::channel(self.workspace_id, principal_id);
        self.registry.register(handle.clone());
        self.state = AdmissionState::Registered;
        info!(
            "subscriber {} admitted to workspace {} (principal {principal_id}, role {})",
            handle.id(),
            self.workspace_id,
            membership.role
        );

        Ok(Subscription {
            handle,
            events,
            membership,
            registry: Arc::clone(&self.registry),
        })
    }
}

/// A live, registered subscription: the receiving end of the subscriber's
/// event queue plus the membership that admitted it.
#[derive(Debug)]
pub struct Subscription {
    handle: SubscriberHandle,
    events: mpsc::UnboundedReceiver<String>,
    membership: Membership,
    registry: Arc<ConnectionRegistry>,
}

impl Subscription {
    pub fn handle(&self) -> &SubscriberHandle {
        &self.handle
    }

    pub fn membership(&self) -> Membership {
        self.membership
    }

    /// Next serialized event payload, suspending until one arrives. `None`
    /// once the handle has been pruned and the queue drained.
    pub async fn next_event(&mut self) -> Option<String> {
        self.events.recv().await
    }

    /// Registered → Closed: drop this subscription from the registry.
    /// Idempotent, and safe to race with delivery-failure pruning or an
    /// in-flight broadcast.
    pub fn close(&self) {
        self.registry
            .unregister(self.handle.workspace_id(), self.handle.id());
    }
}
