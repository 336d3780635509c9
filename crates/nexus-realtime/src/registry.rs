//! ConnectionRegistry — the authoritative table of live subscriptions.

use std::collections::HashMap;

use dashmap::DashMap;
use nexus_protocol::WorkspaceId;
use tracing::debug;

use crate::subscriber::{SubscriberHandle, SubscriberId};

/// Concurrency-safe map from workspace id to its set of live subscriber
/// handles.
///
/// Exactly one registry exists per process, shared between the admission
/// path and every mutation path. Entries are created lazily on first
/// registration and removed once their set empties, so an idle workspace
/// costs nothing. DashMap's per-shard locking keeps registration and
/// broadcast for one workspace mutually exclusive without serializing
/// unrelated workspaces behind a global lock.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: DashMap<WorkspaceId, HashMap<SubscriberId, SubscriberHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Add a handle under its workspace entry.
    pub fn register(&self, handle: SubscriberHandle) {
        let workspace_id = handle.workspace_id();
        let subscriber_id = handle.id();
        self.connections
            .entry(workspace_id)
            .or_default()
            .insert(subscriber_id, handle);
        debug!("subscriber {subscriber_id} registered for workspace {workspace_id}");
    }

    /// Remove a handle. A no-op when the handle is already gone — explicit
    /// disconnect cleanup races with delivery-failure pruning, and both may
    /// fire for the same handle.
    pub fn unregister(&self, workspace_id: WorkspaceId, subscriber_id: SubscriberId) {
        let removed = match self.connections.get_mut(&workspace_id) {
            Some(mut subscribers) => subscribers.remove(&subscriber_id).is_some(),
            None => false,
        };
        // Drop empty entries; re-checked under the entry lock since a
        // concurrent register may have slipped in.
        self.connections
            .remove_if(&workspace_id, |_, subscribers| subscribers.is_empty());
        if removed {
            debug!("subscriber {subscriber_id} unregistered from workspace {workspace_id}");
        }
    }

    /// An immutable copy of the workspace's current handle set. Broadcast
    /// iterates this stable snapshot, so a handle removed mid-broadcast is
    /// neither double-notified nor able to fail the remaining deliveries.
    pub fn snapshot(&self, workspace_id: WorkspaceId) -> Vec<SubscriberHandle> {
        self.connections
            .get(&workspace_id)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, workspace_id: WorkspaceId) -> usize {
        self.connections
            .get(&workspace_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// Live subscriptions across all workspaces (health endpoint).
    pub fn total_subscribers(&self) -> usize {
        self.connections.iter().map(|entry| entry.len()).sum()
    }

    /// Workspaces that currently have at least one subscriber.
    pub fn tracked_workspaces(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
