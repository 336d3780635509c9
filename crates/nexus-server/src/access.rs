//! Workspace access control — the membership guard shared by REST
//! handlers and subscription admission.

use nexus_protocol::{AccessError, Membership, UserId, WorkspaceId};
use nexus_realtime::AccessGate;
use nexus_store::Store;
use tracing::error;

use crate::error::ApiError;

/// Membership lookups against the store. Purely a guard — no side
/// effects, no role inheritance, no implicit admin bypass. One instance
/// serves both the REST mutation path and the admission machine, so a
/// principal that cannot mutate a workspace cannot subscribe to it either.
pub struct WorkspaceAccess {
    store: Store,
}

impl WorkspaceAccess {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// REST-side guard: membership or a typed rejection. Storage failures
    /// stay visible as 500s here, unlike the admission path.
    pub async fn require_membership(
        &self,
        principal_id: UserId,
        workspace_id: WorkspaceId,
    ) -> Result<Membership, ApiError> {
        match self.store.membership(workspace_id, principal_id).await? {
            Some(membership) => Ok(membership),
            None => Err(ApiError::Access(AccessError::NotAMember)),
        }
    }
}

impl AccessGate for WorkspaceAccess {
    async fn authorize(
        &self,
        principal_id: UserId,
        workspace_id: WorkspaceId,
    ) -> Result<Membership, AccessError> {
        let membership = self
            .store
            .membership(workspace_id, principal_id)
            .await
            .map_err(|err| {
                // Admission fails closed: a broken lookup rejects the
                // subscription rather than admitting blind.
                error!("membership lookup failed during admission: {err}");
                AccessError::NotAMember
            })?;
        membership.ok_or(AccessError::NotAMember)
    }
}
