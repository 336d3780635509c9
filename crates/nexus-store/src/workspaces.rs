//! Workspaces and memberships.

use nexus_protocol::{
    Membership, UserId, Workspace, WorkspaceId, WorkspaceKind, WorkspaceRole,
};
use tokio_postgres::Row;
use tracing::info;

use crate::{is_unique_violation, Store, StoreError};

fn workspace_from_row(row: &Row) -> Result<Workspace, StoreError> {
    Ok(Workspace {
        id: row.get("id"),
        name: row.get("name"),
        kind: row.get::<_, &str>("kind").parse()?,
        owner_id: row.get("owner_id"),
    })
}

fn membership_from_row(row: &Row) -> Result<Membership, StoreError> {
    Ok(Membership {
        workspace_id: row.get("workspace_id"),
        user_id: row.get("user_id"),
        role: row.get::<_, &str>("role").parse()?,
    })
}

impl Store {
    /// Create a TEAM workspace with the creator as its ADMIN, atomically.
    pub async fn create_team_workspace(
        &self,
        name: &str,
        owner_id: UserId,
    ) -> Result<Workspace, StoreError> {
        let mut client = self.client().lock().await;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                "INSERT INTO workspaces (name, kind, owner_id)
                 VALUES ($1, 'TEAM', $2)
                 RETURNING id, name, kind, owner_id",
                &[&name, &owner_id],
            )
            .await?;
        let workspace = workspace_from_row(&row)?;

        tx.execute(
            "INSERT INTO workspace_members (workspace_id, user_id, role)
             VALUES ($1, $2, 'ADMIN')",
            &[&workspace.id, &owner_id],
        )
        .await?;

        tx.commit().await?;
        info!("workspace {} created by user {owner_id}", workspace.id);
        Ok(workspace)
    }

    /// All workspaces the user is a member of.
    pub async fn workspaces_for_user(&self, user_id: UserId) -> Result<Vec<Workspace>, StoreError> {
        let client = self.client().lock().await;
        let rows = client
            .query(
                "SELECT w.id, w.name, w.kind, w.owner_id
                 FROM workspaces w
                 JOIN workspace_members m ON m.workspace_id = w.id
                 WHERE m.user_id = $1
                 ORDER BY w.id",
                &[&user_id],
            )
            .await?;
        rows.iter().map(workspace_from_row).collect()
    }

    /// The membership row for one (workspace, principal) pair — the keyed
    /// lookup behind every authorization decision.
    pub async fn membership(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
    ) -> Result<Option<Membership>, StoreError> {
        let client = self.client().lock().await;
        let row = client
            .query_opt(
                "SELECT workspace_id, user_id, role FROM workspace_members
                 WHERE workspace_id = $1 AND user_id = $2",
                &[&workspace_id, &user_id],
            )
            .await?;
        row.map(|row| membership_from_row(&row)).transpose()
    }

    pub async fn members(&self, workspace_id: WorkspaceId) -> Result<Vec<Membership>, StoreError> {
        let client = self.client().lock().await;
        let rows = client
            .query(
                "SELECT workspace_id, user_id, role FROM workspace_members
                 WHERE workspace_id = $1 ORDER BY user_id",
                &[&workspace_id],
            )
            .await?;
        rows.iter().map(membership_from_row).collect()
    }

    pub async fn add_member(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
        role: WorkspaceRole,
    ) -> Result<Membership, StoreError> {
        let client = self.client().lock().await;
        let role_str = role.as_str();
        let row = client
            .query_one(
                "INSERT INTO workspace_members (workspace_id, user_id, role)
                 VALUES ($1, $2, $3)
                 RETURNING workspace_id, user_id, role",
                &[&workspace_id, &user_id, &role_str],
            )
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::AlreadyMember
                } else {
                    StoreError::from(err)
                }
            })?;
        membership_from_row(&row)
    }

    /// Remove a membership. Refuses to touch PERSONAL workspaces and
    /// refuses to remove a workspace's last remaining ADMIN, so a
    /// workspace can never be left unmanageable. Returns false when the
    /// membership did not exist.
    pub async fn remove_member(
        &self,
        workspace_id: WorkspaceId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let mut client = self.client().lock().await;
        let tx = client.transaction().await?;

        let Some(workspace) = tx
            .query_opt("SELECT kind FROM workspaces WHERE id = $1", &[&workspace_id])
            .await?
        else {
            return Ok(false);
        };
        let kind: WorkspaceKind = workspace.get::<_, &str>("kind").parse()?;
        if kind == WorkspaceKind::Personal {
            return Err(StoreError::PersonalWorkspace);
        }

        let Some(member) = tx
            .query_opt(
                "SELECT role FROM workspace_members
                 WHERE workspace_id = $1 AND user_id = $2 FOR UPDATE",
                &[&workspace_id, &user_id],
            )
            .await?
        else {
            return Ok(false);
        };
        let role: WorkspaceRole = member.get::<_, &str>("role").parse()?;

        if role == WorkspaceRole::Admin {
            let admins = tx
                .query_one(
                    "SELECT COUNT(*) FROM workspace_members
                     WHERE workspace_id = $1 AND role = 'ADMIN'",
                    &[&workspace_id],
                )
                .await?;
            let admin_count: i64 = admins.get(0);
            if admin_count <= 1 {
                return Err(StoreError::LastAdmin);
            }
        }

        tx.execute(
            "DELETE FROM workspace_members WHERE workspace_id = $1 AND user_id = $2",
            &[&workspace_id, &user_id],
        )
        .await?;
        tx.commit().await?;
        info!("user {user_id} removed from workspace {workspace_id}");
        Ok(true)
    }
}
