//! User accounts.

use nexus_protocol::{User, UserId};
use tokio_postgres::Row;
use tracing::info;

use crate::{is_unique_violation, Store, StoreError};

/// A user row including its password hash. Stays inside the server; the
/// hash is never serialized.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    pub password_hash: String,
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        is_active: row.get("is_active"),
    }
}

impl Store {
    /// Create a user together with their personal workspace and its ADMIN
    /// membership, atomically. Every principal has exactly one personal
    /// workspace, born in this transaction.
    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut client = self.client().lock().await;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                "INSERT INTO users (email, password_hash) VALUES ($1, $2)
                 RETURNING id, email, is_active",
                &[&email, &password_hash],
            )
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::DuplicateEmail
                } else {
                    StoreError::from(err)
                }
            })?;
        let user = user_from_row(&row);

        let workspace = tx
            .query_one(
                "INSERT INTO workspaces (name, kind, owner_id)
                 VALUES ('Personal', 'PERSONAL', $1) RETURNING id",
                &[&user.id],
            )
            .await?;
        let workspace_id: i64 = workspace.get("id");

        tx.execute(
            "INSERT INTO workspace_members (workspace_id, user_id, role)
             VALUES ($1, $2, 'ADMIN')",
            &[&workspace_id, &user.id],
        )
        .await?;

        tx.commit().await?;
        info!("registered user {} (id {})", user.email, user.id);
        Ok(user)
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<Credentials>, StoreError> {
        let client = self.client().lock().await;
        let row = client
            .query_opt(
                "SELECT id, email, is_active, password_hash FROM users WHERE email = $1",
                &[&email],
            )
            .await?;
        Ok(row.map(|row| Credentials {
            user: user_from_row(&row),
            password_hash: row.get("password_hash"),
        }))
    }

    pub async fn user_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        let client = self.client().lock().await;
        let row = client
            .query_opt(
                "SELECT id, email, is_active FROM users WHERE id = $1",
                &[&user_id],
            )
            .await?;
        Ok(row.map(|row| user_from_row(&row)))
    }
}
