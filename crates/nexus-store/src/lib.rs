//! Nexus persistence — PostgreSQL schema and keyed queries.
//!
//! Everything here is single-record CRUD against a relational store: users,
//! workspaces, memberships, tasks. The one concurrency rule is that the
//! client sits behind an async mutex so multi-statement transactions
//! serialize on the single connection.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

mod tasks;
mod users;
mod workspaces;

pub use users::Credentials;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            BIGSERIAL PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_active     BOOLEAN NOT NULL DEFAULT TRUE,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS workspaces (
    id         BIGSERIAL PRIMARY KEY,
    name       TEXT NOT NULL,
    kind       TEXT NOT NULL,
    owner_id   BIGINT NOT NULL REFERENCES users(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS workspace_members (
    workspace_id BIGINT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
    user_id      BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role         TEXT NOT NULL,
    PRIMARY KEY (workspace_id, user_id)
);

CREATE TABLE IF NOT EXISTS tasks (
    id           BIGSERIAL PRIMARY KEY,
    title        TEXT NOT NULL,
    description  TEXT,
    status       TEXT NOT NULL DEFAULT 'TODO',
    priority     TEXT NOT NULL DEFAULT 'P2',
    workspace_id BIGINT NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
    assignee_id  BIGINT REFERENCES users(id) ON DELETE SET NULL,
    due_date     TIMESTAMPTZ,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_tasks_workspace ON tasks(workspace_id);
CREATE INDEX IF NOT EXISTS idx_tasks_assignee  ON tasks(assignee_id);
";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("user is already a member of this workspace")]
    AlreadyMember,
    #[error("cannot remove the last admin of a workspace")]
    LastAdmin,
    #[error("memberships of a personal workspace cannot be removed")]
    PersonalWorkspace,
    #[error("corrupt row: {0}")]
    Corrupt(#[from] nexus_protocol::UnknownVariant),
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
}

/// Handle to the relational store. Cheap to clone; all clones share one
/// connection.
#[derive(Clone)]
pub struct Store {
    client: Arc<Mutex<Client>>,
}

impl Store {
    /// Connect and spawn the connection driver task.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!("postgres connection error: {err}");
            }
        });
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
        })
    }

    /// Create any missing tables. Idempotent.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        self.client.lock().await.batch_execute(SCHEMA).await?;
        info!("database schema ready");
        Ok(())
    }

    pub(crate) fn client(&self) -> &Arc<Mutex<Client>> {
        &self.client
    }
}

pub(crate) fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}
