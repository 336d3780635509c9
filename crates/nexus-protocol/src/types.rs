//! Domain snapshots and request bodies.
//!
//! Field names and enum strings are the wire compatibility surface; clients
//! match on them verbatim. Enums also carry `as_str`/`FromStr` for the TEXT
//! columns the store keeps them in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::UnknownVariant;

pub type UserId = i64;
pub type WorkspaceId = i64;
pub type TaskId = i64;

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Backlog,
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BACKLOG" => Ok(Self::Backlog),
            "TODO" => Ok(Self::Todo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "DONE" => Ok(Self::Done),
            other => Err(UnknownVariant::new("status", other)),
        }
    }
}

/// Task priority, ordered most urgent first: P0 < P1 < P2 < P3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum TaskPriority {
    P0,
    P1,
    #[default]
    P2,
    P3,
}

impl TaskPriority {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::P0 => "P0",
            Self::P1 => "P1",
            Self::P2 => "P2",
            Self::P3 => "P3",
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P0" => Ok(Self::P0),
            "P1" => Ok(Self::P1),
            "P2" => Ok(Self::P2),
            "P3" => Ok(Self::P3),
            other => Err(UnknownVariant::new("priority", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceKind {
    Personal,
    Team,
}

impl WorkspaceKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "PERSONAL",
            Self::Team => "TEAM",
        }
    }
}

impl std::str::FromStr for WorkspaceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PERSONAL" => Ok(Self::Personal),
            "TEAM" => Ok(Self::Team),
            other => Err(UnknownVariant::new("workspace type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkspaceRole {
    Admin,
    #[default]
    Member,
    Viewer,
}

impl WorkspaceRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Member => "MEMBER",
            Self::Viewer => "VIEWER",
        }
    }

    /// Rank for role gating: VIEWER < MEMBER < ADMIN.
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Viewer => 0,
            Self::Member => 1,
            Self::Admin => 2,
        }
    }
}

impl std::str::FromStr for WorkspaceRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Self::Admin),
            "MEMBER" => Ok(Self::Member),
            "VIEWER" => Ok(Self::Viewer),
            other => Err(UnknownVariant::new("role", other)),
        }
    }
}

impl std::fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshots
// ─────────────────────────────────────────────────────────────────────────────

/// Authenticated principal, as exposed over the wire. The password hash
/// never leaves the store layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: WorkspaceKind,
    pub owner_id: UserId,
}

/// The (workspace, principal) → role relation. Unique per pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: WorkspaceRole,
}

impl Membership {
    /// Role gate for ADMIN-only operations. Membership itself was already
    /// established by `authorize`; this only checks rank.
    pub fn require_role(&self, required: WorkspaceRole) -> Result<(), crate::AccessError> {
        if self.role.rank() >= required.rank() {
            Ok(())
        } else {
            Err(crate::AccessError::InsufficientRole { required })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub workspace_id: WorkspaceId,
    pub assignee_id: Option<UserId>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task joined with its workspace name, for the cross-workspace inbox view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskWithWorkspace {
    #[serde(flatten)]
    pub task: Task,
    pub workspace_name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Request bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterParams {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginParams {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceCreate {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberInvite {
    pub email: String,
    #[serde(default)]
    pub role: WorkspaceRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskCreate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee_id: Option<UserId>,
}

/// Partial task update. Nullable columns distinguish "leave unchanged"
/// (field absent → outer `None`) from "clear" (explicit JSON null →
/// `Some(None)`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "patch_field")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "patch_field")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "patch_field")]
    pub assignee_id: Option<Option<UserId>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due_date.is_none()
            && self.assignee_id.is_none()
    }

    /// Fold the patch into an existing snapshot. `updated_at` is the
    /// store's responsibility.
    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(assignee_id) = self.assignee_id {
            task.assignee_id = assignee_id;
        }
    }
}

/// Present-but-possibly-null deserializer: maps an explicit JSON null to
/// `Some(None)` while `#[serde(default)]` keeps an absent field at `None`.
fn patch_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
