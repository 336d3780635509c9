//! Nexus protocol types.
//!
//! The single source of truth for domain snapshots, request bodies, the
//! real-time event wire format, and the access-control error taxonomy.
//! Everything serialized across the HTTP or WebSocket boundary lives here.

pub mod error;
pub mod events;
pub mod types;

pub use error::{AccessError, UnknownVariant, POLICY_VIOLATION};
pub use events::TaskEvent;
pub use types::{
    LoginParams, MemberInvite, Membership, RegisterParams, Task, TaskCreate, TaskId, TaskPatch,
    TaskPriority, TaskStatus, TaskWithWorkspace, TokenResponse, User, UserId, Workspace,
    WorkspaceCreate, WorkspaceId, WorkspaceKind, WorkspaceRole,
};
