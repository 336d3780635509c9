//! Real-time event wire format.
//!
//! Events are transient notifications of task mutations, delivered
//! best-effort to a workspace's subscribers and never stored. The `type`
//! strings and field names below are the compatibility surface clients
//! switch on.

use serde::{Deserialize, Serialize};

use crate::types::{Task, TaskId};

/// Tagged event payload. Created/updated carry the full task snapshot,
/// deletion carries the bare identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    #[serde(rename = "TASK_CREATED")]
    Created { task: Task },
    #[serde(rename = "TASK_UPDATED")]
    Updated { task: Task },
    #[serde(rename = "TASK_DELETED")]
    Deleted { task_id: TaskId },
}

impl TaskEvent {
    /// The wire `type` tag.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Created { .. } => "TASK_CREATED",
            Self::Updated { .. } => "TASK_UPDATED",
            Self::Deleted { .. } => "TASK_DELETED",
        }
    }
}
