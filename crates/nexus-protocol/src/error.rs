//! Access-control error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::WorkspaceRole;

/// WebSocket close code sent when admission rejects a subscription
/// (RFC 6455 policy violation). Rejected subscribers get this close frame
/// and nothing else — no events, no application error body.
pub const POLICY_VIOLATION: u16 = 1008;

/// Why a principal was denied. `Unauthenticated` and `NotAMember` are fatal
/// to a subscription attempt; `InsufficientRole` only applies to role-gated
/// REST operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AccessError {
    #[error("could not validate credentials")]
    Unauthenticated,
    #[error("not a member of this workspace")]
    NotAMember,
    #[error("requires the {required} role")]
    InsufficientRole { required: WorkspaceRole },
}

/// A TEXT column held a string no enum variant matches.
#[derive(Debug, Clone, Error)]
#[error("unknown {field} value: {value}")]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}
