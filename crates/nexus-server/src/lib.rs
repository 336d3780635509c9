//! Nexus HTTP layer.
//!
//! REST routers for auth, workspaces, members, and tasks, plus the
//! WebSocket subscription endpoint. Every workspace-scoped handler and
//! every subscription admission authorizes through the same
//! [`access::WorkspaceAccess`] component; task mutation handlers publish
//! exactly one event after a successful commit and never on failure.

pub mod access;
pub mod app;
pub mod auth;
pub mod error;
pub mod tasks;
pub mod workspaces;
pub mod ws;

pub use access::WorkspaceAccess;
pub use app::{app, AppState};
pub use auth::Authenticator;
pub use error::ApiError;
pub use ws::RealtimeState;
