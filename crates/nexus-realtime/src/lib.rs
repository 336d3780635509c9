//! Nexus real-time core.
//!
//! The in-process publish/subscribe path that turns a committed task
//! mutation into live updates for every connected client watching that
//! workspace:
//! - [`ConnectionRegistry`] — the authoritative table of live subscriptions
//! - [`EventBroadcaster`] — workspace-scoped fan-out with self-healing
//!   pruning of dead handles
//! - [`Admission`] — the authenticate → authorize → register gate every
//!   subscription passes before it can receive anything
//!
//! The admission gate is decoupled from credential and membership storage
//! via the [`IdentityResolver`] and [`AccessGate`] traits, implemented by
//! the server layer.

pub mod admission;
pub mod broadcast;
pub mod registry;
pub mod subscriber;

pub use admission::{AccessGate, Admission, AdmissionState, IdentityResolver, Subscription};
pub use broadcast::EventBroadcaster;
pub use registry::ConnectionRegistry;
pub use subscriber::{SubscriberGone, SubscriberHandle, SubscriberId};
