//! Live socket connections, indexed by recipient.
//!
//! The socket surface itself (upgrade, auth, read loop) lives outside the
//! delivery core; it registers each accepted connection here and drains the
//! returned receiver. The socket channel pushes through this registry.

mod registry;
mod types;

pub use registry::{ConnectionManager, ConnectionStats, DEFAULT_BUFFER};
pub use types::{ConnectionHandle, ServerMessage};
