//! Service assembly: wires configuration into the running components.

mod state;

pub use state::AppState;
