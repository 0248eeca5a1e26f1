// Infrastructure layer (shared components)
pub mod infrastructure;

pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::postgres;
pub use infrastructure::redis;

// Domain layer
pub mod channel;
pub mod connection_manager;
pub mod directory;
pub mod notification;
pub mod store;

// Application layer
pub mod service;
pub mod triggers;

// Supporting modules
pub mod telemetry;
