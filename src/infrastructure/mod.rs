//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `config`: Application configuration and settings
//! - `error`: Top-level error types
//! - `metrics`: Prometheus metrics helpers
//! - `postgres`: PostgreSQL connection pool
//! - `redis`: Reconnection backoff for the Redis subscriber

pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod redis;
