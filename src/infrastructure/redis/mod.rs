//! Redis connectivity helpers.
//!
//! - `ExponentialBackoff`: Provides backoff delays for reconnection attempts

mod backoff;

pub use backoff::{BackoffConfig, ExponentialBackoff};
