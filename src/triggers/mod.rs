//! Inbound trigger sources.
//!
//! Other services request notifications by publishing JSON messages on
//! Redis pub/sub; `RedisTriggerSubscriber` turns them into trigger calls.

mod redis;

pub use redis::{RedisTriggerSubscriber, TriggerMessage, DEFAULT_TRIGGER_CHANNEL};
