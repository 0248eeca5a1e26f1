//! Notification records, dispatching, and triggering.
//!
//! - `types`: records, recipients, and delivery outcomes
//! - `ChannelDispatcher`: delivers one record across every applicable channel
//! - `NotificationTrigger`: persist, resolve, dispatch; single and broadcast

mod dispatcher;
mod trigger;
mod types;

pub use dispatcher::{ChannelDispatcher, DispatcherStats, DispatcherStatsSnapshot};
pub use trigger::{NotificationTrigger, TriggerError, TriggeredNotification};
pub use types::{
    ChannelResult, DeliveryOutcome, NewNotification, NotificationContent, NotificationRecord,
    Recipient,
};
