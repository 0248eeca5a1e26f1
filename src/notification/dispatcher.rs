use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinError;

use crate::channel::{ChannelRegistry, DeliveryError, RegisteredChannel};
use crate::metrics::{ChannelMetrics, DispatchMetrics};

use super::{ChannelResult, DeliveryOutcome, NotificationRecord, Recipient};

/// Statistics for the channel dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Total dispatches
    pub total_dispatches: AtomicU64,
    /// Dispatches where no channel was applicable
    pub no_channel_dispatches: AtomicU64,
    /// Dispatches where at least one channel delivered
    pub successful_dispatches: AtomicU64,
    /// Dispatches where every attempted channel failed
    pub failed_dispatches: AtomicU64,
    /// Individual channel attempts
    pub channel_attempts: AtomicU64,
    /// Channel attempts that failed (timeouts included)
    pub channel_failures: AtomicU64,
    /// Channel attempts that timed out
    pub channel_timeouts: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_dispatches: self.total_dispatches.load(Ordering::Relaxed),
            no_channel_dispatches: self.no_channel_dispatches.load(Ordering::Relaxed),
            successful_dispatches: self.successful_dispatches.load(Ordering::Relaxed),
            failed_dispatches: self.failed_dispatches.load(Ordering::Relaxed),
            channel_attempts: self.channel_attempts.load(Ordering::Relaxed),
            channel_failures: self.channel_failures.load(Ordering::Relaxed),
            channel_timeouts: self.channel_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_dispatches: u64,
    pub no_channel_dispatches: u64,
    pub successful_dispatches: u64,
    pub failed_dispatches: u64,
    pub channel_attempts: u64,
    pub channel_failures: u64,
    pub channel_timeouts: u64,
}

/// Delivers one record to one recipient across every applicable channel.
///
/// Each channel attempt runs as its own task raced against the channel's
/// timeout. A task that loses the race is detached, not aborted: its
/// eventual result is dropped and it only holds its own clones of the
/// channel, recipient and record.
pub struct ChannelDispatcher {
    registry: Arc<ChannelRegistry>,
    stats: DispatcherStats,
}

impl ChannelDispatcher {
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self {
            registry,
            stats: DispatcherStats::default(),
        }
    }

    /// The registry this dispatcher reads from
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Dispatch `record` to `recipient` on every applicable channel
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, recipient, record),
        fields(
            notification_id = %record.id,
            recipient_id = %recipient.id,
            notification_type = %record.notification_type
        )
    )]
    pub async fn dispatch(&self, recipient: &Recipient, record: &NotificationRecord) -> DeliveryOutcome {
        self.stats.total_dispatches.fetch_add(1, Ordering::Relaxed);

        let applicable: Vec<RegisteredChannel> = self
            .registry
            .get_all()
            .into_iter()
            .filter(|entry| entry.channel.is_available_for(recipient, Some(record)))
            .collect();

        if applicable.is_empty() {
            self.stats.no_channel_dispatches.fetch_add(1, Ordering::Relaxed);
            DispatchMetrics::record_no_channel();
            tracing::debug!(
                notification_id = %record.id,
                recipient_id = %recipient.id,
                "No applicable channel for notification"
            );
            return DeliveryOutcome::nothing_applicable();
        }

        let attempts = applicable
            .into_iter()
            .map(|entry| attempt(entry, recipient.clone(), record.clone()));
        let channel_results = join_all(attempts).await;

        let outcome = DeliveryOutcome::from_results(channel_results);
        self.record_outcome(&outcome);

        tracing::info!(
            notification_id = %record.id,
            recipient_id = %recipient.id,
            success = outcome.success,
            delivered = outcome.delivered_count(),
            failed = outcome.failed_count(),
            "Dispatch complete"
        );

        outcome
    }

    fn record_outcome(&self, outcome: &DeliveryOutcome) {
        let attempts = outcome.channel_results.len() as u64;
        let failures = outcome.failed_count() as u64;
        let timeouts = outcome
            .channel_results
            .iter()
            .filter(|r| r.error.as_deref() == Some(TIMEOUT))
            .count() as u64;

        self.stats.channel_attempts.fetch_add(attempts, Ordering::Relaxed);
        self.stats.channel_failures.fetch_add(failures, Ordering::Relaxed);
        self.stats.channel_timeouts.fetch_add(timeouts, Ordering::Relaxed);

        if outcome.success {
            self.stats.successful_dispatches.fetch_add(1, Ordering::Relaxed);
            DispatchMetrics::record_success();
        } else {
            self.stats.failed_dispatches.fetch_add(1, Ordering::Relaxed);
            DispatchMetrics::record_failure();
        }
    }
}

const TIMEOUT: &str = "timeout";

/// Run one channel attempt: spawned `send()` versus the channel timeout
async fn attempt(
    entry: RegisteredChannel,
    recipient: Recipient,
    record: NotificationRecord,
) -> ChannelResult {
    let channel_id = entry.channel_id().to_string();
    let notification_id = record.id;
    let recipient_id = recipient.id.clone();
    let started = Instant::now();

    let channel = entry.channel;
    let send = tokio::spawn(async move { channel.send(&recipient, &record).await });

    // Dropping the JoinHandle on timeout detaches the send task
    let result = match tokio::time::timeout(entry.timeout, send).await {
        Ok(Ok(sent)) => sent,
        Ok(Err(join_error)) => Err(DeliveryError::Panicked(join_error_message(join_error))),
        Err(_) => Err(DeliveryError::Timeout),
    };

    let elapsed = started.elapsed();
    match result {
        Ok(()) => {
            ChannelMetrics::record_attempt(&channel_id, "delivered", elapsed.as_secs_f64());
            tracing::info!(
                notification_id = %notification_id,
                recipient_id = %recipient_id,
                channel_id = %channel_id,
                status = "delivered",
                elapsed_ms = elapsed.as_millis() as u64,
                "Channel attempt settled"
            );
            ChannelResult::delivered(channel_id)
        }
        Err(error) => {
            let status = if error == DeliveryError::Timeout { TIMEOUT } else { "failed" };
            ChannelMetrics::record_attempt(&channel_id, status, elapsed.as_secs_f64());
            tracing::warn!(
                notification_id = %notification_id,
                recipient_id = %recipient_id,
                channel_id = %channel_id,
                status = status,
                error = %error,
                elapsed_ms = elapsed.as_millis() as u64,
                "Channel attempt settled"
            );
            ChannelResult::failed(channel_id, error.to_string())
        }
    }
}

fn join_error_message(error: JoinError) -> String {
    if error.is_cancelled() {
        return "send task cancelled".to_string();
    }
    panic_message(error.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::DeliveryChannel;
    use crate::config::{ChannelConfig, ChannelsConfig};
    use crate::notification::NewNotification;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Fixed {
        id: &'static str,
        result: Result<(), DeliveryError>,
        available: bool,
    }

    #[async_trait]
    impl DeliveryChannel for Fixed {
        fn channel_id(&self) -> &str {
            self.id
        }

        async fn send(&self, _: &Recipient, _: &NotificationRecord) -> Result<(), DeliveryError> {
            self.result.clone()
        }

        fn is_available_for(&self, _: &Recipient, _: Option<&NotificationRecord>) -> bool {
            self.available
        }
    }

    fn dispatcher_with(channels: Vec<Fixed>) -> ChannelDispatcher {
        let registry = ChannelRegistry::new(Arc::new(ChannelsConfig {
            in_app: ChannelConfig::enabled(),
            ..ChannelsConfig::default()
        }));
        for channel in channels {
            registry.register(Arc::new(channel));
        }
        ChannelDispatcher::new(Arc::new(registry))
    }

    fn fixture() -> (Recipient, NotificationRecord) {
        (
            Recipient::new("u1", "Ada"),
            NotificationRecord::from_new(NewNotification::new("u1", "SYSTEM", "t", "m")),
        )
    }

    #[tokio::test]
    async fn test_unavailable_channels_are_skipped() {
        let dispatcher = dispatcher_with(vec![Fixed {
            id: "sms",
            result: Ok(()),
            available: false,
        }]);
        let (recipient, record) = fixture();

        let outcome = dispatcher.dispatch(&recipient, &record).await;
        assert_eq!(outcome, DeliveryOutcome::nothing_applicable());
        assert_eq!(dispatcher.stats().no_channel_dispatches, 1);
        assert_eq!(dispatcher.stats().channel_attempts, 0);
    }

    #[tokio::test]
    async fn test_results_follow_registry_order() {
        let dispatcher = dispatcher_with(vec![
            Fixed {
                id: "a",
                result: Err(DeliveryError::Transport("down".to_string())),
                available: true,
            },
            Fixed {
                id: "b",
                result: Ok(()),
                available: true,
            },
        ]);
        let (recipient, record) = fixture();

        let outcome = dispatcher.dispatch(&recipient, &record).await;
        let ids: Vec<_> = outcome
            .channel_results
            .iter()
            .map(|r| r.channel_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(outcome.success);
        assert_eq!(
            outcome.channel_results[0].error.as_deref(),
            Some("transport error: down")
        );

        let stats = dispatcher.stats();
        assert_eq!(stats.successful_dispatches, 1);
        assert_eq!(stats.channel_attempts, 2);
        assert_eq!(stats.channel_failures, 1);
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42_u8)), "unknown panic");
    }

    #[tokio::test]
    async fn test_slow_channel_times_out() {
        struct Slow;

        #[async_trait]
        impl DeliveryChannel for Slow {
            fn channel_id(&self) -> &str {
                "in-app"
            }

            async fn send(&self, _: &Recipient, _: &NotificationRecord) -> Result<(), DeliveryError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let registry = ChannelRegistry::new(Arc::new(ChannelsConfig {
            in_app: ChannelConfig {
                timeout_ms: 20,
                ..ChannelConfig::enabled()
            },
            ..ChannelsConfig::default()
        }));
        registry.register(Arc::new(Slow));
        let dispatcher = ChannelDispatcher::new(Arc::new(registry));
        let (recipient, record) = fixture();

        let outcome = dispatcher.dispatch(&recipient, &record).await;
        assert!(!outcome.success);
        assert_eq!(outcome.channel_results[0].error.as_deref(), Some("timeout"));
        assert_eq!(dispatcher.stats().channel_timeouts, 1);
    }
}
