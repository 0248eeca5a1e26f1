//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BROADCAST_BATCHES_TOTAL, BROADCAST_RECIPIENTS, CHANNEL_ATTEMPTS_TOTAL, CHANNEL_LATENCY,
    DISPATCHES_TOTAL, RECIPIENTS_NOT_FOUND_TOTAL, RECORDS_CREATED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording record metrics
pub struct RecordMetrics;

impl RecordMetrics {
    pub fn record_created() {
        RECORDS_CREATED_TOTAL.with_label_values(&["single"]).inc();
    }

    pub fn record_broadcast_created(count: usize) {
        RECORDS_CREATED_TOTAL
            .with_label_values(&["broadcast"])
            .inc_by(count as u64);
    }

    pub fn record_recipient_not_found() {
        RECIPIENTS_NOT_FOUND_TOTAL.inc();
    }
}

/// Helper struct for recording channel attempt metrics
pub struct ChannelMetrics;

impl ChannelMetrics {
    /// Record one settled attempt
    pub fn record_attempt(channel: &str, status: &str, latency_secs: f64) {
        CHANNEL_ATTEMPTS_TOTAL
            .with_label_values(&[channel, status])
            .inc();
        CHANNEL_LATENCY
            .with_label_values(&[channel])
            .observe(latency_secs);
    }
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    pub fn record_success() {
        DISPATCHES_TOTAL.with_label_values(&["success"]).inc();
    }

    pub fn record_failure() {
        DISPATCHES_TOTAL.with_label_values(&["failure"]).inc();
    }

    pub fn record_no_channel() {
        DISPATCHES_TOTAL.with_label_values(&["no_channel"]).inc();
    }
}

/// Helper struct for recording broadcast metrics
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    pub fn record_started(recipients: usize) {
        BROADCAST_RECIPIENTS.observe(recipients as f64);
    }

    pub fn record_batch() {
        BROADCAST_BATCHES_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_recorded_metrics() {
        ChannelMetrics::record_attempt("in-app", "delivered", 0.002);
        DispatchMetrics::record_success();
        BroadcastMetrics::record_batch();

        let text = encode_metrics().unwrap();
        assert!(text.contains("notification_channel_attempts_total"));
        assert!(text.contains("notification_dispatches_total"));
        assert!(text.contains("notification_broadcast_batches_total"));
    }
}
