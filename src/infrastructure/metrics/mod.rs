//! Prometheus metrics for the delivery core.
//!
//! - Record metrics (created by path, recipients not found)
//! - Channel metrics (attempts by channel and status, delivery latency)
//! - Dispatch and broadcast metrics

mod helpers;

pub use helpers::{encode_metrics, BroadcastMetrics, ChannelMetrics, DispatchMetrics, RecordMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    Histogram, HistogramVec, IntCounter, IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "notification";

lazy_static! {
    // ============================================================================
    // Record Metrics
    // ============================================================================

    /// Records persisted, by trigger path ("single" or "broadcast")
    pub static ref RECORDS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_records_created_total", METRIC_PREFIX),
        "Total notification records persisted",
        &["path"]
    ).unwrap();

    /// Triggers whose recipient could not be resolved
    pub static ref RECIPIENTS_NOT_FOUND_TOTAL: IntCounter = register_int_counter!(
        format!("{}_recipients_not_found_total", METRIC_PREFIX),
        "Total triggers skipped because the recipient was not found"
    ).unwrap();

    // ============================================================================
    // Channel Metrics
    // ============================================================================

    /// Channel attempts by channel and status ("delivered", "failed", "timeout")
    pub static ref CHANNEL_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_channel_attempts_total", METRIC_PREFIX),
        "Total channel delivery attempts",
        &["channel", "status"]
    ).unwrap();

    /// Time until a channel attempt settled (or timed out)
    pub static ref CHANNEL_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_channel_latency_seconds", METRIC_PREFIX),
        "Channel delivery attempt latency in seconds",
        &["channel"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Dispatches by overall outcome ("success", "failure", "no_channel")
    pub static ref DISPATCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatches_total", METRIC_PREFIX),
        "Total dispatches by overall outcome",
        &["outcome"]
    ).unwrap();

    /// Broadcast batches executed
    pub static ref BROADCAST_BATCHES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_broadcast_batches_total", METRIC_PREFIX),
        "Total broadcast batches executed"
    ).unwrap();

    /// Broadcast size in recipients
    pub static ref BROADCAST_RECIPIENTS: Histogram = register_histogram!(
        format!("{}_broadcast_recipients", METRIC_PREFIX),
        "Recipients per broadcast",
        vec![1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
    ).unwrap();
}
