//! Prometheus metrics for the notification service.
//!
//! - Push delivery metrics (batches, per-token outcomes, pruned registrations)
//! - Recipient resolution metrics (scope sizes, excluded elevated identities)
//! - Trigger metrics (invocations by trigger and outcome, queued mails)
//! - Ingress metrics (document events received over Redis)

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, IngressMetrics, ResolutionMetrics, TriggerMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "unigo";

lazy_static! {
    // ============================================================================
    // Push Delivery Metrics
    // ============================================================================

    /// Provider calls issued, one per batch
    pub static ref PUSH_BATCHES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_batches_total", METRIC_PREFIX),
        "Total multicast calls issued to the push provider"
    ).unwrap();

    /// Provider calls that failed outright
    pub static ref PUSH_BATCH_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_batch_failures_total", METRIC_PREFIX),
        "Total multicast calls that failed as a whole"
    ).unwrap();

    /// Per-token outcomes reported by the provider
    pub static ref PUSH_TOKENS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_push_tokens_total", METRIC_PREFIX),
        "Per-token delivery outcomes",
        &["outcome"]
    ).unwrap();

    /// Per-token failures by provider classification
    pub static ref PUSH_FAILURE_CLASSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_push_failure_classes_total", METRIC_PREFIX),
        "Per-token delivery failures by provider error classification",
        &["code"]
    ).unwrap();

    /// Registrations removed after provider-confirmed invalidation
    pub static ref PUSH_TOKENS_PRUNED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_tokens_pruned_total", METRIC_PREFIX),
        "Total stale registrations removed"
    ).unwrap();

    /// Registration removals that failed (swallowed)
    pub static ref PUSH_PRUNE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_push_prune_failures_total", METRIC_PREFIX),
        "Total stale registration removals that failed"
    ).unwrap();

    // ============================================================================
    // Resolution Metrics
    // ============================================================================

    /// Resolved recipient set size by scope kind
    pub static ref RECIPIENTS_RESOLVED: HistogramVec = register_histogram_vec!(
        format!("{}_recipients_resolved", METRIC_PREFIX),
        "Number of identities resolved per notification",
        &["scope"],
        vec![0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]
    ).unwrap();

    /// Identities dropped from broad scopes because they are elevated
    pub static ref ELEVATED_EXCLUDED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_elevated_excluded_total", METRIC_PREFIX),
        "Total elevated identities excluded from broad fan-out"
    ).unwrap();

    // ============================================================================
    // Trigger Metrics
    // ============================================================================

    /// Trigger invocations by trigger name and outcome
    pub static ref TRIGGER_INVOCATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_trigger_invocations_total", METRIC_PREFIX),
        "Total trigger invocations",
        &["trigger", "outcome"]
    ).unwrap();

    /// Mails queued to the outbox by kind
    pub static ref MAILS_QUEUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_mails_queued_total", METRIC_PREFIX),
        "Total mails queued to the outbox",
        &["kind"]
    ).unwrap();

    // ============================================================================
    // Ingress Metrics
    // ============================================================================

    /// Document events received over Redis pub/sub
    pub static ref DOCUMENT_EVENTS_RECEIVED: IntCounter = register_int_counter!(
        format!("{}_document_events_received_total", METRIC_PREFIX),
        "Total document events received from Redis pub/sub"
    ).unwrap();

    /// Document events that could not be parsed
    pub static ref DOCUMENT_EVENTS_REJECTED: IntCounter = register_int_counter!(
        format!("{}_document_events_rejected_total", METRIC_PREFIX),
        "Total document events rejected as malformed"
    ).unwrap();

    /// Subscriber reconnection attempts
    pub static ref REDIS_RECONNECTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_redis_reconnections_total", METRIC_PREFIX),
        "Total Redis subscriber reconnection attempts"
    ).unwrap();

    /// Document store Redis connection status (1 = connected)
    pub static ref REDIS_CONNECTION_STATUS: IntGauge = register_int_gauge!(
        format!("{}_redis_connection_status", METRIC_PREFIX),
        "Document store Redis connection status (1 = connected, 0 = disconnected)"
    ).unwrap();
}
