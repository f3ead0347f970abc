//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    DOCUMENT_EVENTS_RECEIVED, DOCUMENT_EVENTS_REJECTED, ELEVATED_EXCLUDED_TOTAL,
    MAILS_QUEUED_TOTAL, PUSH_BATCHES_TOTAL, PUSH_BATCH_FAILURES_TOTAL, PUSH_FAILURE_CLASSES_TOTAL,
    PUSH_PRUNE_FAILURES_TOTAL, PUSH_TOKENS_PRUNED_TOTAL, PUSH_TOKENS_TOTAL, RECIPIENTS_RESOLVED,
    REDIS_RECONNECTIONS_TOTAL, TRIGGER_INVOCATIONS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording push delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record one provider call
    pub fn record_batch_sent() {
        PUSH_BATCHES_TOTAL.inc();
    }

    /// Record a provider call that failed as a whole
    pub fn record_batch_failed() {
        PUSH_BATCH_FAILURES_TOTAL.inc();
    }

    /// Record per-token successes and failures of one batch
    pub fn record_outcomes(delivered: u64, failed: u64) {
        PUSH_TOKENS_TOTAL.with_label_values(&["delivered"]).inc_by(delivered);
        PUSH_TOKENS_TOTAL.with_label_values(&["failed"]).inc_by(failed);
    }

    /// Record one per-token failure classification
    pub fn record_failure_class(code: &str) {
        PUSH_FAILURE_CLASSES_TOTAL.with_label_values(&[code]).inc();
    }

    /// Record the results of a pruning round
    pub fn record_pruned(removed: u64, failed: u64) {
        PUSH_TOKENS_PRUNED_TOTAL.inc_by(removed);
        PUSH_PRUNE_FAILURES_TOTAL.inc_by(failed);
    }
}

/// Helper struct for recording recipient resolution metrics
pub struct ResolutionMetrics;

impl ResolutionMetrics {
    pub fn record_resolved(scope: &str, count: usize) {
        RECIPIENTS_RESOLVED
            .with_label_values(&[scope])
            .observe(count as f64);
    }

    pub fn record_elevated_excluded(count: u64) {
        ELEVATED_EXCLUDED_TOTAL.inc_by(count);
    }
}

/// Helper struct for recording trigger metrics
pub struct TriggerMetrics;

impl TriggerMetrics {
    pub fn record_invocation(trigger: &str, outcome: &str) {
        TRIGGER_INVOCATIONS_TOTAL
            .with_label_values(&[trigger, outcome])
            .inc();
    }

    pub fn record_mail_queued(kind: &str) {
        MAILS_QUEUED_TOTAL.with_label_values(&[kind]).inc();
    }
}

/// Helper struct for recording ingress metrics
pub struct IngressMetrics;

impl IngressMetrics {
    pub fn record_event_received() {
        DOCUMENT_EVENTS_RECEIVED.inc();
    }

    pub fn record_event_rejected() {
        DOCUMENT_EVENTS_REJECTED.inc();
    }

    pub fn record_reconnection() {
        REDIS_RECONNECTIONS_TOTAL.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_metrics() {
        DeliveryMetrics::record_batch_sent();
        DeliveryMetrics::record_pruned(2, 1);
        TriggerMetrics::record_invocation("calendar_created", "notified");

        let output = encode_metrics().unwrap();
        assert!(output.contains("unigo_push_batches_total"));
        assert!(output.contains("unigo_push_tokens_pruned_total"));
        assert!(output.contains("unigo_trigger_invocations_total"));
    }
}
