use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

use crate::metrics::DeliveryMetrics;
use crate::push::{MulticastMessage, PushError, PushProvider, SendResponse, MAX_BATCH_SIZE};
use crate::store::TokenRepository;

use super::{DeletionHandle, NotificationPayload, PushRegistration};

/// What to do with the remaining batches after a provider call fails outright
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchErrorPolicy {
    /// Stop and propagate the error
    #[default]
    Abort,
    /// Log, keep sending, report failed batches in the result
    Continue,
}

impl FromStr for BatchErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(BatchErrorPolicy::Abort),
            "continue" => Ok(BatchErrorPolicy::Continue),
            other => Err(format!("unknown batch error policy: {}", other)),
        }
    }
}

impl fmt::Display for BatchErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchErrorPolicy::Abort => write!(f, "abort"),
            BatchErrorPolicy::Continue => write!(f, "continue"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Registrations per provider call, clamped to `1..=MAX_BATCH_SIZE`
    pub batch_size: usize,
    pub on_batch_error: BatchErrorPolicy,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            on_batch_error: BatchErrorPolicy::Abort,
        }
    }
}

impl DispatchConfig {
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_BATCH_SIZE)
    }
}

/// Summary of one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Provider calls that returned per-token results
    pub batches_sent: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Registrations deleted after a permanent token error
    pub pruned: usize,
    /// Deletions that failed and were ignored
    pub prune_failures: usize,
    /// Indices of batches whose provider call failed (continue policy only)
    pub failed_batches: Vec<usize>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Push batch {batch} failed: {source}")]
    Send {
        batch: usize,
        #[source]
        source: PushError,
    },
}

/// Lifetime counters of one dispatcher, served by `/stats`
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub dispatches: AtomicU64,
    pub batches_sent: AtomicU64,
    pub batches_failed: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    pub pruned: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub dispatches: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub delivered: u64,
    pub failed: u64,
    pub pruned: u64,
}

/// Sends registrations to the push provider in bounded batches and prunes
/// registrations the provider reports as permanently invalid.
pub struct BatchDispatcher {
    provider: Arc<dyn PushProvider>,
    tokens: Arc<dyn TokenRepository>,
    config: DispatchConfig,
    stats: DispatcherStats,
}

impl BatchDispatcher {
    pub fn new(provider: Arc<dyn PushProvider>, tokens: Arc<dyn TokenRepository>) -> Self {
        Self::with_config(provider, tokens, DispatchConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn PushProvider>,
        tokens: Arc<dyn TokenRepository>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            provider,
            tokens,
            config,
            stats: DispatcherStats::default(),
        }
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Batches go out one at a time; a batch's deletions finish before the
    /// next batch is sent.
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, registrations, payload),
        fields(
            registrations = registrations.len(),
            provider = self.provider.name(),
            policy = %self.config.on_batch_error
        )
    )]
    pub async fn dispatch(
        &self,
        registrations: &[PushRegistration],
        payload: &NotificationPayload,
    ) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();
        if registrations.is_empty() {
            return Ok(report);
        }

        self.stats.dispatches.fetch_add(1, Ordering::Relaxed);

        for (index, batch) in registrations
            .chunks(self.config.effective_batch_size())
            .enumerate()
        {
            let tokens: Vec<String> = batch.iter().map(|r| r.token.clone()).collect();
            let response = match self
                .provider
                .send_multicast(MulticastMessage::new(&tokens, payload))
                .await
            {
                Ok(response) => response,
                Err(source) => {
                    DeliveryMetrics::record_batch_failed();
                    self.stats.batches_failed.fetch_add(1, Ordering::Relaxed);

                    match self.config.on_batch_error {
                        BatchErrorPolicy::Abort => {
                            tracing::error!(
                                batch = index,
                                size = batch.len(),
                                error = %source,
                                "Push batch failed, aborting dispatch"
                            );
                            return Err(DispatchError::Send {
                                batch: index,
                                source,
                            });
                        }
                        BatchErrorPolicy::Continue => {
                            tracing::error!(
                                batch = index,
                                size = batch.len(),
                                error = %source,
                                "Push batch failed, continuing with remaining batches"
                            );
                            report.failed_batches.push(index);
                            continue;
                        }
                    }
                }
            };

            DeliveryMetrics::record_batch_sent();
            report.batches_sent += 1;
            self.stats.batches_sent.fetch_add(1, Ordering::Relaxed);

            let before = (report.delivered, report.failed, report.pruned);
            let invalid = self.inspect(batch, &response.responses, &mut report);
            self.prune(invalid, &mut report).await;

            self.stats
                .delivered
                .fetch_add((report.delivered - before.0) as u64, Ordering::Relaxed);
            self.stats
                .failed
                .fetch_add((report.failed - before.1) as u64, Ordering::Relaxed);
            self.stats
                .pruned
                .fetch_add((report.pruned - before.2) as u64, Ordering::Relaxed);
        }

        tracing::info!(
            batches = report.batches_sent,
            delivered = report.delivered,
            failed = report.failed,
            pruned = report.pruned,
            failed_batches = report.failed_batches.len(),
            "Dispatch finished"
        );

        Ok(report)
    }

    /// Tally one batch's positional results and collect the handles of
    /// registrations that can never be delivered to again.
    fn inspect<'a>(
        &self,
        batch: &'a [PushRegistration],
        responses: &[SendResponse],
        report: &mut DispatchReport,
    ) -> Vec<&'a DeletionHandle> {
        let mut invalid = Vec::new();
        let mut delivered = 0usize;
        let mut failed = 0usize;

        for (registration, response) in batch.iter().zip(responses) {
            match response {
                SendResponse::Delivered { .. } => delivered += 1,
                SendResponse::Failed { class, message } => {
                    failed += 1;
                    DeliveryMetrics::record_failure_class(class.code());
                    if class.is_token_invalid() {
                        invalid.push(&registration.handle);
                    } else {
                        tracing::debug!(
                            code = class.code(),
                            error = %message,
                            "Transient delivery failure, keeping registration"
                        );
                    }
                }
            }
        }

        if responses.len() != batch.len() {
            tracing::warn!(
                expected = batch.len(),
                received = responses.len(),
                "Provider returned a mismatched number of results"
            );
        }

        DeliveryMetrics::record_outcomes(delivered as u64, failed as u64);
        report.delivered += delivered;
        report.failed += failed;
        invalid
    }

    async fn prune(&self, handles: Vec<&DeletionHandle>, report: &mut DispatchReport) {
        if handles.is_empty() {
            return;
        }

        let results = join_all(
            handles
                .iter()
                .map(|handle| self.tokens.delete_registration(handle)),
        )
        .await;

        let mut removed = 0usize;
        let mut failures = 0usize;
        for (handle, result) in handles.iter().zip(results) {
            match result {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!(registration = %handle, "Pruned invalid registration");
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(registration = %handle, error = %e, "Failed to prune registration");
                }
            }
        }

        DeliveryMetrics::record_pruned(removed as u64, failures as u64);
        report.pruned += removed;
        report.prune_failures += failures;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::{BatchResponse, ErrorClass};
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::store::MemoryStore;

    /// Records batch sizes and fails the positions and calls it is told to
    struct ScriptedProvider {
        calls: Mutex<Vec<usize>>,
        failures: Vec<(usize, ErrorClass)>,
        failing_calls: Vec<usize>,
    }

    #[async_trait]
    impl PushProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn send_multicast(
            &self,
            message: MulticastMessage<'_>,
        ) -> Result<BatchResponse, PushError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(message.tokens.len());
                calls.len() - 1
            };
            if self.failing_calls.contains(&call) {
                return Err(PushError::Provider("provider unreachable".into()));
            }
            Ok(BatchResponse::new(
                (0..message.tokens.len())
                    .map(|i| match self.failures.iter().find(|(p, _)| *p == i) {
                        Some((_, class)) => SendResponse::failed(*class, "scripted"),
                        None => SendResponse::Delivered {
                            message_id: format!("m{}", i),
                        },
                    })
                    .collect(),
            ))
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload::builder("t", "b").build()
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("abort".parse::<BatchErrorPolicy>().unwrap(), BatchErrorPolicy::Abort);
        assert_eq!("Continue".parse::<BatchErrorPolicy>().unwrap(), BatchErrorPolicy::Continue);
        assert!("retry".parse::<BatchErrorPolicy>().is_err());
    }

    #[test]
    fn test_batch_size_is_clamped() {
        let config = DispatchConfig {
            batch_size: 10_000,
            ..DispatchConfig::default()
        };
        assert_eq!(config.effective_batch_size(), MAX_BATCH_SIZE);

        let config = DispatchConfig {
            batch_size: 0,
            ..DispatchConfig::default()
        };
        assert_eq!(config.effective_batch_size(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_keep_registrations() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..4 {
            store.register_token("u1", format!("t{}", i));
        }
        let provider = Arc::new(ScriptedProvider {
            calls: Mutex::new(Vec::new()),
            failures: vec![
                (1, ErrorClass::ServerUnavailable),
                (2, ErrorClass::InvalidArgument),
            ],
            failing_calls: vec![],
        });

        let dispatcher = BatchDispatcher::new(provider, store.clone());
        let registrations = store.tokens_for("u1").await.unwrap();
        let report = dispatcher.dispatch(&registrations, &payload()).await.unwrap();

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.pruned, 0);
        assert_eq!(store.tokens_for("u1").await.unwrap().len(), 4);
        assert_eq!(dispatcher.stats().dispatches, 1);
    }

    #[tokio::test]
    async fn test_configured_batch_size() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider {
            calls: Mutex::new(Vec::new()),
            failures: vec![],
            failing_calls: vec![],
        });
        let registrations: Vec<PushRegistration> = (0..25)
            .map(|i| PushRegistration::new("u1", format!("t{}", i)))
            .collect();

        let dispatcher = BatchDispatcher::with_config(
            provider.clone(),
            store,
            DispatchConfig {
                batch_size: 10,
                on_batch_error: BatchErrorPolicy::Abort,
            },
        );
        let report = dispatcher.dispatch(&registrations, &payload()).await.unwrap();

        assert_eq!(*provider.calls.lock().unwrap(), vec![10, 10, 5]);
        assert_eq!(report.batches_sent, 3);
        assert_eq!(report.delivered, 25);
    }

    #[tokio::test]
    async fn test_stats_keep_batches_sent_before_abort() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(ScriptedProvider {
            calls: Mutex::new(Vec::new()),
            failures: vec![(7, ErrorClass::NotRegistered)],
            failing_calls: vec![1],
        });
        let registrations: Vec<PushRegistration> = (0..600)
            .map(|i| PushRegistration::new("u1", format!("t{}", i)))
            .collect();
        for registration in &registrations {
            store.register_token("u1", registration.token.clone());
        }

        let dispatcher = BatchDispatcher::new(provider.clone(), store);
        let err = dispatcher
            .dispatch(&registrations, &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Send { batch: 1, .. }));
        assert_eq!(*provider.calls.lock().unwrap(), vec![500, 100]);

        let stats = dispatcher.stats();
        assert_eq!(stats.dispatches, 1);
        assert_eq!(stats.batches_sent, 1);
        assert_eq!(stats.batches_failed, 1);
        assert_eq!(stats.delivered, 499);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pruned, 1);
    }
}
