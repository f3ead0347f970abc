use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::broadcast;

use crate::config::RedisConfig;
use crate::metrics::IngressMetrics;
use crate::redis::{BackoffConfig, ExponentialBackoff};

use super::{DocumentEvent, Triggers};

const DEFAULT_CHANNEL: &str = "documents:*";

/// Why one subscription attempt ended
enum LoopExit {
    Shutdown,
    StreamEnded,
}

/// Redis Pub/Sub subscriber feeding document events to the triggers
pub struct RedisSubscriber {
    config: RedisConfig,
    triggers: Arc<Triggers>,
    shutdown: broadcast::Sender<()>,
}

impl RedisSubscriber {
    pub fn new(config: RedisConfig, triggers: Arc<Triggers>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            config,
            triggers,
            shutdown,
        }
    }

    /// Get a shutdown signal sender
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Subscribe and keep resubscribing until shutdown.
    pub async fn start(&self) -> anyhow::Result<()> {
        let channels = self.channels();
        tracing::info!(channels = ?channels, "Starting Redis document event subscriber");

        let mut backoff = ExponentialBackoff::new(BackoffConfig::from(&self.config));
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            let error = match self.run_subscription_loop(&channels, &mut backoff).await {
                Ok(LoopExit::Shutdown) => break,
                Ok(LoopExit::StreamEnded) => anyhow::anyhow!("message stream ended"),
                Err(e) => e,
            };

            let delay = backoff.next_delay();
            IngressMetrics::record_reconnection();
            tracing::error!(
                error = %error,
                attempt = backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Redis subscription lost, reconnecting"
            );

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Redis subscriber stopped gracefully");
        Ok(())
    }

    fn channels(&self) -> Vec<String> {
        if self.config.channels.is_empty() {
            vec![DEFAULT_CHANNEL.to_string()]
        } else {
            self.config.channels.clone()
        }
    }

    async fn run_subscription_loop(
        &self,
        channels: &[String],
        backoff: &mut ExponentialBackoff,
    ) -> anyhow::Result<LoopExit> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in channels {
            if is_pattern(channel) {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        tracing::info!("Redis subscription established");
        backoff.reset();

        let mut message_stream = pubsub.on_message();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(LoopExit::Shutdown);
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        tracing::warn!("Redis message stream ended");
                        return Ok(LoopExit::StreamEnded);
                    };

                    let channel = msg.get_channel_name().to_string();
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to get message payload");
                            continue;
                        }
                    };

                    self.handle_message(&channel, &payload).await;
                }
            }
        }
    }

    /// Events are handled one at a time, in arrival order.
    async fn handle_message(&self, channel: &str, payload: &str) {
        IngressMetrics::record_event_received();

        let event = match parse_event(payload) {
            Ok(event) => event,
            Err(e) => {
                IngressMetrics::record_event_rejected();
                tracing::warn!(
                    error = %e,
                    channel = %channel,
                    "Failed to parse document event"
                );
                return;
            }
        };

        tracing::debug!(channel = %channel, trigger = event.trigger_name(), "Received document event");

        // Failures are logged and counted by the trigger layer
        if let Ok(outcome) = self.triggers.handle_event(event).await {
            tracing::debug!(channel = %channel, outcome = outcome.label(), "Document event handled");
        }
    }
}

fn is_pattern(channel: &str) -> bool {
    channel.contains('*') || channel.contains('?') || channel.contains('[')
}

fn parse_event(payload: &str) -> Result<DocumentEvent, serde_json::Error> {
    serde_json::from_str(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_detection() {
        assert!(is_pattern("documents:*"));
        assert!(is_pattern("documents:calendar?"));
        assert!(!is_pattern("documents:grades"));
    }

    #[test]
    fn test_parse_calendar_event() {
        let event = parse_event(
            r#"{"type": "calendar_item_created",
                "item": {"id": "ev1", "scope": "course", "type": "Deadline",
                         "title": "Lab report", "courseCode": "CS101"}}"#,
        )
        .unwrap();

        match event {
            DocumentEvent::CalendarItemCreated { item } => {
                assert_eq!(item.id, "ev1");
                assert_eq!(item.item_type(), "Deadline");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_parse_user_created_event() {
        let event = parse_event(
            r#"{"type": "user_created", "uid": "u42",
                "profile": {"nationalId": "9981", "loginEmail": "s42@unigo.app"}}"#,
        )
        .unwrap();
        assert_eq!(event.trigger_name(), "welcome_email");
    }

    #[test]
    fn test_parse_garbage_rejected() {
        assert!(parse_event("not json").is_err());
        assert!(parse_event(r#"{"type": "calendar_item_created"}"#).is_err());
    }
}
