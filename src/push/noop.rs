use async_trait::async_trait;
use uuid::Uuid;

use super::{BatchResponse, MulticastMessage, PushError, PushProvider, SendResponse};

/// Dry-run provider: logs the multicast and reports every token delivered.
#[derive(Debug, Default, Clone)]
pub struct NoopProvider;

impl NoopProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushProvider for NoopProvider {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn send_multicast(&self, message: MulticastMessage<'_>) -> Result<BatchResponse, PushError> {
        message.validate()?;

        tracing::info!(
            tokens = message.tokens.len(),
            title = %message.payload.title(),
            "Dry-run multicast, nothing sent"
        );

        Ok(BatchResponse::new(
            message
                .tokens
                .iter()
                .map(|_| SendResponse::Delivered {
                    message_id: format!("dry-run/{}", Uuid::new_v4()),
                })
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationPayload;

    #[tokio::test]
    async fn test_noop_reports_every_token_delivered() {
        let payload = NotificationPayload::builder("t", "b").build();
        let tokens = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let response = NoopProvider::new()
            .send_multicast(MulticastMessage::new(&tokens, &payload))
            .await
            .unwrap();

        assert_eq!(response.responses.len(), 3);
        assert_eq!(response.success_count(), 3);
    }

    #[tokio::test]
    async fn test_noop_still_enforces_limits() {
        let payload = NotificationPayload::builder("t", "b").build();
        let result = NoopProvider::new()
            .send_multicast(MulticastMessage::new(&[], &payload))
            .await;

        assert!(result.is_err());
    }
}
