//! Push delivery provider abstraction.
//!
//! A provider accepts up to [`MAX_BATCH_SIZE`] device tokens and one payload
//! per call and reports a result for every token, in the order the tokens
//! were given.

mod factory;
mod fcm;
mod noop;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::notification::NotificationPayload;

pub use factory::create_push_provider;
pub use fcm::FcmProvider;
pub use noop::NoopProvider;

/// Provider limit on tokens per multicast call
pub const MAX_BATCH_SIZE: usize = 500;

/// Classification of a per-token delivery failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorClass {
    NotRegistered,
    InvalidRegistrationToken,
    InvalidArgument,
    MessageRateExceeded,
    ServerUnavailable,
    InternalError,
    MismatchedCredential,
    ThirdPartyAuthError,
    Unknown,
}

impl ErrorClass {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorClass::NotRegistered => "messaging/registration-token-not-registered",
            ErrorClass::InvalidRegistrationToken => "messaging/invalid-registration-token",
            ErrorClass::InvalidArgument => "messaging/invalid-argument",
            ErrorClass::MessageRateExceeded => "messaging/message-rate-exceeded",
            ErrorClass::ServerUnavailable => "messaging/server-unavailable",
            ErrorClass::InternalError => "messaging/internal-error",
            ErrorClass::MismatchedCredential => "messaging/mismatched-credential",
            ErrorClass::ThirdPartyAuthError => "messaging/third-party-auth-error",
            ErrorClass::Unknown => "messaging/unknown-error",
        }
    }

    /// The token will never be deliverable again and should be removed.
    pub fn is_token_invalid(&self) -> bool {
        matches!(
            self,
            ErrorClass::NotRegistered | ErrorClass::InvalidRegistrationToken
        )
    }
}

/// Result for one token of a multicast
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResponse {
    Delivered { message_id: String },
    Failed { class: ErrorClass, message: String },
}

impl SendResponse {
    pub fn failed(class: ErrorClass, message: impl Into<String>) -> Self {
        SendResponse::Failed {
            class,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SendResponse::Delivered { .. })
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            SendResponse::Delivered { .. } => None,
            SendResponse::Failed { class, .. } => Some(*class),
        }
    }
}

/// Positional results of one multicast call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResponse {
    pub responses: Vec<SendResponse>,
}

impl BatchResponse {
    pub fn new(responses: Vec<SendResponse>) -> Self {
        Self { responses }
    }

    pub fn success_count(&self) -> usize {
        self.responses.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.responses.len() - self.success_count()
    }
}

/// One provider call: tokens plus the shared payload
#[derive(Debug, Clone, Copy)]
pub struct MulticastMessage<'a> {
    pub tokens: &'a [String],
    pub payload: &'a NotificationPayload,
}

impl<'a> MulticastMessage<'a> {
    pub fn new(tokens: &'a [String], payload: &'a NotificationPayload) -> Self {
        Self { tokens, payload }
    }

    pub(crate) fn validate(&self) -> Result<(), PushError> {
        if self.tokens.is_empty() {
            return Err(PushError::InvalidRequest(
                "tokens must be a non-empty list".to_string(),
            ));
        }
        if self.tokens.len() > MAX_BATCH_SIZE {
            return Err(PushError::InvalidRequest(format!(
                "tokens list must not contain more than {} items, got {}",
                MAX_BATCH_SIZE,
                self.tokens.len()
            )));
        }
        Ok(())
    }
}

/// Failure of a whole multicast call
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Provider credentials unavailable: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid multicast request: {0}")]
    InvalidRequest(String),

    #[error("Push provider misconfigured: {0}")]
    Config(String),

    #[error("Push provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Send one payload to every token. The response has exactly one entry
    /// per token, in token order.
    async fn send_multicast(&self, message: MulticastMessage<'_>) -> Result<BatchResponse, PushError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_permanent_token_errors_prune() {
        let pruned: Vec<ErrorClass> = [
            ErrorClass::NotRegistered,
            ErrorClass::InvalidRegistrationToken,
            ErrorClass::InvalidArgument,
            ErrorClass::MessageRateExceeded,
            ErrorClass::ServerUnavailable,
            ErrorClass::InternalError,
            ErrorClass::MismatchedCredential,
            ErrorClass::ThirdPartyAuthError,
            ErrorClass::Unknown,
        ]
        .into_iter()
        .filter(ErrorClass::is_token_invalid)
        .collect();

        assert_eq!(
            pruned,
            vec![ErrorClass::NotRegistered, ErrorClass::InvalidRegistrationToken]
        );
        assert_eq!(
            ErrorClass::NotRegistered.code(),
            "messaging/registration-token-not-registered"
        );
        assert_eq!(
            ErrorClass::InvalidRegistrationToken.code(),
            "messaging/invalid-registration-token"
        );
    }

    #[test]
    fn test_batch_response_counts() {
        let response = BatchResponse::new(vec![
            SendResponse::Delivered {
                message_id: "m1".into(),
            },
            SendResponse::failed(ErrorClass::InternalError, "boom"),
            SendResponse::Delivered {
                message_id: "m2".into(),
            },
        ]);

        assert_eq!(response.success_count(), 2);
        assert_eq!(response.failure_count(), 1);
        assert_eq!(response.responses[1].error_class(), Some(ErrorClass::InternalError));
    }

    #[test]
    fn test_multicast_validation() {
        let payload = NotificationPayload::builder("t", "b").build();

        let empty: Vec<String> = Vec::new();
        assert!(MulticastMessage::new(&empty, &payload).validate().is_err());

        let full: Vec<String> = (0..MAX_BATCH_SIZE).map(|i| format!("tok-{}", i)).collect();
        assert!(MulticastMessage::new(&full, &payload).validate().is_ok());

        let over: Vec<String> = (0..=MAX_BATCH_SIZE).map(|i| format!("tok-{}", i)).collect();
        assert!(matches!(
            MulticastMessage::new(&over, &payload).validate(),
            Err(PushError::InvalidRequest(_))
        ));
    }
}
