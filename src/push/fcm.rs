//! Firebase Cloud Messaging HTTP v1 provider.
//!
//! FCM v1 has no multicast endpoint, so a multicast is one `messages:send`
//! request per token, run with bounded concurrency. Results stay in token
//! order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::auth::AccessTokenSource;
use crate::notification::{AndroidPriority, NotificationPayload};

use super::{BatchResponse, ErrorClass, MulticastMessage, PushError, PushProvider, SendResponse};

#[derive(Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Serialize)]
struct Message<'a> {
    token: &'a str,
    notification: Notification<'a>,
    #[serde(skip_serializing_if = "no_data")]
    data: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    android: Option<AndroidConfig>,
}

fn no_data(data: &&BTreeMap<String, String>) -> bool {
    data.is_empty()
}

#[derive(Serialize)]
struct Notification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct AndroidConfig {
    priority: AndroidPriority,
}

#[derive(Deserialize)]
struct SendSuccess {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDetail {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    field_violations: Vec<FieldViolation>,
}

#[derive(Debug, Default, Deserialize)]
struct FieldViolation {
    #[serde(default)]
    field: String,
}

impl ErrorBody {
    /// FCM-specific `errorCode` from the details, falling back to the
    /// canonical status.
    fn error_code(&self) -> &str {
        self.details
            .iter()
            .find_map(|d| d.error_code.as_deref())
            .unwrap_or(&self.status)
    }

    fn names_registration_token(&self) -> bool {
        let field_named = self
            .details
            .iter()
            .flat_map(|d| d.field_violations.iter())
            .any(|v| v.field == "message.token");

        field_named || self.message.to_lowercase().contains("registration token")
    }

    pub(crate) fn classify(&self) -> ErrorClass {
        match self.error_code() {
            "UNREGISTERED" => ErrorClass::NotRegistered,
            "INVALID_ARGUMENT" if self.names_registration_token() => {
                ErrorClass::InvalidRegistrationToken
            }
            "INVALID_ARGUMENT" => ErrorClass::InvalidArgument,
            "QUOTA_EXCEEDED" | "RESOURCE_EXHAUSTED" => ErrorClass::MessageRateExceeded,
            "UNAVAILABLE" => ErrorClass::ServerUnavailable,
            "INTERNAL" => ErrorClass::InternalError,
            "SENDER_ID_MISMATCH" => ErrorClass::MismatchedCredential,
            "THIRD_PARTY_AUTH_ERROR" => ErrorClass::ThirdPartyAuthError,
            _ => ErrorClass::Unknown,
        }
    }
}

pub struct FcmProvider {
    http: reqwest::Client,
    send_url: Arc<str>,
    credentials: Arc<dyn AccessTokenSource>,
    max_concurrent_sends: usize,
}

impl FcmProvider {
    pub fn new(
        endpoint: &str,
        project_id: &str,
        credentials: Arc<dyn AccessTokenSource>,
        max_concurrent_sends: usize,
        timeout: Duration,
    ) -> Result<Self, PushError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Config(e.to_string()))?;

        Ok(Self {
            http,
            send_url: Arc::from(format!(
                "{}/v1/projects/{}/messages:send",
                endpoint.trim_end_matches('/'),
                project_id
            )),
            credentials,
            max_concurrent_sends: max_concurrent_sends.max(1),
        })
    }

    async fn send_one(
        http: reqwest::Client,
        send_url: Arc<str>,
        access_token: Arc<str>,
        token: String,
        payload: Arc<NotificationPayload>,
    ) -> SendResponse {
        let request = SendRequest {
            message: Message {
                token: &token,
                notification: Notification {
                    title: payload.title(),
                    body: payload.body(),
                },
                data: payload.data(),
                android: payload
                    .android_priority()
                    .map(|priority| AndroidConfig { priority }),
            },
        };

        let response = match http
            .post(&*send_url)
            .bearer_auth(&*access_token)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return SendResponse::failed(ErrorClass::ServerUnavailable, e.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<SendSuccess>().await {
                Ok(body) => SendResponse::Delivered {
                    message_id: body.name,
                },
                Err(e) => SendResponse::failed(ErrorClass::Unknown, e.to_string()),
            };
        }

        let body = response.text().await.unwrap_or_default();
        let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
        let class = envelope.error.classify();
        let message = if envelope.error.message.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            envelope.error.message
        };

        SendResponse::failed(class, message)
    }
}

#[async_trait]
impl PushProvider for FcmProvider {
    fn name(&self) -> &'static str {
        "fcm"
    }

    #[tracing::instrument(
        name = "fcm.send_multicast",
        skip(self, message),
        fields(tokens = message.tokens.len())
    )]
    async fn send_multicast(&self, message: MulticastMessage<'_>) -> Result<BatchResponse, PushError> {
        message.validate()?;
        let access_token: Arc<str> = Arc::from(self.credentials.access_token().await?);
        let payload = Arc::new(message.payload.clone());

        let responses: Vec<SendResponse> = stream::iter(message.tokens.to_vec())
            .map(|token| {
                Self::send_one(
                    self.http.clone(),
                    self.send_url.clone(),
                    access_token.clone(),
                    token,
                    payload.clone(),
                )
            })
            .buffered(self.max_concurrent_sends)
            .collect()
            .await;

        let batch = BatchResponse::new(responses);
        tracing::debug!(
            success = batch.success_count(),
            failure = batch.failure_count(),
            "FCM multicast finished"
        );
        Ok(batch)
    }
}
