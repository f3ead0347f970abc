//! Identity provider access: password-reset (set-password) links.
//!
//! Links are generated by Identity Toolkit `accounts:sendOobCode` with
//! `returnOobLink`, so Google does not send its own e-mail; the link is
//! embedded in the mail this service queues instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{AccessTokenSource, AuthError};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity provider credentials unavailable: {0}")]
    Auth(#[from] AuthError),

    #[error("Identity provider unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Identity provider not configured")]
    Unconfigured,
}

#[async_trait]
pub trait PasswordLinkProvider: Send + Sync {
    /// Link letting the owner of `email` set a new password.
    async fn password_reset_link(&self, email: &str) -> Result<String, IdentityError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'static str,
    email: &'a str,
    return_oob_link: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeResponse {
    oob_link: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Identity Toolkit REST client for one project.
pub struct IdentityToolkitClient {
    http: reqwest::Client,
    url: String,
    credentials: Arc<dyn AccessTokenSource>,
}

impl IdentityToolkitClient {
    pub fn new(
        endpoint: &str,
        project_id: &str,
        credentials: Arc<dyn AccessTokenSource>,
        timeout: Duration,
    ) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: format!(
                "{}/v1/projects/{}/accounts:sendOobCode",
                endpoint.trim_end_matches('/'),
                project_id
            ),
            credentials,
        })
    }
}

#[async_trait]
impl PasswordLinkProvider for IdentityToolkitClient {
    #[tracing::instrument(name = "identity.password_reset_link", skip(self, email))]
    async fn password_reset_link(&self, email: &str) -> Result<String, IdentityError> {
        let access_token = self.credentials.access_token().await?;
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(access_token)
            .json(&OobCodeRequest {
                request_type: "PASSWORD_RESET",
                email,
                return_oob_link: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
            return Err(IdentityError::Rejected {
                status: status.as_u16(),
                message: envelope.error.message,
            });
        }

        let body: OobCodeResponse = response.json().await?;
        Ok(body.oob_link)
    }
}

/// Stand-in used when no Google credentials are configured. Every request
/// fails, so the e-mail flows degrade the same way a provider outage would.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredLinkProvider;

#[async_trait]
impl PasswordLinkProvider for UnconfiguredLinkProvider {
    async fn password_reset_link(&self, _email: &str) -> Result<String, IdentityError> {
        Err(IdentityError::Unconfigured)
    }
}

/// Build the link provider from optional credentials.
pub fn create_link_provider(
    endpoint: &str,
    credentials: Option<Arc<dyn AccessTokenSource>>,
    project_id: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn PasswordLinkProvider>, IdentityError> {
    match (credentials, project_id) {
        (Some(credentials), Some(project_id)) => {
            tracing::info!(project_id = %project_id, "Creating Identity Toolkit client");
            Ok(Arc::new(IdentityToolkitClient::new(
                endpoint,
                project_id,
                credentials,
                timeout,
            )?))
        }
        _ => {
            tracing::warn!("Google credentials not configured, password links unavailable");
            Ok(Arc::new(UnconfiguredLinkProvider))
        }
    }
}
