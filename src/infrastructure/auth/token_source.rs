use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::AssertionClaims;
use crate::config::GoogleConfig;

/// OAuth scope for FCM HTTP v1
pub const FIREBASE_MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// OAuth scope for Identity Toolkit admin calls
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Refresh this long before Google's reported expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Failed to read service account key: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed service account key: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to sign assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Token endpoint unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Token endpoint rejected assertion ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Source of bearer tokens for Google APIs.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// Fixed token, for emulators and tests.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }
}

/// The fields of a Google service-account JSON key this service needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Exchanges a signed service-account assertion for an access token and
/// reuses it until shortly before it expires.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scopes: Vec<&'static str>,
    http: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(
        key: ServiceAccountKey,
        scopes: Vec<&'static str>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            key,
            encoding_key,
            scopes,
            http,
            cached: RwLock::new(None),
        })
    }

    /// Build from the `google` settings section. `None` when no key file is
    /// configured.
    pub fn from_config(config: &GoogleConfig) -> Result<Option<Self>, AuthError> {
        let Some(path) = config.credentials_file.as_deref() else {
            return Ok(None);
        };

        let key = ServiceAccountKey::from_file(path)?;
        tracing::info!(
            client_email = %key.client_email,
            "Loaded Google service account"
        );

        Self::new(
            key,
            vec![FIREBASE_MESSAGING_SCOPE, CLOUD_PLATFORM_SCOPE],
            Duration::from_secs(config.request_timeout_seconds),
        )
        .map(Some)
    }

    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    fn sign_assertion(&self) -> Result<String, AuthError> {
        let claims = AssertionClaims::new(
            &self.key.client_email,
            &self.scopes,
            &self.key.token_uri,
            Utc::now().timestamp(),
        );
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)?)
    }

    async fn fetch(&self) -> Result<CachedToken, AuthError> {
        let assertion = self.sign_assertion()?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(
            client_email = %self.key.client_email,
            expires_in = token.expires_in,
            "Obtained Google access token"
        );

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in - EXPIRY_MARGIN_SECS),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(ref token) = *cached {
                if token.expires_at > Utc::now() {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut guard = self.cached.write().await;
        if let Some(ref token) = *guard {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }
}
