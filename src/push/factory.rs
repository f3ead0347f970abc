//! Push provider factory

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AccessTokenSource;
use crate::config::{GoogleConfig, PushConfig};

use super::fcm::FcmProvider;
use super::noop::NoopProvider;
use super::{PushError, PushProvider};

/// Create a push provider based on configuration.
///
/// - `"fcm"`: an [`FcmProvider`] when credentials and a project id are
///   available, otherwise an error
/// - `"noop"` (default): a [`NoopProvider`]
pub fn create_push_provider(
    push: &PushConfig,
    google: &GoogleConfig,
    credentials: Option<Arc<dyn AccessTokenSource>>,
    project_id: Option<String>,
) -> Result<Arc<dyn PushProvider>, PushError> {
    match push.backend.as_str() {
        "fcm" => {
            let credentials = credentials.ok_or_else(|| {
                PushError::Config("fcm backend requires google.credentials_file".to_string())
            })?;
            let project_id = project_id.ok_or_else(|| {
                PushError::Config("fcm backend requires google.project_id".to_string())
            })?;

            tracing::info!(
                backend = "fcm",
                project_id = %project_id,
                max_concurrent_sends = push.max_concurrent_sends,
                "Creating FCM push provider"
            );
            Ok(Arc::new(FcmProvider::new(
                &google.fcm_endpoint,
                &project_id,
                credentials,
                push.max_concurrent_sends,
                Duration::from_secs(google.request_timeout_seconds),
            )?))
        }
        other => {
            if other != "noop" {
                tracing::warn!(backend = %other, "Unknown push backend, using noop");
            }
            tracing::info!(backend = "noop", "Creating dry-run push provider");
            Ok(Arc::new(NoopProvider::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenSource;

    #[test]
    fn test_default_is_noop() {
        let provider =
            create_push_provider(&PushConfig::default(), &GoogleConfig::default(), None, None)
                .unwrap();
        assert_eq!(provider.name(), "noop");
    }

    #[test]
    fn test_fcm_requires_credentials_and_project() {
        let push = PushConfig {
            backend: "fcm".to_string(),
            ..PushConfig::default()
        };

        let missing_credentials =
            create_push_provider(&push, &GoogleConfig::default(), None, Some("p".into()));
        assert!(matches!(missing_credentials, Err(PushError::Config(_))));

        let credentials: Arc<dyn AccessTokenSource> = Arc::new(StaticTokenSource::new("t"));
        let missing_project =
            create_push_provider(&push, &GoogleConfig::default(), Some(credentials.clone()), None);
        assert!(matches!(missing_project, Err(PushError::Config(_))));

        let provider = create_push_provider(
            &push,
            &GoogleConfig::default(),
            Some(credentials),
            Some("unigo-app".into()),
        )
        .unwrap();
        assert_eq!(provider.name(), "fcm");
    }
}
