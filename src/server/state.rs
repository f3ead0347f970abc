use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::FixedOffset;

use crate::auth::{AccessTokenSource, ServiceAccountTokenSource};
use crate::config::Settings;
use crate::identity::create_link_provider;
use crate::notification::{BatchErrorPolicy, DispatchConfig, NotificationPipeline};
use crate::push::create_push_provider;
use crate::redis::RedisPool;
use crate::store::{create_stores, Stores};
use crate::triggers::Triggers;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub stores: Stores,
    pub triggers: Arc<Triggers>,
    /// Name of the active push provider
    pub push_backend: &'static str,
    pub redis: Option<Arc<RedisPool>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        stores: Stores,
        triggers: Arc<Triggers>,
        push_backend: &'static str,
        redis: Option<Arc<RedisPool>>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            stores,
            triggers,
            push_backend,
            redis,
            start_time: Instant::now(),
        }
    }

    /// Wire every collaborator from configuration.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let redis = if settings.store.backend == "redis" {
            let pool = RedisPool::new(settings.redis.clone())
                .context("Failed to create Redis pool")?;
            Some(Arc::new(pool))
        } else {
            None
        };

        let stores = create_stores(&settings.store, redis.clone());

        let service_account = ServiceAccountTokenSource::from_config(&settings.google)
            .context("Failed to load Google service account")?;
        let project_id = settings.google.project_id.clone().or_else(|| {
            service_account
                .as_ref()
                .and_then(|source| source.project_id().map(str::to_string))
        });
        let credentials = service_account
            .map(|source| Arc::new(source) as Arc<dyn AccessTokenSource>);

        let provider = create_push_provider(
            &settings.push,
            &settings.google,
            credentials.clone(),
            project_id.clone(),
        )
        .context("Failed to create push provider")?;
        let push_backend = provider.name();

        let on_batch_error: BatchErrorPolicy = settings
            .push
            .on_batch_error
            .parse()
            .map_err(|e| anyhow::anyhow!("push.on_batch_error: {}", e))?;
        let dispatch = DispatchConfig {
            batch_size: settings.push.batch_size,
            on_batch_error,
        };

        let pipeline = NotificationPipeline::from_stores(
            &stores,
            provider,
            dispatch,
            settings.push.lookup_concurrency,
        );

        let links = create_link_provider(
            &settings.google.identity_toolkit_endpoint,
            credentials,
            project_id.as_deref(),
            Duration::from_secs(settings.google.request_timeout_seconds),
        )
        .context("Failed to create identity toolkit client")?;

        let offset_minutes = settings.reminders.utc_offset_minutes;
        let campus_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            anyhow::anyhow!("reminders.utc_offset_minutes out of range: {}", offset_minutes)
        })?;

        let triggers = Arc::new(Triggers::new(
            Arc::new(pipeline),
            stores.clone(),
            links,
            campus_offset,
        ));

        tracing::info!(
            store = stores.backend,
            push = push_backend,
            batch_size = dispatch.effective_batch_size(),
            on_batch_error = %dispatch.on_batch_error,
            "Application state wired"
        );

        Ok(Self::new(settings, stores, triggers, push_backend, redis))
    }
}
