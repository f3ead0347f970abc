use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::push::PushProvider;
use crate::store::{StoreError, Stores};

use super::{
    BatchDispatcher, DispatchConfig, DispatchError, DispatchReport, DispatcherStatsSnapshot,
    NotificationPayload, RecipientResolver, ScopeDescriptor, TokenAggregator,
};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Recipient lookup failed: {0}")]
    Lookup(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Outcome of one `notify` call
#[derive(Debug, Clone, Serialize)]
pub struct NotifySummary {
    pub scope: ScopeDescriptor,
    pub recipients: usize,
    pub registrations: usize,
    pub delivery: DispatchReport,
}

/// resolve → expand → dispatch
pub struct NotificationPipeline {
    resolver: RecipientResolver,
    aggregator: TokenAggregator,
    dispatcher: BatchDispatcher,
}

impl NotificationPipeline {
    pub fn new(
        resolver: RecipientResolver,
        aggregator: TokenAggregator,
        dispatcher: BatchDispatcher,
    ) -> Self {
        Self {
            resolver,
            aggregator,
            dispatcher,
        }
    }

    /// Wire the pipeline from the store collaborators and a provider.
    pub fn from_stores(
        stores: &Stores,
        provider: Arc<dyn PushProvider>,
        dispatch: DispatchConfig,
        lookup_concurrency: usize,
    ) -> Self {
        Self::new(
            RecipientResolver::new(stores.directory.clone(), lookup_concurrency),
            TokenAggregator::new(stores.tokens.clone(), lookup_concurrency),
            BatchDispatcher::with_config(provider, stores.tokens.clone(), dispatch),
        )
    }

    pub fn resolver(&self) -> &RecipientResolver {
        &self.resolver
    }

    pub fn aggregator(&self) -> &TokenAggregator {
        &self.aggregator
    }

    pub fn dispatcher(&self) -> &BatchDispatcher {
        &self.dispatcher
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.dispatcher.stats()
    }

    #[tracing::instrument(
        name = "pipeline.notify",
        skip(self, payload),
        fields(scope = %scope, title = %payload.title())
    )]
    pub async fn notify(
        &self,
        scope: ScopeDescriptor,
        payload: &NotificationPayload,
    ) -> Result<NotifySummary, NotifyError> {
        let recipients = self.resolver.resolve(&scope).await?;
        let registrations = self.aggregator.expand(&recipients).await?;
        let delivery = self.dispatcher.dispatch(&registrations, payload).await?;

        Ok(NotifySummary {
            scope,
            recipients: recipients.len(),
            registrations: registrations.len(),
            delivery,
        })
    }
}
