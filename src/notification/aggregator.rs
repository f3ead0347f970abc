use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::store::{StoreError, TokenRepository};

use super::PushRegistration;

/// Expands identities into their push registrations.
#[derive(Clone)]
pub struct TokenAggregator {
    tokens: Arc<dyn TokenRepository>,
    lookup_concurrency: usize,
}

impl TokenAggregator {
    pub fn new(tokens: Arc<dyn TokenRepository>, lookup_concurrency: usize) -> Self {
        Self {
            tokens,
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    /// Every registration of every identity, concatenated. The same token
    /// under two identities appears twice.
    #[tracing::instrument(
        name = "aggregator.expand",
        skip(self, identities),
        fields(identities = identities.len())
    )]
    pub async fn expand(
        &self,
        identities: &HashSet<String>,
    ) -> Result<Vec<PushRegistration>, StoreError> {
        let owned: Vec<String> = identities.iter().cloned().collect();
        let per_identity: Vec<Vec<PushRegistration>> = stream::iter(owned)
            .map(|identity| {
                let tokens = self.tokens.clone();
                async move { tokens.tokens_for(&identity).await }
            })
            .buffer_unordered(self.lookup_concurrency)
            .try_collect()
            .await?;

        let registrations: Vec<PushRegistration> = per_identity.into_iter().flatten().collect();
        tracing::debug!(registrations = registrations.len(), "Expanded registrations");
        Ok(registrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_expand_sums_all_registrations() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..3 {
            store.register_token("u1", format!("u1-{}", i));
        }
        store.register_token("u2", "u2-0");
        store.register_token("u3", "shared");
        store.register_token("u4", "shared");

        let aggregator = TokenAggregator::new(store, 2);
        let identities: HashSet<String> = ["u1", "u2", "u3", "u4", "u5"]
            .into_iter()
            .map(String::from)
            .collect();

        let registrations = aggregator.expand(&identities).await.unwrap();
        assert_eq!(registrations.len(), 6);
        assert_eq!(
            registrations.iter().filter(|r| r.token == "shared").count(),
            2
        );
    }

    #[tokio::test]
    async fn test_expand_empty_set() {
        let aggregator = TokenAggregator::new(Arc::new(MemoryStore::new()), 4);
        assert!(aggregator.expand(&HashSet::new()).await.unwrap().is_empty());
    }
}
