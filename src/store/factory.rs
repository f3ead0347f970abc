//! Store backend factory

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::redis::RedisPool;

use super::memory::MemoryStore;
use super::redis_store::RedisStore;
use super::Stores;

/// Create the store collaborators based on configuration.
///
/// - `"redis"`: a [`RedisStore`] if a Redis pool is provided
/// - `"memory"` (default): an empty [`MemoryStore`]
///
/// ```rust,ignore
/// let stores = create_stores(&settings.store, Some(redis_pool.clone()));
/// ```
pub fn create_stores(settings: &StoreConfig, redis_pool: Option<Arc<RedisPool>>) -> Stores {
    match settings.backend.as_str() {
        "redis" => {
            if let Some(pool) = redis_pool {
                tracing::info!(
                    backend = "redis",
                    prefix = %settings.key_prefix,
                    "Creating Redis document store"
                );
                Stores::redis(Arc::new(RedisStore::new(pool, settings.key_prefix.clone())))
            } else {
                tracing::warn!("Redis store requested but no pool provided, falling back to memory");
                Stores::memory(Arc::new(MemoryStore::new()))
            }
        }
        other => {
            if other != "memory" {
                tracing::warn!(backend = %other, "Unknown store backend, using memory");
            }
            tracing::info!(backend = "memory", "Creating memory document store");
            Stores::memory(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;

    #[test]
    fn test_default_is_memory() {
        let stores = create_stores(&StoreConfig::default(), None);
        assert_eq!(stores.backend, "memory");
    }

    #[test]
    fn test_redis_without_pool_falls_back() {
        let config = StoreConfig {
            backend: "redis".to_string(),
            ..StoreConfig::default()
        };
        assert_eq!(create_stores(&config, None).backend, "memory");
    }

    #[test]
    fn test_redis_with_pool() {
        let config = StoreConfig {
            backend: "redis".to_string(),
            ..StoreConfig::default()
        };
        let pool = Arc::new(RedisPool::new(RedisConfig::default()).unwrap());
        assert_eq!(create_stores(&config, Some(pool)).backend, "redis");
    }
}
