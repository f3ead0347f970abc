//! Document store access.
//!
//! The notification core only talks to the store through the traits below,
//! so the backing database can be swapped (memory for development and tests,
//! Redis in deployment) without touching delivery logic.
//!
//! All fallible operations return `Result<T, StoreError>`; implementations do
//! not retry, the caller's invocation fails instead.

mod factory;
mod memory;
mod redis_store;
mod types;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::notification::{DeletionHandle, PushRegistration, RoleRecord};
use crate::redis::PoolError;

pub use factory::create_stores;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use types::{CalendarItem, CalendarScope, CivilRecord, MailContent, MailMessage, UserProfile};
pub(crate) use types::non_empty;

/// Errors that can occur while reading or writing documents.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] PoolError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored document could not be interpreted
    #[error("Malformed document {key}: {reason}")]
    Malformed { key: String, reason: String },

    /// Backend is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to identities and their roles.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// `roles/{uid}`, `None` when the identity has no role document.
    async fn role_record(&self, identity_id: &str) -> Result<Option<RoleRecord>, StoreError>;

    /// Identities whose enrolled-course set contains `course_code`.
    async fn identities_in_course(&self, course_code: &str) -> Result<Vec<String>, StoreError>;

    /// Identities whose faculty equals `faculty_id`.
    async fn identities_in_faculty(&self, faculty_id: &str) -> Result<Vec<String>, StoreError>;

    /// `users/{uid}`, `None` when absent.
    async fn profile(&self, identity_id: &str) -> Result<Option<UserProfile>, StoreError>;
}

/// Push registrations stored under `users/{uid}/fcmTokens/{token}`.
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Every registration of one identity. Empty is valid.
    async fn tokens_for(&self, identity_id: &str) -> Result<Vec<PushRegistration>, StoreError>;

    /// Remove exactly the registration the handle points at.
    async fn delete_registration(&self, handle: &DeletionHandle) -> Result<(), StoreError>;
}

/// Courses and calendar items.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Trimmed `code` (or legacy `courseCode`) of `courses/{course_id}`.
    async fn course_code(&self, course_id: &str) -> Result<Option<String>, StoreError>;

    /// Calendar items dated in `[start, end)`.
    async fn calendar_items_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarItem>, StoreError>;
}

/// Civil registry records, keyed by national id.
#[async_trait]
pub trait CivilRegistry: Send + Sync {
    /// Looks the document up by id first, then by its `nationalId` field.
    async fn civil_record(&self, national_id: &str) -> Result<Option<CivilRecord>, StoreError>;

    /// Matches the `nationalId` field only, ignoring document ids.
    async fn civil_record_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<CivilRecord>, StoreError>;
}

/// The `mail` collection drained by the external mail sender.
#[async_trait]
pub trait MailOutbox: Send + Sync {
    /// Append a mail document and return its id.
    async fn enqueue(&self, mail: MailMessage) -> Result<String, StoreError>;
}

/// Every store collaborator, each behind its own trait object.
#[derive(Clone)]
pub struct Stores {
    pub directory: Arc<dyn IdentityDirectory>,
    pub tokens: Arc<dyn TokenRepository>,
    pub catalog: Arc<dyn CourseCatalog>,
    pub civil: Arc<dyn CivilRegistry>,
    pub outbox: Arc<dyn MailOutbox>,
    /// "memory" or "redis"
    pub backend: &'static str,
}

impl Stores {
    /// Share one memory store across every collaborator.
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            directory: store.clone(),
            tokens: store.clone(),
            catalog: store.clone(),
            civil: store.clone(),
            outbox: store,
            backend: "memory",
        }
    }

    /// Share one Redis store across every collaborator.
    pub fn redis(store: Arc<RedisStore>) -> Self {
        Self {
            directory: store.clone(),
            tokens: store.clone(),
            catalog: store.clone(),
            civil: store.clone(),
            outbox: store,
            backend: "redis",
        }
    }
}
