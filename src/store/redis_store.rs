//! Redis-backed document store.
//!
//! Documents are hashes with string fields; indexes are sets. Every key is
//! namespaced under the configured prefix (default `unigo`):
//!
//! | Key                                   | Type   | Contents                       |
//! |---------------------------------------|--------|--------------------------------|
//! | `{p}:users:{uid}`                     | hash   | profile fields                 |
//! | `{p}:users:{uid}:courses`             | set    | enrolled course codes          |
//! | `{p}:users:{uid}:fcm_tokens`          | set    | device tokens                  |
//! | `{p}:idx:course:{code}`               | set    | uids enrolled in the course    |
//! | `{p}:idx:faculty:{id}`                | set    | uids in the faculty            |
//! | `{p}:roles:{uid}`                     | hash   | role / admin / level / super_admin |
//! | `{p}:courses:{id}`                    | hash   | code / courseCode              |
//! | `{p}:calendar:{id}`                   | hash   | calendar item fields           |
//! | `{p}:calendar:by_date`                | zset   | item ids scored by epoch secs  |
//! | `{p}:civil:{doc}`                     | hash   | civil record                   |
//! | `{p}:idx:civil:{national_id}`         | string | civil document id              |
//! | `{p}:mail`                            | stream | queued mail (`payload` field)  |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::notification::{DeletionHandle, PushRegistration, Role, RoleRecord};
use crate::redis::RedisPool;

use super::{
    CalendarItem, CivilRecord, CivilRegistry, CourseCatalog, IdentityDirectory, MailMessage,
    MailOutbox, StoreError, TokenRepository, UserProfile,
};

pub struct RedisStore {
    pool: Arc<RedisPool>,
    prefix: String,
}

impl RedisStore {
    pub fn new(pool: Arc<RedisPool>, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    fn user_key(&self, uid: &str) -> String {
        format!("{}:users:{}", self.prefix, uid)
    }

    fn user_courses_key(&self, uid: &str) -> String {
        format!("{}:users:{}:courses", self.prefix, uid)
    }

    fn tokens_key(&self, uid: &str) -> String {
        format!("{}:users:{}:fcm_tokens", self.prefix, uid)
    }

    fn course_index_key(&self, code: &str) -> String {
        format!("{}:idx:course:{}", self.prefix, code)
    }

    fn faculty_index_key(&self, faculty_id: &str) -> String {
        format!("{}:idx:faculty:{}", self.prefix, faculty_id)
    }

    fn role_key(&self, uid: &str) -> String {
        format!("{}:roles:{}", self.prefix, uid)
    }

    fn course_key(&self, course_id: &str) -> String {
        format!("{}:courses:{}", self.prefix, course_id)
    }

    fn calendar_key(&self, item_id: &str) -> String {
        format!("{}:calendar:{}", self.prefix, item_id)
    }

    fn calendar_by_date_key(&self) -> String {
        format!("{}:calendar:by_date", self.prefix)
    }

    fn civil_key(&self, doc_id: &str) -> String {
        format!("{}:civil:{}", self.prefix, doc_id)
    }

    fn civil_index_key(&self, national_id: &str) -> String {
        format!("{}:idx:civil:{}", self.prefix, national_id)
    }

    fn mail_key(&self) -> String {
        format!("{}:mail", self.prefix)
    }

    async fn hash(&self, key: String) -> Result<HashMap<String, String>, StoreError> {
        let fields = self
            .pool
            .execute(|mut conn| async move { conn.hgetall::<_, HashMap<String, String>>(key).await })
            .await?;
        Ok(fields)
    }

    async fn members(&self, key: String) -> Result<Vec<String>, StoreError> {
        let members = self
            .pool
            .execute(|mut conn| async move { conn.smembers::<_, Vec<String>>(key).await })
            .await?;
        Ok(members)
    }

    /// Read a hash document, `None` when the key does not exist.
    async fn document<T: DeserializeOwned>(&self, key: String) -> Result<Option<T>, StoreError> {
        let fields = self.hash(key.clone()).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        decode_hash(&key, fields).map(Some)
    }
}

/// Interpret string hash fields as a JSON object of strings.
fn decode_hash<T: DeserializeOwned>(
    key: &str,
    fields: HashMap<String, String>,
) -> Result<T, StoreError> {
    let object: Map<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();

    serde_json::from_value(Value::Object(object)).map_err(|e| StoreError::Malformed {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Hash fields hold strings, so legacy boolean flags arrive as "true"/"1".
fn decode_role(fields: &HashMap<String, String>) -> RoleRecord {
    let flag = |name: &str| {
        fields
            .get(name)
            .map(|v| matches!(v.trim(), "true" | "1"))
    };

    RoleRecord {
        role: fields.get("role").map(|r| Role::from(r.clone())),
        admin: flag("admin"),
        level: fields.get("level").cloned(),
        super_admin: flag("super_admin"),
    }
}

#[async_trait]
impl IdentityDirectory for RedisStore {
    async fn role_record(&self, identity_id: &str) -> Result<Option<RoleRecord>, StoreError> {
        let fields = self.hash(self.role_key(identity_id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(decode_role(&fields)))
    }

    async fn identities_in_course(&self, course_code: &str) -> Result<Vec<String>, StoreError> {
        self.members(self.course_index_key(course_code)).await
    }

    async fn identities_in_faculty(&self, faculty_id: &str) -> Result<Vec<String>, StoreError> {
        self.members(self.faculty_index_key(faculty_id)).await
    }

    async fn profile(&self, identity_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let Some(mut profile) = self
            .document::<UserProfile>(self.user_key(identity_id))
            .await?
        else {
            return Ok(None);
        };

        profile.enrolled_courses = self.members(self.user_courses_key(identity_id)).await?;
        Ok(Some(profile))
    }
}

#[async_trait]
impl TokenRepository for RedisStore {
    async fn tokens_for(&self, identity_id: &str) -> Result<Vec<PushRegistration>, StoreError> {
        let tokens = self.members(self.tokens_key(identity_id)).await?;
        Ok(tokens
            .into_iter()
            .map(|t| PushRegistration::new(identity_id, t))
            .collect())
    }

    async fn delete_registration(&self, handle: &DeletionHandle) -> Result<(), StoreError> {
        let key = self.tokens_key(handle.identity_id());
        let token = handle.token().to_string();
        self.pool
            .execute(|mut conn| async move { conn.srem::<_, _, i64>(key, token).await })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CourseCatalog for RedisStore {
    async fn course_code(&self, course_id: &str) -> Result<Option<String>, StoreError> {
        let fields = self.hash(self.course_key(course_id)).await?;
        let field = |name: &str| {
            fields
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };
        Ok(field("code")
            .or_else(|| field("courseCode"))
            .map(str::to_string))
    }

    async fn calendar_items_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarItem>, StoreError> {
        let key = self.calendar_by_date_key();
        let min = start.timestamp();
        let max = format!("({}", end.timestamp());
        let ids = self
            .pool
            .execute(|mut conn| async move {
                conn.zrangebyscore::<_, _, _, Vec<String>>(key, min, max).await
            })
            .await?;

        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            // Index entries can outlive their document
            if let Some(mut item) = self.document::<CalendarItem>(self.calendar_key(&id)).await? {
                item.id = id;
                items.push(item);
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl CivilRegistry for RedisStore {
    async fn civil_record(&self, national_id: &str) -> Result<Option<CivilRecord>, StoreError> {
        if let Some(record) = self.document(self.civil_key(national_id)).await? {
            return Ok(Some(record));
        }

        self.civil_record_by_national_id(national_id).await
    }

    async fn civil_record_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<CivilRecord>, StoreError> {
        let index_key = self.civil_index_key(national_id);
        let doc_id = self
            .pool
            .execute(|mut conn| async move { conn.get::<_, Option<String>>(index_key).await })
            .await?;

        match doc_id {
            Some(doc_id) => self.document(self.civil_key(&doc_id)).await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl MailOutbox for RedisStore {
    async fn enqueue(&self, mail: MailMessage) -> Result<String, StoreError> {
        let key = self.mail_key();
        let payload = serde_json::to_string(&mail)?;
        let id = self
            .pool
            .execute(|mut conn| async move {
                conn.xadd::<_, _, _, _, String>(key, "*", &[("payload", payload)])
                    .await
            })
            .await?;

        tracing::debug!(mail_id = %id, kind = %mail.kind, "Mail appended to outbox stream");
        Ok(id)
    }
}
