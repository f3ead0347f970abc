//! In-memory document store using DashMap.
//!
//! Implements every store trait. Data is lost on restart; used for local
//! development and as the backing store in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::{DeletionHandle, PushRegistration, RoleRecord};

use super::types::non_empty;
use super::{
    CalendarItem, CivilRecord, CivilRegistry, CourseCatalog, IdentityDirectory, MailMessage,
    MailOutbox, StoreError, TokenRepository, UserProfile,
};

/// `courses/{id}` document, `code` preferred over the legacy `courseCode`
#[derive(Debug, Clone, Default)]
struct CourseDoc {
    code: Option<String>,
    course_code: Option<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<String, UserProfile>,
    roles: DashMap<String, RoleRecord>,
    /// Per-identity tokens in registration order
    tokens: DashMap<String, Vec<String>>,
    courses: DashMap<String, CourseDoc>,
    calendar: DashMap<String, CalendarItem>,
    /// Keyed by document id, which is usually but not always the national id
    civil: DashMap<String, CivilRecord>,
    mail: DashMap<String, MailMessage>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, identity_id: impl Into<String>, profile: UserProfile) {
        self.users.insert(identity_id.into(), profile);
    }

    pub fn set_role(&self, identity_id: impl Into<String>, record: RoleRecord) {
        self.roles.insert(identity_id.into(), record);
    }

    /// Register a device token. The token is the document key, so
    /// re-registering the same token is a no-op.
    pub fn register_token(&self, identity_id: impl Into<String>, token: impl Into<String>) {
        let token = token.into();
        let mut tokens = self.tokens.entry(identity_id.into()).or_default();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }

    pub fn insert_course(&self, course_id: impl Into<String>, code: Option<&str>, course_code: Option<&str>) {
        self.courses.insert(
            course_id.into(),
            CourseDoc {
                code: code.map(str::to_string),
                course_code: course_code.map(str::to_string),
            },
        );
    }

    pub fn insert_calendar_item(&self, item: CalendarItem) {
        self.calendar.insert(item.id.clone(), item);
    }

    pub fn insert_civil_record(&self, document_id: impl Into<String>, record: CivilRecord) {
        self.civil.insert(document_id.into(), record);
    }

    /// Queued mails, oldest first
    pub fn outbox(&self) -> Vec<MailMessage> {
        let mut mails: Vec<MailMessage> = self.mail.iter().map(|m| m.value().clone()).collect();
        mails.sort_by_key(|m| m.created_at);
        mails
    }
}

#[async_trait]
impl IdentityDirectory for MemoryStore {
    async fn role_record(&self, identity_id: &str) -> Result<Option<RoleRecord>, StoreError> {
        Ok(self.roles.get(identity_id).map(|r| r.value().clone()))
    }

    async fn identities_in_course(&self, course_code: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .users
            .iter()
            .filter(|u| u.enrolled_courses.iter().any(|c| c == course_code))
            .map(|u| u.key().clone())
            .collect())
    }

    async fn identities_in_faculty(&self, faculty_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .users
            .iter()
            .filter(|u| u.faculty_id.as_deref() == Some(faculty_id))
            .map(|u| u.key().clone())
            .collect())
    }

    async fn profile(&self, identity_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users.get(identity_id).map(|u| u.value().clone()))
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn tokens_for(&self, identity_id: &str) -> Result<Vec<PushRegistration>, StoreError> {
        Ok(self
            .tokens
            .get(identity_id)
            .map(|tokens| {
                tokens
                    .iter()
                    .map(|t| PushRegistration::new(identity_id, t.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_registration(&self, handle: &DeletionHandle) -> Result<(), StoreError> {
        if let Some(mut tokens) = self.tokens.get_mut(handle.identity_id()) {
            tokens.retain(|t| t != handle.token());
        }
        Ok(())
    }
}

#[async_trait]
impl CourseCatalog for MemoryStore {
    async fn course_code(&self, course_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.courses.get(course_id).and_then(|c| {
            non_empty(&c.code)
                .or_else(|| non_empty(&c.course_code))
                .map(str::to_string)
        }))
    }

    async fn calendar_items_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarItem>, StoreError> {
        let mut items: Vec<CalendarItem> = self
            .calendar
            .iter()
            .filter(|i| i.date.is_some_and(|d| d >= start && d < end))
            .map(|i| i.value().clone())
            .collect();
        items.sort_by_key(|i| i.date);
        Ok(items)
    }
}

#[async_trait]
impl CivilRegistry for MemoryStore {
    async fn civil_record(&self, national_id: &str) -> Result<Option<CivilRecord>, StoreError> {
        if let Some(record) = self.civil.get(national_id) {
            return Ok(Some(record.value().clone()));
        }

        self.civil_record_by_national_id(national_id).await
    }

    async fn civil_record_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<CivilRecord>, StoreError> {
        Ok(self
            .civil
            .iter()
            .find(|r| r.national_id == national_id)
            .map(|r| r.value().clone()))
    }
}

#[async_trait]
impl MailOutbox for MemoryStore {
    async fn enqueue(&self, mail: MailMessage) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        tracing::debug!(mail_id = %id, kind = %mail.kind, "Mail queued in memory outbox");
        self.mail.insert(id.clone(), mail);
        Ok(id)
    }
}
