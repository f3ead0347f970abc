use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Audience of one notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScopeDescriptor {
    /// One specific identity, delivered even if elevated
    Personal(String),
    /// Every identity enrolled in the course code
    Course(String),
    /// Every identity affiliated with the faculty
    FacultyWide(String),
}

impl ScopeDescriptor {
    /// Label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ScopeDescriptor::Personal(_) => "personal",
            ScopeDescriptor::Course(_) => "course",
            ScopeDescriptor::FacultyWide(_) => "faculty",
        }
    }

    /// Whether elevated identities are excluded when resolving this scope
    pub fn excludes_elevated(&self) -> bool {
        !matches!(self, ScopeDescriptor::Personal(_))
    }
}

impl fmt::Display for ScopeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeDescriptor::Personal(owner) => write!(f, "personal:{}", owner),
            ScopeDescriptor::Course(code) => write!(f, "course:{}", code),
            ScopeDescriptor::FacultyWide(faculty) => write!(f, "faculty:{}", faculty),
        }
    }
}

/// Android delivery priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AndroidPriority {
    #[default]
    Normal,
    High,
}

/// Reference to exactly one stored registration:
/// `users/{identity_id}/fcmTokens/{token}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeletionHandle {
    identity_id: String,
    token: String,
}

impl DeletionHandle {
    pub fn new(identity_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            identity_id: identity_id.into(),
            token: token.into(),
        }
    }

    pub fn identity_id(&self) -> &str {
        &self.identity_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Display for DeletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "users/{}/fcmTokens/{}", self.identity_id, self.token)
    }
}

/// One push destination of one identity's device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRegistration {
    pub token: String,
    pub handle: DeletionHandle,
}

impl PushRegistration {
    /// The registration's document key is the token itself.
    pub fn new(identity_id: impl Into<String>, token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            handle: DeletionHandle::new(identity_id, token.clone()),
            token,
        }
    }

    pub fn identity_id(&self) -> &str {
        self.handle.identity_id()
    }
}

/// Human-readable title/body plus string-only metadata.
///
/// Built once through [`NotificationPayloadBuilder`] and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    title: String,
    body: String,
    data: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    android_priority: Option<AndroidPriority>,
}

impl NotificationPayload {
    pub fn builder(title: impl Into<String>, body: impl Into<String>) -> NotificationPayloadBuilder {
        NotificationPayloadBuilder::new(title, body)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    pub fn android_priority(&self) -> Option<AndroidPriority> {
        self.android_priority
    }
}

/// Builder for notification payloads
#[derive(Debug, Clone)]
pub struct NotificationPayloadBuilder {
    title: String,
    body: String,
    data: BTreeMap<String, String>,
    android_priority: Option<AndroidPriority>,
}

impl NotificationPayloadBuilder {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
            android_priority: None,
        }
    }

    /// Add one metadata entry. Values are strings because the provider's
    /// data channel only carries strings.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn android_priority(mut self, priority: AndroidPriority) -> Self {
        self.android_priority = Some(priority);
        self
    }

    pub fn build(self) -> NotificationPayload {
        NotificationPayload {
            title: self.title,
            body: self.body,
            data: self.data,
            android_priority: self.android_priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_builder() {
        let payload = NotificationPayload::builder("New event: Midterm", "Course CS101")
            .data("type", "calendar_created")
            .data("courseCode", "CS101")
            .android_priority(AndroidPriority::High)
            .build();

        assert_eq!(payload.title(), "New event: Midterm");
        assert_eq!(payload.body(), "Course CS101");
        assert_eq!(payload.data().get("type").map(String::as_str), Some("calendar_created"));
        assert_eq!(payload.android_priority(), Some(AndroidPriority::High));
    }

    #[test]
    fn test_registration_handle_points_at_token_document() {
        let registration = PushRegistration::new("u1", "tok-abc");

        assert_eq!(registration.identity_id(), "u1");
        assert_eq!(registration.handle.token(), "tok-abc");
        assert_eq!(registration.handle.to_string(), "users/u1/fcmTokens/tok-abc");
    }

    #[test]
    fn test_scope_kind_and_elevation_rule() {
        assert_eq!(ScopeDescriptor::Personal("u1".into()).kind(), "personal");
        assert!(!ScopeDescriptor::Personal("u1".into()).excludes_elevated());
        assert!(ScopeDescriptor::Course("CS101".into()).excludes_elevated());
        assert!(ScopeDescriptor::FacultyWide("eng".into()).excludes_elevated());
    }

    #[test]
    fn test_scope_serialization() {
        let json = serde_json::to_value(ScopeDescriptor::Course("CS101".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "course", "value": "CS101"}));
    }
}
