//! Documents read and written through the store traits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `users/{uid}` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty_id: Option<String>,
    #[serde(default)]
    pub enrolled_courses: Vec<String>,
    /// Auth (login) e-mail of the account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Generated app e-mail assigned on account creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    /// University student/staff number
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub university_id: Option<String>,
}

/// Breadth declared on a calendar item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarScope {
    Personal,
    Course,
    Global,
}

/// `calendarEvents/{id}` document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarItem {
    #[serde(default)]
    pub id: String,
    /// personal | course | global; anything else is treated as global
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Event | Deadline | Reminder
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl CalendarItem {
    pub fn scope(&self) -> CalendarScope {
        match self.scope.as_deref() {
            Some("personal") => CalendarScope::Personal,
            Some("course") => CalendarScope::Course,
            _ => CalendarScope::Global,
        }
    }

    pub fn item_type(&self) -> &str {
        non_empty(&self.item_type).unwrap_or("Event")
    }

    pub fn title(&self) -> &str {
        non_empty(&self.title).unwrap_or("Untitled")
    }

    pub fn faculty_id(&self) -> &str {
        non_empty(&self.faculty_id).unwrap_or_default()
    }

    pub fn course_code(&self) -> &str {
        non_empty(&self.course_code).unwrap_or_default()
    }

    pub fn owner_id(&self) -> &str {
        non_empty(&self.owner_id).unwrap_or_default()
    }
}

/// `civilRegistry/{doc}` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CivilRecord {
    #[serde(default)]
    pub national_id: String,
    /// Real (personal) e-mail address of the person
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// UniGO account linked to this person, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_uid: Option<String>,
}

/// Rendered mail body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Document appended to the `mail` collection for the external mail sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub to: Vec<String>,
    pub message: MailContent,
    /// welcome | password_reset
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    /// Extra string fields stored alongside (nationalId, linkedUid, ...)
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl MailMessage {
    pub fn new(to: impl Into<String>, kind: impl Into<String>, message: MailContent) -> Self {
        Self {
            to: vec![to.into()],
            message,
            kind: kind.into(),
            created_at: Utc::now(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Trimmed, non-empty view of an optional string field.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_item_defaults() {
        let item: CalendarItem = serde_json::from_str(r#"{"id": "ev1"}"#).unwrap();

        assert_eq!(item.scope(), CalendarScope::Global);
        assert_eq!(item.item_type(), "Event");
        assert_eq!(item.title(), "Untitled");
        assert_eq!(item.course_code(), "");
    }

    #[test]
    fn test_calendar_item_unknown_scope_is_global() {
        let item: CalendarItem =
            serde_json::from_str(r#"{"scope": "department", "type": "Deadline"}"#).unwrap();

        assert_eq!(item.scope(), CalendarScope::Global);
        assert_eq!(item.item_type(), "Deadline");
    }

    #[test]
    fn test_calendar_item_camel_case_fields() {
        let item: CalendarItem = serde_json::from_str(
            r#"{
                "id": "ev2",
                "scope": "course",
                "courseCode": "CS101",
                "facultyId": "eng",
                "ownerId": "u1",
                "date": "2026-10-19T08:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(item.scope(), CalendarScope::Course);
        assert_eq!(item.course_code(), "CS101");
        assert_eq!(item.faculty_id(), "eng");
        assert_eq!(item.owner_id(), "u1");
        assert!(item.date.is_some());
    }

    #[test]
    fn test_user_profile_university_id_field() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id": "2021-0042", "loginEmail": "s42@unigo.app", "enrolledCourses": ["CS101"]}"#,
        )
        .unwrap();

        assert_eq!(profile.university_id.as_deref(), Some("2021-0042"));
        assert_eq!(profile.login_email.as_deref(), Some("s42@unigo.app"));
        assert_eq!(profile.enrolled_courses, vec!["CS101".to_string()]);
    }

    #[test]
    fn test_mail_message_flattens_attributes() {
        let mail = MailMessage::new(
            "person@example.com",
            "password_reset",
            MailContent {
                subject: "s".into(),
                text: "t".into(),
                html: "h".into(),
            },
        )
        .with_attribute("nationalId", "9981");

        let json = serde_json::to_value(&mail).unwrap();
        assert_eq!(json["type"], "password_reset");
        assert_eq!(json["nationalId"], "9981");
        assert_eq!(json["to"][0], "person@example.com");
    }
}
