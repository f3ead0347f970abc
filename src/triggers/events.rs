//! Document-change events delivered over HTTP and Redis Pub/Sub.

use serde::{Deserialize, Serialize};

use crate::store::{CalendarItem, UserProfile};

/// One change in the document database that may warrant a notification.
///
/// ```json
/// {"type": "announcement_created", "courseId": "c1", "announcementId": "a9",
///  "announcement": {"title": "Room change"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum DocumentEvent {
    /// `calendarEvents/{id}` created
    CalendarItemCreated { item: CalendarItem },
    /// `courses/{courseId}/announcements/{announcementId}` created
    AnnouncementCreated {
        course_id: String,
        announcement_id: String,
        #[serde(default)]
        announcement: Announcement,
    },
    /// `grades/{id}` created or updated
    GradeWritten {
        #[serde(default)]
        change: GradeChange,
        grade: GradeRecord,
    },
    /// `users/{uid}` created
    UserCreated {
        uid: String,
        #[serde(default)]
        profile: UserProfile,
    },
}

impl DocumentEvent {
    /// Trigger label for logs and metrics
    pub fn trigger_name(&self) -> &'static str {
        match self {
            DocumentEvent::CalendarItemCreated { .. } => "calendar_created",
            DocumentEvent::AnnouncementCreated { .. } => "announcement_created",
            DocumentEvent::GradeWritten { .. } => "grade_written",
            DocumentEvent::UserCreated { .. } => "welcome_email",
        }
    }
}

/// Announcement document. Older clients wrote the text under `message` or
/// `text` instead of `body`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Announcement {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("New announcement")
    }

    pub fn body(&self) -> &str {
        self.body
            .as_deref()
            .or(self.message.as_deref())
            .or(self.text.as_deref())
            .unwrap_or("Open UniGO to view.")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeChange {
    #[default]
    Created,
    Updated,
}

/// `grades/{id}` document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl GradeRecord {
    pub fn assessment(&self) -> &str {
        self.assessment
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or("Assessment")
    }
}
