use crate::notification::{AndroidPriority, NotificationPayload, ScopeDescriptor};

use super::{Announcement, GradeChange, GradeRecord, TriggerError, TriggerOutcome, Triggers};

impl Triggers {
    /// Push a new course announcement to everyone enrolled.
    ///
    /// Enrollment lists hold course codes, so the course document's code is
    /// preferred; the course id is used when the course has none.
    #[tracing::instrument(
        name = "trigger.announcement_created",
        skip(self, announcement),
        fields(course_id = %course_id, announcement_id = %announcement_id)
    )]
    pub async fn announcement_created(
        &self,
        course_id: &str,
        announcement_id: &str,
        announcement: &Announcement,
    ) -> Result<TriggerOutcome, TriggerError> {
        if course_id.trim().is_empty() {
            return Err(TriggerError::Invalid("courseId is required".to_string()));
        }

        let course_key = self
            .stores
            .catalog
            .course_code(course_id)
            .await?
            .unwrap_or_else(|| course_id.to_string());

        let payload = NotificationPayload::builder(announcement.title(), announcement.body())
            .data("kind", "announcement")
            .data("courseKey", course_key.as_str())
            .data("courseId", course_id)
            .data("announcementId", announcement_id)
            .android_priority(AndroidPriority::High)
            .build();

        let summary = self
            .pipeline
            .notify(ScopeDescriptor::Course(course_key), &payload)
            .await?;
        Ok(TriggerOutcome::Notified { summary })
    }

    /// Tell a student their grade was posted or changed.
    #[tracing::instrument(
        name = "trigger.grade_written",
        skip(self, grade),
        fields(grade_id = %grade.id, change = ?change)
    )]
    pub async fn grade_written(
        &self,
        change: GradeChange,
        grade: &GradeRecord,
    ) -> Result<TriggerOutcome, TriggerError> {
        let student = grade.student_id.trim();
        if student.is_empty() {
            return Ok(TriggerOutcome::skipped("grade without student"));
        }

        let (title, kind) = match change {
            GradeChange::Created => ("New grade posted", "grade_created"),
            GradeChange::Updated => ("Grade updated", "grade_updated"),
        };
        let body = format!("{}: {}", grade.course_code, grade.assessment());

        let payload = NotificationPayload::builder(title, body)
            .data("type", kind)
            .data("gradeId", grade.id.as_str())
            .data("courseCode", grade.course_code.as_str())
            .build();

        let summary = self
            .pipeline
            .notify(ScopeDescriptor::Personal(student.to_string()), &payload)
            .await?;
        Ok(TriggerOutcome::Notified { summary })
    }
}
