use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

use crate::notification::{NotificationPayload, ScopeDescriptor};
use crate::store::{CalendarItem, CalendarScope};

use super::{record, TriggerError, TriggerOutcome, Triggers};

/// `[tomorrow 00:00, day after 00:00)` on the campus clock, in UTC.
pub fn tomorrow_window(now: DateTime<Utc>, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = now
        .with_timezone(&offset)
        .date_naive()
        .and_time(NaiveTime::MIN);
    let today_start = Utc.from_utc_datetime(
        &(local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()))),
    );

    let start = today_start + Duration::days(1);
    (start, start + Duration::days(1))
}

/// Raw scope string as stored, for the payload metadata
fn scope_label(item: &CalendarItem) -> &str {
    item.scope
        .as_deref()
        .filter(|scope| !scope.is_empty())
        .unwrap_or("global")
}

impl Triggers {
    /// Immediate push for a newly created, non-personal Event or Deadline.
    /// Personal items are only announced by the reminder sweep.
    #[tracing::instrument(name = "trigger.calendar_item_created", skip(self, item), fields(event_id = %item.id))]
    pub async fn calendar_item_created(
        &self,
        item: &CalendarItem,
    ) -> Result<TriggerOutcome, TriggerError> {
        let scope = item.scope();
        if scope == CalendarScope::Personal {
            return Ok(TriggerOutcome::skipped("personal items are reminded, not announced"));
        }

        let item_type = item.item_type();
        if item_type != "Event" && item_type != "Deadline" {
            return Ok(TriggerOutcome::skipped(format!(
                "item type {} is not announced",
                item_type
            )));
        }

        let descriptor = match scope {
            CalendarScope::Course if item.course_code().is_empty() => {
                return Ok(TriggerOutcome::skipped("course item without course code"));
            }
            CalendarScope::Course => ScopeDescriptor::Course(item.course_code().to_string()),
            _ if item.faculty_id().is_empty() => {
                return Ok(TriggerOutcome::skipped("global item without faculty id"));
            }
            _ => ScopeDescriptor::FacultyWide(item.faculty_id().to_string()),
        };

        let title = if item_type == "Deadline" {
            format!("New deadline: {}", item.title())
        } else {
            format!("New event: {}", item.title())
        };
        let body = if scope == CalendarScope::Course {
            format!("Course {}", item.course_code())
        } else {
            "Faculty-wide".to_string()
        };

        let payload = NotificationPayload::builder(title, body)
            .data("type", "calendar_created")
            .data("itemType", item_type)
            .data("scope", scope_label(item))
            .data("eventId", item.id.as_str())
            .data("courseCode", item.course_code())
            .data("facultyId", item.faculty_id())
            .build();

        let summary = self.pipeline.notify(descriptor, &payload).await?;
        Ok(TriggerOutcome::Notified { summary })
    }

    /// Remind the audience of every calendar item dated tomorrow.
    pub async fn send_tomorrow_reminders(&self) -> Result<TriggerOutcome, TriggerError> {
        let result = self.tomorrow_reminders_at(Utc::now()).await;
        record("calendar_tomorrow", &result);
        result
    }

    #[tracing::instrument(name = "trigger.calendar_tomorrow", skip(self))]
    pub async fn tomorrow_reminders_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<TriggerOutcome, TriggerError> {
        let (start, end) = tomorrow_window(now, self.campus_offset);
        let items = self.stores.catalog.calendar_items_between(start, end).await?;

        let mut notified = 0;
        let mut skipped = 0;
        let mut registrations = 0;

        for item in &items {
            let Some(descriptor) = reminder_scope(item) else {
                tracing::debug!(event_id = %item.id, scope = %scope_label(item), "Reminder skipped, item has no audience key");
                skipped += 1;
                continue;
            };

            let payload = reminder_payload(item);
            let summary = self.pipeline.notify(descriptor, &payload).await?;
            registrations += summary.registrations;
            notified += 1;
        }

        tracing::info!(
            window_start = %start,
            items = items.len(),
            notified = notified,
            skipped = skipped,
            "Reminder sweep finished"
        );

        Ok(TriggerOutcome::Reminders {
            items: items.len(),
            notified,
            skipped,
            registrations,
        })
    }
}

fn reminder_scope(item: &CalendarItem) -> Option<ScopeDescriptor> {
    let (key, wrap): (&str, fn(String) -> ScopeDescriptor) = match item.scope() {
        CalendarScope::Personal => (item.owner_id(), ScopeDescriptor::Personal),
        CalendarScope::Course => (item.course_code(), ScopeDescriptor::Course),
        CalendarScope::Global => (item.faculty_id(), ScopeDescriptor::FacultyWide),
    };

    (!key.is_empty()).then(|| wrap(key.to_string()))
}

fn reminder_payload(item: &CalendarItem) -> NotificationPayload {
    let body = match item.scope() {
        CalendarScope::Personal => "Personal reminder".to_string(),
        CalendarScope::Course => format!("{} • Course {}", item.item_type(), item.course_code()),
        CalendarScope::Global => format!("{} • Faculty-wide", item.item_type()),
    };

    NotificationPayload::builder(format!("Tomorrow: {}", item.title()), body)
        .data("type", "calendar_tomorrow")
        .data("itemType", item.item_type())
        .data("scope", scope_label(item))
        .data("eventId", item.id.as_str())
        .data("courseCode", item.course_code())
        .data("facultyId", item.faculty_id())
        .data("ownerId", item.owner_id())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(scope: Option<&str>) -> CalendarItem {
        CalendarItem {
            id: "ev1".into(),
            scope: scope.map(String::from),
            item_type: Some("Deadline".into()),
            title: Some("Project".into()),
            faculty_id: Some("eng".into()),
            course_code: Some("CS101".into()),
            owner_id: Some("u1".into()),
            date: None,
        }
    }

    #[test]
    fn test_tomorrow_window_in_campus_time() {
        let amman = FixedOffset::east_opt(3 * 3600).unwrap();

        // 22:30 UTC on the 18th is already 01:30 on the 19th in Amman
        let now: DateTime<Utc> = "2026-10-18T22:30:00Z".parse().unwrap();
        let (start, end) = tomorrow_window(now, amman);
        assert_eq!(start, "2026-10-19T21:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(end, "2026-10-20T21:00:00Z".parse::<DateTime<Utc>>().unwrap());

        let now: DateTime<Utc> = "2026-10-18T10:00:00Z".parse().unwrap();
        let (start, _) = tomorrow_window(now, amman);
        assert_eq!(start, "2026-10-18T21:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_tomorrow_window_utc() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let now: DateTime<Utc> = "2026-12-31T23:59:59Z".parse().unwrap();
        let (start, end) = tomorrow_window(now, utc);
        assert_eq!(start, "2027-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(end - start, Duration::days(1));
    }

    #[test]
    fn test_reminder_scope_per_item_scope() {
        assert_eq!(
            reminder_scope(&item(Some("personal"))),
            Some(ScopeDescriptor::Personal("u1".into()))
        );
        assert_eq!(
            reminder_scope(&item(Some("course"))),
            Some(ScopeDescriptor::Course("CS101".into()))
        );
        assert_eq!(
            reminder_scope(&item(None)),
            Some(ScopeDescriptor::FacultyWide("eng".into()))
        );

        let mut orphan = item(Some("personal"));
        orphan.owner_id = Some("  ".into());
        assert_eq!(reminder_scope(&orphan), None);
    }

    #[test]
    fn test_reminder_payload_text() {
        let payload = reminder_payload(&item(Some("course")));
        assert_eq!(payload.title(), "Tomorrow: Project");
        assert_eq!(payload.body(), "Deadline • Course CS101");
        assert_eq!(payload.data()["type"], "calendar_tomorrow");
        assert_eq!(payload.data()["ownerId"], "u1");

        assert_eq!(reminder_payload(&item(Some("personal"))).body(), "Personal reminder");
        assert_eq!(reminder_payload(&item(Some("global"))).body(), "Deadline • Faculty-wide");
    }

    #[test]
    fn test_scope_label_defaults_blank_to_global() {
        assert_eq!(scope_label(&item(Some("course"))), "course");
        assert_eq!(scope_label(&item(Some(""))), "global");
        assert_eq!(scope_label(&item(None)), "global");

        let payload = reminder_payload(&item(Some("")));
        assert_eq!(payload.data().get("scope").map(String::as_str), Some("global"));
    }
}
