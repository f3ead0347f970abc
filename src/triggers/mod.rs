//! Trigger handlers and their ingress adapters.
//!
//! Handlers are thin: each one reads the triggering document, builds a scope
//! and payload (or a mail) and hands off to the notification pipeline or the
//! mail outbox. Events reach them through the HTTP webhook, the Redis
//! subscriber, or the reminder task.

mod account;
mod calendar;
mod courses;
mod events;
pub mod http;
mod mail;
mod redis;

use std::sync::Arc;

use chrono::FixedOffset;
use serde::Serialize;
use thiserror::Error;

use crate::identity::{IdentityError, PasswordLinkProvider};
use crate::metrics::TriggerMetrics;
use crate::notification::{NotificationPipeline, NotifyError, NotifySummary, RoleClassifier};
use crate::store::{StoreError, Stores};

pub use account::PasswordResetError;
pub use calendar::tomorrow_window;
pub use events::{Announcement, DocumentEvent, GradeChange, GradeRecord};
pub use mail::{password_reset_mail, welcome_mail, PasswordResetMail};
pub use redis::RedisSubscriber;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Document lookup failed: {0}")]
    Lookup(#[from] StoreError),

    #[error("Notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("Identity provider failed: {0}")]
    Identity(#[from] IdentityError),

    #[error("Invalid trigger input: {0}")]
    Invalid(String),
}

/// What a trigger invocation did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// Nothing to do for this document
    Skipped { reason: String },
    Notified {
        #[serde(flatten)]
        summary: NotifySummary,
    },
    EmailQueued { mail_id: String },
    /// One reminder sweep
    Reminders {
        items: usize,
        notified: usize,
        skipped: usize,
        registrations: usize,
    },
}

impl TriggerOutcome {
    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        TriggerOutcome::Skipped {
            reason: reason.into(),
        }
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            TriggerOutcome::Skipped { .. } => "skipped",
            TriggerOutcome::Notified { .. } => "notified",
            TriggerOutcome::EmailQueued { .. } => "email_queued",
            TriggerOutcome::Reminders { .. } => "reminders",
        }
    }
}

/// Every trigger handler with the collaborators they share.
pub struct Triggers {
    pipeline: Arc<NotificationPipeline>,
    stores: Stores,
    classifier: RoleClassifier,
    links: Arc<dyn PasswordLinkProvider>,
    campus_offset: FixedOffset,
}

impl Triggers {
    pub fn new(
        pipeline: Arc<NotificationPipeline>,
        stores: Stores,
        links: Arc<dyn PasswordLinkProvider>,
        campus_offset: FixedOffset,
    ) -> Self {
        Self {
            pipeline,
            classifier: RoleClassifier::new(stores.directory.clone()),
            stores,
            links,
            campus_offset,
        }
    }

    pub fn pipeline(&self) -> &NotificationPipeline {
        &self.pipeline
    }

    /// Route a document event to its handler.
    pub async fn handle_event(&self, event: DocumentEvent) -> Result<TriggerOutcome, TriggerError> {
        let trigger = event.trigger_name();
        let result = match event {
            DocumentEvent::CalendarItemCreated { item } => self.calendar_item_created(&item).await,
            DocumentEvent::AnnouncementCreated {
                course_id,
                announcement_id,
                announcement,
            } => {
                self.announcement_created(&course_id, &announcement_id, &announcement)
                    .await
            }
            DocumentEvent::GradeWritten { change, grade } => self.grade_written(change, &grade).await,
            DocumentEvent::UserCreated { uid, profile } => {
                self.welcome_email_on_user_create(&uid, &profile).await
            }
        };

        record(trigger, &result);
        result
    }
}

/// Count one invocation and log its outcome.
pub(crate) fn record(trigger: &str, result: &Result<TriggerOutcome, TriggerError>) {
    match result {
        Ok(outcome) => {
            TriggerMetrics::record_invocation(trigger, outcome.label());
            if let TriggerOutcome::Skipped { reason } = outcome {
                tracing::debug!(trigger = %trigger, reason = %reason, "Trigger skipped");
            }
        }
        Err(e) => {
            TriggerMetrics::record_invocation(trigger, "error");
            tracing::error!(trigger = %trigger, error = %e, "Trigger failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(TriggerOutcome::skipped("personal scope")).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "personal scope");

        let json = serde_json::to_value(TriggerOutcome::EmailQueued {
            mail_id: "m1".into(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "email_queued");
        assert_eq!(json["mail_id"], "m1");
    }
}
