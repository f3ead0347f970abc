use axum::http::StatusCode;
use thiserror::Error;

use crate::metrics::TriggerMetrics;
use crate::store::{non_empty, UserProfile};

use super::mail::{password_reset_mail, welcome_mail, PasswordResetMail, PASSWORD_RESET_KIND, WELCOME_KIND};
use super::{TriggerError, TriggerOutcome, Triggers};

/// Why a password reset request was refused. The messages are shown to the
/// requester as-is.
#[derive(Debug, Error)]
pub enum PasswordResetError {
    #[error("nationalId is required")]
    MissingNationalId,

    #[error("No civil record found")]
    NoCivilRecord,

    #[error("Civil record has no email field")]
    CivilRecordWithoutEmail,

    #[error("Civil record is not linked to a UniGO account yet")]
    NotLinked,

    #[error("Linked UniGO user not found")]
    LinkedUserMissing,

    #[error("UniGO user has no email field")]
    UserWithoutEmail,

    #[error("{0}")]
    Failed(#[from] TriggerError),
}

impl PasswordResetError {
    pub fn status(&self) -> StatusCode {
        match self {
            PasswordResetError::NoCivilRecord | PasswordResetError::LinkedUserMissing => {
                StatusCode::NOT_FOUND
            }
            PasswordResetError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl Triggers {
    /// Mail a set-password link to the real address of a newly created
    /// student account.
    #[tracing::instrument(name = "trigger.welcome_email", skip(self, profile))]
    pub async fn welcome_email_on_user_create(
        &self,
        uid: &str,
        profile: &UserProfile,
    ) -> Result<TriggerOutcome, TriggerError> {
        if self.classifier.is_elevated(uid).await? {
            return Ok(TriggerOutcome::skipped("elevated account"));
        }

        let (Some(national_id), Some(login_email)) =
            (non_empty(&profile.national_id), non_empty(&profile.login_email))
        else {
            return Ok(TriggerOutcome::skipped("profile without nationalId or loginEmail"));
        };

        let Some(civil) = self.stores.civil.civil_record(national_id).await? else {
            return Ok(TriggerOutcome::skipped("no civil record"));
        };
        let Some(civil_email) = non_empty(&civil.email) else {
            return Ok(TriggerOutcome::skipped("civil record without email"));
        };

        let link = match self.links.password_reset_link(login_email).await {
            Ok(link) => link,
            Err(e) => {
                tracing::error!(error = %e, "Failed to generate set-password link");
                return Ok(TriggerOutcome::skipped("set-password link unavailable"));
            }
        };

        let mail_id = self
            .stores
            .outbox
            .enqueue(welcome_mail(civil_email, login_email, &link))
            .await?;
        TriggerMetrics::record_mail_queued(WELCOME_KIND);

        tracing::info!(mail_id = %mail_id, "Welcome mail queued");
        Ok(TriggerOutcome::EmailQueued { mail_id })
    }

    /// Queue a password reset mail for the account linked to a national id.
    /// Returns the queued mail id.
    #[tracing::instrument(name = "trigger.password_reset", skip(self, national_id))]
    pub async fn request_password_reset(
        &self,
        national_id: &str,
    ) -> Result<String, PasswordResetError> {
        let national_id = national_id.trim();
        if national_id.is_empty() {
            return Err(PasswordResetError::MissingNationalId);
        }

        let civil = self
            .stores
            .civil
            .civil_record_by_national_id(national_id)
            .await
            .map_err(TriggerError::from)?
            .ok_or(PasswordResetError::NoCivilRecord)?;

        let to = non_empty(&civil.email).ok_or(PasswordResetError::CivilRecordWithoutEmail)?;
        let linked_uid = non_empty(&civil.linked_uid).ok_or(PasswordResetError::NotLinked)?;

        let user = self
            .stores
            .directory
            .profile(linked_uid)
            .await
            .map_err(TriggerError::from)?
            .ok_or(PasswordResetError::LinkedUserMissing)?;

        let auth_email = non_empty(&user.email).ok_or(PasswordResetError::UserWithoutEmail)?;

        let link = self
            .links
            .password_reset_link(auth_email)
            .await
            .map_err(TriggerError::from)?;

        let mail = password_reset_mail(PasswordResetMail {
            to,
            auth_email,
            university_id: non_empty(&user.university_id),
            link: &link,
            national_id,
            linked_uid,
        });
        let mail_id = self
            .stores
            .outbox
            .enqueue(mail)
            .await
            .map_err(TriggerError::from)?;
        TriggerMetrics::record_mail_queued(PASSWORD_RESET_KIND);

        tracing::info!(mail_id = %mail_id, linked_uid = %linked_uid, "Password reset mail queued");
        Ok(mail_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_reset_status_codes() {
        assert_eq!(PasswordResetError::MissingNationalId.status(), StatusCode::BAD_REQUEST);
        assert_eq!(PasswordResetError::NoCivilRecord.status(), StatusCode::NOT_FOUND);
        assert_eq!(PasswordResetError::CivilRecordWithoutEmail.status(), StatusCode::BAD_REQUEST);
        assert_eq!(PasswordResetError::NotLinked.status(), StatusCode::BAD_REQUEST);
        assert_eq!(PasswordResetError::LinkedUserMissing.status(), StatusCode::NOT_FOUND);
        assert_eq!(PasswordResetError::UserWithoutEmail.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PasswordResetError::Failed(TriggerError::Invalid("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_password_reset_messages() {
        assert_eq!(
            PasswordResetError::NotLinked.to_string(),
            "Civil record is not linked to a UniGO account yet"
        );
        assert_eq!(
            PasswordResetError::MissingNationalId.to_string(),
            "nationalId is required"
        );
    }
}
