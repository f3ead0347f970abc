//! Transactional mail templates.

use crate::store::{MailContent, MailMessage};

pub const WELCOME_KIND: &str = "welcome";
pub const PASSWORD_RESET_KIND: &str = "password_reset";

/// Sent to the person's real address when their account is created.
pub fn welcome_mail(to: &str, login_email: &str, link: &str) -> MailMessage {
    let text = format!(
        "Your UniGo account has been created.\n\n\
         UniGo Username (Login Email): {login_email}\n\
         Set your password here: {link}\n\n\
         After setting the password, log in using the UniGo Username above."
    );
    let html = format!(
        "<p>Your <b>UniGo</b> account has been created.</p>\
         <p><b>UniGo Username (Login Email):</b> {login_email}</p>\
         <p><a href=\"{link}\">Click here to set your password</a></p>\
         <p>After setting the password, log in using the UniGo Username above.</p>"
    );

    MailMessage::new(
        to,
        WELCOME_KIND,
        MailContent {
            subject: "Welcome to UniGo 🎓".to_string(),
            text,
            html,
        },
    )
}

pub struct PasswordResetMail<'a> {
    pub to: &'a str,
    pub auth_email: &'a str,
    pub university_id: Option<&'a str>,
    pub link: &'a str,
    pub national_id: &'a str,
    pub linked_uid: &'a str,
}

pub fn password_reset_mail(mail: PasswordResetMail<'_>) -> MailMessage {
    let PasswordResetMail {
        to,
        auth_email,
        university_id,
        link,
        national_id,
        linked_uid,
    } = mail;

    let id_line = university_id
        .map(|id| format!("University ID: {id}\n\n"))
        .unwrap_or_else(|| "\n".to_string());
    let text = format!(
        "Hello,\n\nA password reset was requested for your UniGO account.\n\n\
         UniGO Email (login): {auth_email}\n\
         {id_line}\
         Reset link:\n{link}\n\nIf you didn't request this, ignore this email."
    );

    let id_html = university_id
        .map(|id| format!("<b>University ID:</b> {id}<br/>"))
        .unwrap_or_default();
    let html = format!(
        "<p>Hello,</p>\
         <p>A password reset was requested for your UniGO account.</p>\
         <p><b>UniGO Email (login):</b> {auth_email}<br/>{id_html}</p>\
         <p><a href=\"{link}\">Click here to reset your password</a></p>\
         <p>If you didn't request this, ignore this email.</p>"
    );

    MailMessage::new(
        to,
        PASSWORD_RESET_KIND,
        MailContent {
            subject: "UniGO Password Reset".to_string(),
            text,
            html,
        },
    )
    .with_attribute("nationalId", national_id)
    .with_attribute("linkedUid", linked_uid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_mail() {
        let mail = welcome_mail("person@example.com", "s42@unigo.app", "https://link");

        assert_eq!(mail.to, vec!["person@example.com".to_string()]);
        assert_eq!(mail.kind, WELCOME_KIND);
        assert!(mail.message.text.contains("UniGo Username (Login Email): s42@unigo.app"));
        assert!(mail.message.html.contains("href=\"https://link\""));
    }

    #[test]
    fn test_password_reset_mail_with_university_id() {
        let mail = password_reset_mail(PasswordResetMail {
            to: "person@example.com",
            auth_email: "s42@unigo.app",
            university_id: Some("2021-0042"),
            link: "https://link",
            national_id: "9981",
            linked_uid: "u42",
        });

        assert_eq!(mail.message.subject, "UniGO Password Reset");
        assert!(mail.message.text.contains("University ID: 2021-0042\n\nReset link:"));
        assert_eq!(mail.attributes.get("nationalId").map(String::as_str), Some("9981"));
        assert_eq!(mail.attributes.get("linkedUid").map(String::as_str), Some("u42"));
    }

    #[test]
    fn test_password_reset_mail_without_university_id() {
        let mail = password_reset_mail(PasswordResetMail {
            to: "person@example.com",
            auth_email: "s42@unigo.app",
            university_id: None,
            link: "https://link",
            national_id: "9981",
            linked_uid: "u42",
        });

        assert!(mail.message.text.contains("s42@unigo.app\n\nReset link:"));
        assert!(!mail.message.html.contains("University ID"));
    }
}
