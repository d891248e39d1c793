//! Outgoing mail port. Delivery is left to the adapter; the bundled
//! [`LogMailer`] only writes the message to the log.

use async_trait::async_trait;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    /// The password-reset message pointing at the frontend reset page.
    pub fn password_reset(to: &str, reset_url: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your password reset token (valid for 10 min)".to_string(),
            body: format!(
                "Forgot your password? Follow this link to choose a new one: {}\n\
                 If you didn't forget your password, please ignore this email.",
                reset_url
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), AppError>;
}

/// Logs the envelope at `info`. Bodies may hold reset links, so they only
/// appear at `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl LogMailer {
    fn envelope(email: &Email) -> String {
        format!("Mail to {}: {}", email.to, email.subject)
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), AppError> {
        log::info!("{}", Self::envelope(&email));
        log::debug!("Mail body for {}:\n{}", email.to, email.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_reset_email_carries_url() {
        let email = Email::password_reset(
            "alice@example.com",
            "http://localhost:5173/reset-password/abc",
        );
        assert_eq!(email.to, "alice@example.com");
        assert!(email.body.contains("http://localhost:5173/reset-password/abc"));
    }

    #[test]
    fn test_log_envelope_leaves_out_reset_link() {
        let email = Email::password_reset("a@example.com", "http://x/reset-password/secret-token");
        let envelope = LogMailer::envelope(&email);
        assert!(envelope.contains("a@example.com"));
        assert!(!envelope.contains("secret-token"));
    }

    #[actix_rt::test]
    async fn test_log_mailer_accepts_mail() {
        let email = Email::password_reset("a@example.com", "http://x/reset-password/1");
        assert!(LogMailer.send(email).await.is_ok());
    }
}
