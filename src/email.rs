//! Outbound email. The transport is injected as a trait object so tests and
//! development run without an SMTP relay; the default sender just logs.
//!
//! Delivery failures are always logged. They only propagate to the caller in
//! production, where a silently dropped verification email would strand the
//! user.

use crate::utils::build_verify_url;
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};

/// One outbound message, already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait EmailSender: Send + Sync {
    /// # Errors
    /// Returns an error if the message cannot be handed to the transport.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Default transport: writes the message to the log and calls it delivered.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            "Email to {}: {} | {}",
            message.to, message.subject, message.body
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct Mailer {
    sender: Arc<dyn EmailSender>,
    production: bool,
    frontend_url: String,
}

impl Mailer {
    #[must_use]
    pub fn new(sender: Arc<dyn EmailSender>, production: bool, frontend_url: &str) -> Self {
        Self {
            sender,
            production,
            frontend_url: frontend_url.to_string(),
        }
    }

    /// # Errors
    /// Returns an error only in production when delivery fails.
    pub fn send_verification_email(&self, to: &str, token: &str) -> Result<()> {
        let url = build_verify_url(&self.frontend_url, token);
        self.dispatch(EmailMessage {
            to: to.to_string(),
            subject: "Verify your email".to_string(),
            body: format!("Confirm your address by visiting {url}"),
        })
    }

    /// # Errors
    /// Returns an error only in production when delivery fails.
    pub fn send_otp_email(&self, to: &str, code: &str) -> Result<()> {
        self.dispatch(EmailMessage {
            to: to.to_string(),
            subject: "Your login code".to_string(),
            body: format!("Your one-time login code is {code}. It expires shortly."),
        })
    }

    /// # Errors
    /// Returns an error only in production when delivery fails.
    pub fn send_new_device_alert(
        &self,
        to: &str,
        device_info: &str,
        ip_address: &str,
    ) -> Result<()> {
        self.dispatch(EmailMessage {
            to: to.to_string(),
            subject: "New sign-in to your account".to_string(),
            body: format!(
                "A new sign-in was detected from {device_info} ({ip_address}). \
                 If this was not you, revoke your sessions."
            ),
        })
    }

    fn dispatch(&self, message: EmailMessage) -> Result<()> {
        match self.sender.send(&message) {
            Ok(()) => Ok(()),
            Err(err) => {
                error!(
                    "Failed to send email to {}: {} - {err:#}",
                    message.to, message.subject
                );
                if self.production {
                    Err(err)
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    struct RecordingSender {
        sent: Mutex<Vec<EmailMessage>>,
    }

    impl EmailSender for RecordingSender {
        fn send(&self, message: &EmailMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct FailingSender;

    impl EmailSender for FailingSender {
        fn send(&self, _message: &EmailMessage) -> Result<()> {
            Err(anyhow!("relay unreachable"))
        }
    }

    #[test]
    fn verification_email_carries_the_link() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
        });
        let mailer = Mailer::new(sender.clone(), false, "http://localhost:5500");

        mailer
            .send_verification_email("user@example.com", "tok123")
            .unwrap();

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "user@example.com");
        assert!(
            sent[0]
                .body
                .contains("http://localhost:5500/verify-email?token=tok123")
        );
    }

    #[test]
    fn delivery_failure_is_swallowed_outside_production() {
        let mailer = Mailer::new(Arc::new(FailingSender), false, "http://localhost:5500");
        assert!(mailer.send_otp_email("user@example.com", "123456").is_ok());
    }

    #[test]
    fn delivery_failure_surfaces_in_production() {
        let mailer = Mailer::new(Arc::new(FailingSender), true, "https://app.example.com");
        assert!(mailer.send_otp_email("user@example.com", "123456").is_err());
    }

    #[test]
    fn new_device_alert_names_the_device() {
        let sender = Arc::new(RecordingSender {
            sent: Mutex::new(Vec::new()),
        });
        let mailer = Mailer::new(sender.clone(), false, "http://localhost:5500");

        mailer
            .send_new_device_alert("user@example.com", "Mozilla/5.0", "203.0.113.9")
            .unwrap();

        let sent = sender.sent.lock().unwrap();
        assert!(sent[0].body.contains("Mozilla/5.0"));
        assert!(sent[0].body.contains("203.0.113.9"));
    }
}
