// src/mail/log.rs

use async_trait::async_trait;
use chrono::Utc;

use crate::mail::{Delivery, MailError, Mailer, OutgoingMail};

/// Writes messages to the log instead of sending them. Used in development.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, mail: OutgoingMail) -> Result<Delivery, MailError> {
        let preview: String = mail.text.chars().take(100).collect();
        tracing::info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            "Mail not sent (log transport): {}...",
            preview
        );
        Ok(Delivery {
            message_id: format!("log-{}@localhost", Utc::now().timestamp_millis()),
        })
    }
}
