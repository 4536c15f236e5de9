// src/mail/mod.rs

//! Outgoing mail.
//!
//! A [`Mailer`] only moves a finished message. Composition lives in
//! [`template`], logging policy in the notifier service.

pub mod log;
pub mod relay;
pub mod template;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::MailConfig;

/// A plain-text message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    /// `Display Name <address>`.
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Transport acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: String,
}

/// Transport failure with enough detail to tell an auth problem from a
/// rejected recipient without reading transport logs.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} (code {code}, response code {response_code:?})")]
pub struct MailError {
    /// Short machine code, e.g. `EAUTH`, `ECONNECTION`, `EENVELOPE`.
    pub code: &'static str,
    /// Status returned by the provider, when one answered.
    pub response_code: Option<u16>,
    pub message: String,
}

impl MailError {
    pub fn new(code: &'static str, response_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            code,
            response_code,
            message: message.into(),
        }
    }

    pub fn invalid_recipient(to: &str) -> Self {
        Self::new("EENVELOPE", None, format!("Invalid email address: {}", to))
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, mail: OutgoingMail) -> Result<Delivery, MailError>;
}

/// Picks the relay when one is configured, otherwise the logging transport.
pub fn mailer_from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match &config.api_url {
        Some(url) => {
            tracing::info!("Mail relay configured at {}", url);
            Arc::new(relay::RelayMailer::new(url.clone(), config.api_key.clone()))
        }
        None => {
            tracing::warn!("MAIL_API_URL not set, emails will only be logged");
            Arc::new(log::LogMailer)
        }
    }
}
