// src/mail/relay.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::mail::{Delivery, MailError, Mailer, OutgoingMail};

/// Sends mail through a transactional mail API that accepts a JSON POST.
pub struct RelayMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl RelayMailer {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client for mail relay: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            endpoint,
            api_key,
        }
    }
}

/// Maps a non-success provider status to a mail error code.
fn status_error(status: StatusCode, body: &str) -> MailError {
    let code = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "EAUTH",
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => "EENVELOPE",
        _ => "EMESSAGE",
    };
    MailError::new(
        code,
        Some(status.as_u16()),
        format!("Mail relay rejected the message: {}", body.trim()),
    )
}

/// Providers disagree on the field name for the id they assign.
fn message_id(body: &Value) -> Option<String> {
    ["messageId", "message_id", "id"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl Mailer for RelayMailer {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn send(&self, mail: OutgoingMail) -> Result<Delivery, MailError> {
        let mut request = self.client.post(&self.endpoint).json(&RelayRequest {
            from: &mail.from,
            to: &mail.to,
            subject: &mail.subject,
            text: &mail.text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            let code = if e.is_timeout() { "ETIMEDOUT" } else { "ECONNECTION" };
            MailError::new(code, None, format!("Mail relay unreachable: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: Value = response.json().await.map_err(|e| {
            MailError::new("EMESSAGE", Some(status.as_u16()), format!("Unreadable relay reply: {}", e))
        })?;

        message_id(&body)
            .map(|message_id| Delivery { message_id })
            .ok_or_else(|| {
                MailError::new(
                    "ENOMESSAGEID",
                    Some(status.as_u16()),
                    "Mail accepted but no message id returned",
                )
            })
    }
}
