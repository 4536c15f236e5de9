// src/services/notifier.rs

//! Post-finalize notifications.
//!
//! Both sends run on their own spawned task. The caller gets the handles
//! back but is free to drop them; outcomes are logged here either way.

use std::sync::Arc;

use tokio::task::JoinHandle;
use url::Url;

use crate::{
    config::MailConfig,
    mail::{
        Delivery, MailError, Mailer,
        template::{StudentNotice, WelcomeNotice, owner_mail, welcome_mail},
    },
};

/// Result of one background send.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    Sent(Delivery),
    Failed(MailError),
    /// Nothing to send, e.g. no operator address configured.
    Skipped,
}

/// Handles of the two background sends.
pub struct Dispatch {
    pub welcome: JoinHandle<DeliveryOutcome>,
    pub owner: JoinHandle<DeliveryOutcome>,
}

#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    from: String,
    owner_email: Option<String>,
    results_site: Option<Url>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, config: &MailConfig) -> Self {
        Self {
            mailer,
            from: format!("{} <{}>", config.from_name, config.from_email),
            owner_email: config.owner_email.clone(),
            results_site: config.results_site.clone(),
        }
    }

    /// Sends the results mail to the user. Errors are returned, not logged;
    /// [`Notifier::dispatch`] does the logging.
    pub async fn send_welcome(&self, notice: &WelcomeNotice) -> Result<Delivery, MailError> {
        if !notice.to.contains('@') {
            return Err(MailError::invalid_recipient(&notice.to));
        }
        let mail = welcome_mail(&self.from, notice, self.results_site.as_ref());
        self.mailer.send(mail).await
    }

    /// Tells the operator about a new attempt. Never fails: problems are
    /// logged and reported as `None`.
    pub async fn send_owner_notification(&self, student: &StudentNotice) -> Option<Delivery> {
        match self.owner_outcome(student).await {
            DeliveryOutcome::Sent(delivery) => Some(delivery),
            DeliveryOutcome::Failed(_) | DeliveryOutcome::Skipped => None,
        }
    }

    async fn owner_outcome(&self, student: &StudentNotice) -> DeliveryOutcome {
        let Some(owner) = &self.owner_email else {
            tracing::debug!("No owner email configured, skipping notification");
            return DeliveryOutcome::Skipped;
        };

        match self.mailer.send(owner_mail(&self.from, owner, student)).await {
            Ok(delivery) => {
                tracing::info!("Owner notification sent, messageId {}", delivery.message_id);
                DeliveryOutcome::Sent(delivery)
            }
            Err(e) => {
                tracing::warn!(
                    code = e.code,
                    response_code = ?e.response_code,
                    "Failed to send owner notification: {}",
                    e.message
                );
                DeliveryOutcome::Failed(e)
            }
        }
    }

    /// Starts both sends and returns immediately.
    pub fn dispatch(&self, welcome: WelcomeNotice, student: StudentNotice) -> Dispatch {
        let notifier = self.clone();
        let welcome = tokio::spawn(async move {
            match notifier.send_welcome(&welcome).await {
                Ok(delivery) => {
                    tracing::info!(
                        to = %welcome.to,
                        quiz_id = %welcome.quiz_id,
                        "Welcome email sent, messageId {}",
                        delivery.message_id
                    );
                    DeliveryOutcome::Sent(delivery)
                }
                Err(e) => {
                    tracing::error!(
                        to = %welcome.to,
                        quiz_id = %welcome.quiz_id,
                        transport = notifier.mailer.name(),
                        code = e.code,
                        response_code = ?e.response_code,
                        "Failed to send welcome email: {}",
                        e.message
                    );
                    DeliveryOutcome::Failed(e)
                }
            }
        });

        let notifier = self.clone();
        let owner = tokio::spawn(async move { notifier.owner_outcome(&student).await });

        Dispatch { welcome, owner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mail::OutgoingMail, models::result::ScoreSummary};
    use indexmap::IndexMap;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    /// Records every message and fails for addresses on the blocklist.
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OutgoingMail>>,
        reject: Vec<String>,
    }

    #[async_trait]
    impl Mailer for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn send(&self, mail: OutgoingMail) -> Result<Delivery, MailError> {
            let rejected = self.reject.contains(&mail.to);
            self.sent.lock().await.push(mail);
            if rejected {
                return Err(MailError::new("EENVELOPE", Some(550), "mailbox unavailable"));
            }
            Ok(Delivery {
                message_id: "m-1".to_string(),
            })
        }
    }

    fn config(owner: Option<&str>) -> MailConfig {
        MailConfig {
            api_url: None,
            api_key: None,
            from_email: "quiz@x.com".to_string(),
            from_name: "Quiz".to_string(),
            owner_email: owner.map(str::to_string),
            results_site: None,
        }
    }

    fn notices(to: &str) -> (WelcomeNotice, StudentNotice) {
        let summary = ScoreSummary {
            categories: IndexMap::new(),
            top_category: "General".to_string(),
            method_used: "default".to_string(),
            total: 0.0,
        };
        (
            WelcomeNotice {
                to: to.to_string(),
                name: "Ann".to_string(),
                quiz_id: "Q1".to_string(),
                summary,
                result_token: Some("tok".to_string()),
            },
            StudentNotice {
                email: to.to_string(),
                name: "Ann".to_string(),
                quiz_id: "Q1".to_string(),
                score: 0.0,
                top_category: "General".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_dispatch_sends_both() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone(), &config(Some("owner@x.com")));
        let (welcome, student) = notices("ann@x.com");

        let dispatch = notifier.dispatch(welcome, student);
        assert!(matches!(dispatch.welcome.await.unwrap(), DeliveryOutcome::Sent(_)));
        assert!(matches!(dispatch.owner.await.unwrap(), DeliveryOutcome::Sent(_)));

        let sent = recorder.sent.lock().await;
        let recipients: Vec<&str> = sent.iter().map(|m| m.to.as_str()).collect();
        assert_eq!(sent.len(), 2);
        assert!(recipients.contains(&"ann@x.com"));
        assert!(recipients.contains(&"owner@x.com"));
    }

    #[tokio::test]
    async fn test_welcome_failure_is_reported_not_raised() {
        let recorder = Arc::new(Recorder {
            reject: vec!["bounce@x.com".to_string()],
            ..Default::default()
        });
        let notifier = Notifier::new(recorder.clone(), &config(None));
        let (welcome, student) = notices("bounce@x.com");

        let dispatch = notifier.dispatch(welcome, student);
        match dispatch.welcome.await.unwrap() {
            DeliveryOutcome::Failed(e) => assert_eq!(e.response_code, Some(550)),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(matches!(dispatch.owner.await.unwrap(), DeliveryOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_recipient_without_at_never_reaches_transport() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone(), &config(None));
        let (welcome, _) = notices("nobody");

        let err = notifier.send_welcome(&welcome).await.unwrap_err();
        assert_eq!(err.code, "EENVELOPE");
        assert!(recorder.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_owner_failure_is_swallowed() {
        let recorder = Arc::new(Recorder {
            reject: vec!["owner@x.com".to_string()],
            ..Default::default()
        });
        let notifier = Notifier::new(recorder, &config(Some("owner@x.com")));
        let (_, student) = notices("ann@x.com");
        assert!(notifier.send_owner_notification(&student).await.is_none());
    }
}
