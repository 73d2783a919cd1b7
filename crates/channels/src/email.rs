//! Transactional email delivery.
//!
//! The `log` transport records messages and writes them to the trace log;
//! the `sendgrid` transport POSTs to the SendGrid v3 mail-send API. Delivery
//! failures are logged and counted, never returned to the caller: an email
//! that cannot be sent must not fail the request that triggered it.

use crate::templates::{EmailTemplate, RenderedEmail};
use chrono::{DateTime, Utc};
use compliance_core::config::{EmailConfig, EmailProvider};
use compliance_core::{ComplianceError, ComplianceResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    Skipped,
}

/// A message handed to the email service, with its delivery outcome.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingEmail {
    pub id: Uuid,
    pub to: String,
    pub template: EmailTemplate,
    pub subject: String,
    pub html: String,
    pub status: DeliveryStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

enum Transport {
    Log,
    SendGrid { client: reqwest::Client },
}

pub struct EmailService {
    config: EmailConfig,
    transport: Transport,
    /// Most recent messages, oldest first.
    outbox: Mutex<VecDeque<OutgoingEmail>>,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        let transport = match config.provider {
            EmailProvider::Log => Transport::Log,
            EmailProvider::Sendgrid if config.api_key.is_empty() => {
                warn!("SendGrid selected without an API key, falling back to log transport");
                Transport::Log
            }
            EmailProvider::Sendgrid => Transport::SendGrid {
                client: reqwest::Client::new(),
            },
        };
        info!(
            from = %config.from_email,
            provider = ?config.provider,
            enabled = config.enabled,
            "Email service initialized"
        );
        Self {
            config,
            transport,
            outbox: Mutex::new(VecDeque::new()),
        }
    }

    pub fn app_url(&self) -> &str {
        self.config.app_url.trim_end_matches('/')
    }

    /// Absolute link into the web application.
    pub fn link(&self, path: &str) -> String {
        format!("{}/{}", self.app_url(), path.trim_start_matches('/'))
    }

    /// Render and send a template. Always returns the recorded message.
    pub async fn send_template(
        &self,
        to: &str,
        template: EmailTemplate,
        variables: HashMap<String, String>,
    ) -> OutgoingEmail {
        let rendered = template.render(&variables);
        self.send(to, rendered).await
    }

    pub async fn send(&self, to: &str, rendered: RenderedEmail) -> OutgoingEmail {
        let mut message = OutgoingEmail {
            id: Uuid::new_v4(),
            to: to.to_string(),
            template: rendered.template,
            subject: rendered.subject.clone(),
            html: rendered.html.clone(),
            status: DeliveryStatus::Skipped,
            provider_message_id: None,
            error: None,
            created_at: Utc::now(),
        };

        if !self.config.enabled {
            debug!(to = %to, template = %rendered.template, "Email disabled, skipping");
        } else if to.trim().is_empty() || !to.contains('@') {
            warn!(to = %to, template = %rendered.template, "Invalid recipient, skipping email");
            message.error = Some("invalid recipient".to_string());
        } else {
            match self.deliver(to, &rendered).await {
                Ok(provider_id) => {
                    message.status = DeliveryStatus::Sent;
                    message.provider_message_id = provider_id;
                    metrics::counter!("email.sent", "template" => rendered.template.name())
                        .increment(1);
                }
                Err(e) => {
                    warn!(error = %e, to = %to, template = %rendered.template, "Email delivery failed");
                    message.status = DeliveryStatus::Failed;
                    message.error = Some(e.to_string());
                    metrics::counter!("email.failed", "template" => rendered.template.name())
                        .increment(1);
                }
            }
        }

        self.record(message.clone());
        message
    }

    async fn deliver(&self, to: &str, rendered: &RenderedEmail) -> ComplianceResult<Option<String>> {
        match &self.transport {
            Transport::Log => {
                info!(
                    to = %to,
                    subject = %rendered.subject,
                    template = %rendered.template,
                    "Email sent (log transport)"
                );
                Ok(None)
            }
            Transport::SendGrid { client } => {
                let response = client
                    .post(&self.config.api_url)
                    .bearer_auth(&self.config.api_key)
                    .json(&self.sendgrid_payload(to, rendered))
                    .send()
                    .await
                    .map_err(|e| ComplianceError::Email(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ComplianceError::Email(format!("SendGrid returned {status}: {body}")));
                }
                Ok(response
                    .headers()
                    .get("x-message-id")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string))
            }
        }
    }

    /// SendGrid v3 `mail/send` request body.
    pub fn sendgrid_payload(&self, to: &str, rendered: &RenderedEmail) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [{
                "to": [{ "email": to }],
                "custom_args": { "template": rendered.template.name() }
            }],
            "from": {
                "email": self.config.from_email,
                "name": self.config.from_name
            },
            "subject": rendered.subject,
            "content": [{
                "type": "text/html",
                "value": rendered.html
            }]
        })
    }

    fn record(&self, message: OutgoingEmail) {
        let mut outbox = self.outbox.lock();
        outbox.push_back(message);
        while outbox.len() > self.config.outbox_capacity.max(1) {
            outbox.pop_front();
        }
    }

    /// Recently handled messages, oldest first.
    pub fn outbox(&self) -> Vec<OutgoingEmail> {
        self.outbox.lock().iter().cloned().collect()
    }

    pub fn sent_to(&self, to: &str) -> Vec<OutgoingEmail> {
        self.outbox
            .lock()
            .iter()
            .filter(|m| m.to.eq_ignore_ascii_case(to))
            .cloned()
            .collect()
    }
}

impl Default for EmailService {
    fn default() -> Self {
        Self::new(EmailConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::template_vars;

    #[tokio::test]
    async fn test_log_transport_records_sent_message() {
        let service = EmailService::default();
        let message = service
            .send_template(
                "officer@bank.example",
                EmailTemplate::ScheduleOverdue,
                template_vars([("name", "Otieno"), ("title", "Board report")]),
            )
            .await;

        assert_eq!(message.status, DeliveryStatus::Sent);
        assert_eq!(service.sent_to("OFFICER@bank.example").len(), 1);
        assert!(service.outbox()[0].subject.contains("Board report"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_and_disabled_are_skipped() {
        let service = EmailService::default();
        let message = service
            .send_template("", EmailTemplate::Welcome, HashMap::new())
            .await;
        assert_eq!(message.status, DeliveryStatus::Skipped);

        let disabled = EmailService::new(EmailConfig {
            enabled: false,
            ..EmailConfig::default()
        });
        let message = disabled
            .send_template("a@b.example", EmailTemplate::Welcome, HashMap::new())
            .await;
        assert_eq!(message.status, DeliveryStatus::Skipped);
    }

    #[tokio::test]
    async fn test_outbox_is_bounded() {
        let service = EmailService::new(EmailConfig {
            outbox_capacity: 2,
            ..EmailConfig::default()
        });
        for i in 0..3 {
            service
                .send_template(&format!("u{i}@bank.example"), EmailTemplate::Welcome, HashMap::new())
                .await;
        }
        let outbox = service.outbox();
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[0].to, "u1@bank.example");
    }

    #[test]
    fn test_sendgrid_payload_shape() {
        let service = EmailService::default();
        let rendered = EmailTemplate::PasswordReset.render(&HashMap::new());
        let payload = service.sendgrid_payload("x@bank.example", &rendered);
        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "x@bank.example");
        assert_eq!(payload["from"]["name"], "ComplianceHub");
        assert_eq!(payload["content"][0]["type"], "text/html");
        assert_eq!(service.link("/reset?token=1"), "http://localhost:3000/reset?token=1");
    }
}
