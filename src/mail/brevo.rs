use async_trait::async_trait;
use serde::Serialize;

use super::traits::{MailMessage, Mailer};
use crate::error::AuthError;

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Brevo transactional email backend.
pub struct BrevoMailer {
    api_key: String,
    sender_email: String,
    sender_name: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoSendBody<'a> {
    sender: BrevoAddress<'a>,
    to: Vec<BrevoAddress<'a>>,
    subject: &'a str,
    text_content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_content: Option<&'a str>,
}

impl BrevoMailer {
    pub fn new(api_key: String, sender_email: String, sender_name: String) -> Self {
        Self {
            api_key,
            sender_email,
            sender_name,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    fn id(&self) -> &str {
        "brevo"
    }

    async fn send(&self, message: &MailMessage) -> Result<(), AuthError> {
        let body = BrevoSendBody {
            sender: BrevoAddress {
                email: &self.sender_email,
                name: Some(self.sender_name.as_str()),
            },
            to: vec![BrevoAddress {
                email: &message.to,
                name: None,
            }],
            subject: &message.subject,
            text_content: &message.text,
            html_content: message.html.as_deref(),
        };

        let resp = self
            .http
            .post(BREVO_SEND_URL)
            .header("api-key", &self.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Mail(format!("Brevo request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!("Brevo rejected message to {}: {status} {body}", message.to);
            return Err(AuthError::Mail(format!("Brevo returned {status}")));
        }

        tracing::info!("Sent \"{}\" to {} via Brevo", message.subject, message.to);
        Ok(())
    }
}
