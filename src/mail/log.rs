use async_trait::async_trait;

use super::traits::{MailMessage, Mailer};
use crate::error::AuthError;

/// Development backend: writes messages to the log instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn id(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &MailMessage) -> Result<(), AuthError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Mail delivery disabled, message follows:\n{}",
            message.text
        );
        Ok(())
    }
}
