use async_trait::async_trait;

use crate::error::AuthError;

/// An outbound email.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Trait that every mail backend must implement.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Short backend identifier for logs (e.g., "brevo", "log").
    fn id(&self) -> &str;

    /// Deliver one message. Failures are reported, never retried here.
    async fn send(&self, message: &MailMessage) -> Result<(), AuthError>;
}
