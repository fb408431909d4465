mod brevo;
mod log;
pub mod templates;
mod traits;

pub use brevo::BrevoMailer;
pub use log::LogMailer;
pub use traits::{MailMessage, Mailer};

use crate::config::Config;

/// Pick the mail backend for this process: Brevo when an API key is
/// configured, the log otherwise.
pub fn from_config(config: &Config) -> Box<dyn Mailer> {
    match &config.brevo_api_key {
        Some(key) => Box::new(BrevoMailer::new(
            key.clone(),
            config.mail_sender_email.clone(),
            config.mail_sender_name.clone(),
        )),
        None => Box::new(LogMailer),
    }
}
