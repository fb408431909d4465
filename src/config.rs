use anyhow::{Context, Result};

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,
    pub base_url: String,
    /// Frontend page that receives `?email=..&token=..` from the reset email.
    pub reset_url: String,

    // ── Database ────────────────────────────────────────────────────────
    pub database_url: String,

    // ── Crypto ──────────────────────────────────────────────────────────
    /// HS256 secret for session tokens.
    pub session_secret: String,
    /// Session lifetime in hours.
    pub session_ttl_hours: i64,
    /// Base64-encoded key (>= 32 bytes) used to HMAC reset tokens at rest.
    pub token_pepper: String,

    // ── Mail ────────────────────────────────────────────────────────────
    /// Brevo transactional API key. Without it, mail goes to the log.
    pub brevo_api_key: Option<String>,
    pub mail_sender_email: String,
    pub mail_sender_name: String,

    // ── Maintenance ─────────────────────────────────────────────────────
    /// Interval for clearing expired codes and tokens. 0 disables the sweep.
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8420".into());

        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8420".into())
                .parse()
                .context("Invalid PORT")?,
            reset_url: std::env::var("RESET_URL")
                .unwrap_or_else(|_| format!("{base_url}/restablecer")),
            base_url,

            database_url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL is required (PostgreSQL connection string)")?,

            session_secret: std::env::var("SESSION_SECRET")
                .context("SESSION_SECRET is required")?,
            session_ttl_hours: std::env::var("SESSION_TTL_HOURS")
                .unwrap_or_else(|_| "24".into())
                .parse()
                .context("Invalid SESSION_TTL_HOURS")?,
            token_pepper: std::env::var("TOKEN_PEPPER")
                .context("TOKEN_PEPPER is required (>= 32 bytes, base64)")?,

            brevo_api_key: std::env::var("BREVO_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            mail_sender_email: std::env::var("MAIL_SENDER_EMAIL")
                .unwrap_or_else(|_| "no-responder@bolsa.local".into()),
            mail_sender_name: std::env::var("MAIL_SENDER_NAME")
                .unwrap_or_else(|_| "Bolsa de Trabajo".into()),

            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "0".into())
                .parse()
                .context("Invalid SWEEP_INTERVAL_SECS")?,
        })
    }

    /// Build the link sent in password reset emails.
    pub fn reset_link(&self, email: &str, token: &str) -> String {
        let encode = |s: &str| url::form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>();
        format!(
            "{}?email={}&token={}",
            self.reset_url,
            encode(email),
            encode(token)
        )
    }
}
