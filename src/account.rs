//! Account record shared by the store, the lifecycle operations and the handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Role chosen by the account holder. Nullable until chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employer,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employer => "employer",
            Role::Employee => "employee",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AuthError> {
        match s {
            "employer" => Ok(Role::Employer),
            "employee" => Ok(Role::Employee),
            other => Err(AuthError::Validation(format!("rol desconocido '{other}'"))),
        }
    }
}

/// A row of the `accounts` table, verification and reset columns included.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub verified: bool,
    pub role: Option<Role>,

    // Verification code state
    pub verification_code: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub code_attempts: i32,
    pub resend_count: i32,
    pub last_resend_at: Option<DateTime<Utc>>,

    // Password reset state
    pub reset_token_hash: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A fresh, unverified account that has not been persisted yet.
    pub fn new(email: &str, password_hash: String, role: Option<Role>, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            email: email.to_string(),
            password_hash,
            confirmed: false,
            verified: false,
            role,
            verification_code: None,
            code_expires_at: None,
            code_attempts: 0,
            resend_count: 0,
            last_resend_at: None,
            reset_token_hash: None,
            reset_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id.clone(),
            email: self.email.clone(),
            verified: self.verified,
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// What the API exposes about an account.
#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub email: String,
    pub verified: bool,
    pub role: Option<Role>,
    pub created_at: DateTime<Utc>,
}

/// Lower-case and trim an email address for lookups and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check only (`local@domain.tld`); deliverability is proven by the code.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let invalid = || AuthError::Validation(format!("correo electrónico inválido '{email}'"));

    let email = email.trim();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() && !host.ends_with('.') => Ok(()),
        _ => Err(invalid()),
    }
}
