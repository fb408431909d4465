//! Verification code and password reset token lifecycle.
//!
//! Every operation takes the account record and the current time, mutates the
//! record in place and reports a typed outcome. Persisting the record is the
//! caller's job, including after a failed attempt that bumped a counter.
//! Expiry is evaluated here, at read time; the optional sweep in
//! `store::sweep` only tidies rows.

pub mod code;
pub mod reset;

use chrono::Duration;

/// Length of an emailed verification code.
pub const CODE_LENGTH: usize = 6;

/// Failed submissions allowed per issued code.
pub const MAX_CODE_ATTEMPTS: i32 = 3;

/// Resends allowed before the flow has to be restarted by re-registering.
pub const MAX_RESENDS: i32 = 3;

pub fn code_ttl() -> Duration {
    Duration::minutes(15)
}

pub fn resend_cooldown() -> Duration {
    Duration::minutes(2)
}

pub fn reset_token_ttl() -> Duration {
    Duration::minutes(15)
}

pub use code::{check_restart, issue_code, resend_code, restart, verify_code};
pub use reset::{consume_reset_token, issue_reset_token};
