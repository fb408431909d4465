use chrono::{DateTime, Utc};

use super::reset_token_ttl;
use crate::account::Account;
use crate::auth::password;
use crate::crypto::{random_hex, CryptoEngine};
use crate::error::AuthError;

/// Bytes of entropy in a reset token (rendered as twice as many hex chars).
const RESET_TOKEN_BYTES: usize = 32;

/// Issue a reset token, replacing any previous one. Returns the raw token to
/// email; only its digest is kept on the account.
pub fn issue_reset_token(
    account: &mut Account,
    crypto: &CryptoEngine,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let token = random_hex(RESET_TOKEN_BYTES);
    account.reset_token_hash = Some(crypto.digest(&token)?);
    account.reset_expires_at = Some(now + reset_token_ttl());
    account.updated_at = now;
    Ok(token)
}

/// Spend a reset token: on success the new password hash is stored and the
/// token is cleared, so the same token cannot be used twice.
pub fn consume_reset_token(
    account: &mut Account,
    crypto: &CryptoEngine,
    submitted: &str,
    new_password: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    let stored = account
        .reset_token_hash
        .as_deref()
        .ok_or(AuthError::InvalidToken)?;

    if !crypto.verify(submitted.trim(), stored) {
        return Err(AuthError::InvalidToken);
    }

    match account.reset_expires_at {
        Some(expires_at) if now <= expires_at => {}
        _ => return Err(AuthError::Expired),
    }

    account.password_hash = password::hash_password(new_password)?;
    clear_reset_state(account);
    account.updated_at = now;
    Ok(())
}

pub fn clear_reset_state(account: &mut Account) {
    account.reset_token_hash = None;
    account.reset_expires_at = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::code::issue_code;
    use base64::Engine as _;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn test_engine() -> CryptoEngine {
        let pepper = base64::engine::general_purpose::STANDARD.encode([0x43u8; 32]);
        CryptoEngine::new(&pepper).unwrap()
    }

    fn account() -> Account {
        let hash = password::hash_password("anterior-123").unwrap();
        Account::new("ana@correo.mx", hash, None, t0())
    }

    #[test]
    fn test_issue_stores_digest_not_token() {
        let crypto = test_engine();
        let mut account = account();
        let token = issue_reset_token(&mut account, &crypto, t0()).unwrap();

        assert_eq!(token.len(), 64);
        let stored = account.reset_token_hash.clone().unwrap();
        assert_ne!(stored, token);
        assert!(crypto.verify(&token, &stored));
        assert_eq!(account.reset_expires_at, Some(t0() + Duration::minutes(15)));
    }

    #[test]
    fn test_consume_updates_password_and_clears_token() {
        let crypto = test_engine();
        let mut account = account();
        let old_hash = account.password_hash.clone();
        let token = issue_reset_token(&mut account, &crypto, t0()).unwrap();

        consume_reset_token(&mut account, &crypto, &token, "nueva-clave-456", t0() + Duration::minutes(10))
            .unwrap();

        assert_ne!(account.password_hash, old_hash);
        assert!(password::verify_password("nueva-clave-456", &account.password_hash));
        assert!(account.reset_token_hash.is_none());
        assert!(account.reset_expires_at.is_none());

        assert!(matches!(
            consume_reset_token(&mut account, &crypto, &token, "otra-clave-789", t0() + Duration::minutes(11)),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_consume_without_token_is_invalid() {
        let crypto = test_engine();
        let mut account = account();
        assert!(matches!(
            consume_reset_token(&mut account, &crypto, "deadbeef", "nueva-clave-456", t0()),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_consume_wrong_token_is_invalid() {
        let crypto = test_engine();
        let mut account = account();
        issue_reset_token(&mut account, &crypto, t0()).unwrap();
        let old_hash = account.password_hash.clone();

        assert!(matches!(
            consume_reset_token(&mut account, &crypto, &random_hex(32), "nueva-clave-456", t0()),
            Err(AuthError::InvalidToken)
        ));
        assert_eq!(account.password_hash, old_hash);
        assert!(account.reset_token_hash.is_some());
    }

    #[test]
    fn test_consume_after_expiry_fails() {
        let crypto = test_engine();
        let mut account = account();
        let token = issue_reset_token(&mut account, &crypto, t0()).unwrap();
        let old_hash = account.password_hash.clone();

        assert!(matches!(
            consume_reset_token(&mut account, &crypto, &token, "nueva-clave-456", t0() + Duration::minutes(16)),
            Err(AuthError::Expired)
        ));
        assert_eq!(account.password_hash, old_hash);
    }

    #[test]
    fn test_new_token_supersedes_old() {
        let crypto = test_engine();
        let mut account = account();
        let first = issue_reset_token(&mut account, &crypto, t0()).unwrap();
        let second = issue_reset_token(&mut account, &crypto, t0() + Duration::minutes(1)).unwrap();

        assert!(matches!(
            consume_reset_token(&mut account, &crypto, &first, "nueva-clave-456", t0() + Duration::minutes(2)),
            Err(AuthError::InvalidToken)
        ));
        consume_reset_token(&mut account, &crypto, &second, "nueva-clave-456", t0() + Duration::minutes(2))
            .unwrap();
    }

    #[test]
    fn test_reset_leaves_verification_state_alone() {
        let crypto = test_engine();
        let mut account = account();
        let code = issue_code(&mut account, t0());
        account.code_attempts = 1;

        let token = issue_reset_token(&mut account, &crypto, t0()).unwrap();
        consume_reset_token(&mut account, &crypto, &token, "nueva-clave-456", t0()).unwrap();

        assert_eq!(account.verification_code.as_deref(), Some(code.as_str()));
        assert_eq!(account.code_attempts, 1);
        assert!(!account.verified);
    }
}
