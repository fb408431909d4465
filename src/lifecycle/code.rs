use chrono::{DateTime, Utc};
use rand::Rng;

use super::{code_ttl, resend_cooldown, CODE_LENGTH, MAX_CODE_ATTEMPTS, MAX_RESENDS};
use crate::account::{Account, Role};
use crate::crypto::constant_time_eq;
use crate::error::AuthError;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random code of `CODE_LENGTH` characters from `A-Z0-9`.
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are matched upper-cased with surrounding whitespace removed.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Install a fresh code on the account. Returns the code to email.
///
/// Resets the attempt counter; the resend counter is left alone.
pub fn issue_code(account: &mut Account, now: DateTime<Utc>) -> String {
    let code = generate_code();
    account.verification_code = Some(code.clone());
    account.code_expires_at = Some(now + code_ttl());
    account.code_attempts = 0;
    account.updated_at = now;
    code
}

/// Issue a replacement code, subject to the cooldown and the resend ceiling.
pub fn resend_code(account: &mut Account, now: DateTime<Utc>) -> Result<String, AuthError> {
    if account.verified {
        return Err(AuthError::Conflict("La cuenta ya fue verificada".into()));
    }

    if let Some(last) = account.last_resend_at {
        let elapsed = now - last;
        if elapsed < resend_cooldown() {
            let retry_after_secs = (resend_cooldown() - elapsed).num_seconds().max(1);
            return Err(AuthError::RateLimited { retry_after_secs });
        }
    }

    if account.resend_count >= MAX_RESENDS {
        return Err(AuthError::ResendExhausted);
    }

    let code = issue_code(account, now);
    account.resend_count += 1;
    account.last_resend_at = Some(now);
    Ok(code)
}

/// Whether an unverified account may be registered again at `now`.
///
/// Never within the cooldown of the last issued code. Beyond that, only once
/// the pending code is unusable: expired or cleared, attempts spent, or
/// resends spent. A live code with budget left keeps the first registration's
/// password in place.
pub fn check_restart(account: &Account, now: DateTime<Utc>) -> Result<(), AuthError> {
    if account.verified {
        return Err(AuthError::Conflict("Ya existe una cuenta con ese correo".into()));
    }

    let last_issued = account
        .code_expires_at
        .map(|expires_at| expires_at - code_ttl())
        .into_iter()
        .chain(account.last_resend_at)
        .max();
    if let Some(last) = last_issued {
        let elapsed = now - last;
        if elapsed < resend_cooldown() {
            let retry_after_secs = (resend_cooldown() - elapsed).num_seconds().max(1);
            return Err(AuthError::RateLimited { retry_after_secs });
        }
    }

    let code_live = account.verification_code.is_some()
        && account.code_expires_at.is_some_and(|expires_at| now <= expires_at);
    let budget_left =
        account.code_attempts < MAX_CODE_ATTEMPTS && account.resend_count < MAX_RESENDS;
    if code_live && budget_left {
        return Err(AuthError::Conflict(
            "Ya hay un registro pendiente para este correo. Usa el código enviado o solicita uno nuevo"
                .into(),
        ));
    }

    Ok(())
}

/// Restart verification for an unverified account: new credentials, a fresh
/// code and a full resend budget. Returns the code to email.
pub fn restart(
    account: &mut Account,
    password_hash: String,
    role: Option<Role>,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    check_restart(account, now)?;

    account.password_hash = password_hash;
    account.role = role;
    account.resend_count = 0;
    account.last_resend_at = None;
    Ok(issue_code(account, now))
}

/// Check a submitted code. On success the account becomes verified and all
/// code state is cleared; on mismatch the attempt counter is bumped.
pub fn verify_code(
    account: &mut Account,
    submitted: &str,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    if account.verified {
        return Err(AuthError::Conflict("La cuenta ya fue verificada".into()));
    }

    let expires_at = account.code_expires_at.ok_or(AuthError::Expired)?;
    if now > expires_at {
        return Err(AuthError::Expired);
    }

    if account.code_attempts >= MAX_CODE_ATTEMPTS {
        return Err(AuthError::AttemptsExhausted);
    }

    let stored = account.verification_code.as_deref().ok_or(AuthError::Expired)?;
    let submitted = normalize_code(submitted);

    if !constant_time_eq(stored.as_bytes(), submitted.as_bytes()) {
        account.code_attempts += 1;
        account.updated_at = now;
        return Err(AuthError::InvalidCode);
    }

    account.verified = true;
    account.confirmed = true;
    clear_code_state(account);
    account.updated_at = now;
    Ok(())
}

/// Null the code and expiry, zero both counters.
pub fn clear_code_state(account: &mut Account) {
    account.verification_code = None;
    account.code_expires_at = None;
    account.code_attempts = 0;
    account.resend_count = 0;
    account.last_resend_at = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn fresh_account() -> Account {
        Account::new("ana@correo.mx", "$argon2id$hash".into(), None, t0())
    }

    fn account_with_code(code: &str, issued_at: DateTime<Utc>) -> Account {
        let mut account = fresh_account();
        issue_code(&mut account, issued_at);
        account.verification_code = Some(code.to_string());
        account
    }

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_issue_code_sets_expiry_and_resets_attempts() {
        let mut account = fresh_account();
        account.code_attempts = 2;
        let code = issue_code(&mut account, t0());
        assert_eq!(account.verification_code.as_deref(), Some(code.as_str()));
        assert_eq!(account.code_expires_at, Some(t0() + Duration::minutes(15)));
        assert_eq!(account.code_attempts, 0);
    }

    #[test]
    fn test_verify_correct_code_clears_state() {
        let mut account = account_with_code("A1B2C3", t0());
        account.resend_count = 2;
        account.last_resend_at = Some(t0());

        verify_code(&mut account, "A1B2C3", t0() + Duration::minutes(5)).unwrap();

        assert!(account.verified);
        assert!(account.confirmed);
        assert!(account.verification_code.is_none());
        assert!(account.code_expires_at.is_none());
        assert_eq!(account.code_attempts, 0);
        assert_eq!(account.resend_count, 0);
        assert!(account.last_resend_at.is_none());
    }

    #[test]
    fn test_verify_accepts_lowercase_and_whitespace() {
        let mut account = account_with_code("A1B2C3", t0());
        verify_code(&mut account, "  a1b2c3 ", t0()).unwrap();
        assert!(account.verified);
    }

    #[test]
    fn test_verify_at_exact_expiry_succeeds() {
        let mut account = account_with_code("A1B2C3", t0());
        verify_code(&mut account, "A1B2C3", t0() + Duration::minutes(15)).unwrap();
        assert!(account.verified);
    }

    #[test]
    fn test_verify_after_expiry_fails_regardless_of_code() {
        let mut account = account_with_code("A1B2C3", t0());
        let later = t0() + Duration::minutes(16);

        assert!(matches!(
            verify_code(&mut account, "A1B2C3", later),
            Err(AuthError::Expired)
        ));
        assert!(matches!(
            verify_code(&mut account, "ZZZZZZ", later),
            Err(AuthError::Expired)
        ));
        assert!(!account.verified);
        assert_eq!(account.code_attempts, 0);
    }

    #[test]
    fn test_verify_without_code_is_expired() {
        let mut account = fresh_account();
        assert!(matches!(
            verify_code(&mut account, "A1B2C3", t0()),
            Err(AuthError::Expired)
        ));
    }

    #[test]
    fn test_mismatch_counts_attempts() {
        let mut account = account_with_code("A1B2C3", t0());
        assert!(matches!(
            verify_code(&mut account, "XXXXXX", t0()),
            Err(AuthError::InvalidCode)
        ));
        assert_eq!(account.code_attempts, 1);
    }

    #[test]
    fn test_fourth_attempt_exhausted_even_with_correct_code() {
        let mut account = account_with_code("A1B2C3", t0());
        for _ in 0..3 {
            assert!(matches!(
                verify_code(&mut account, "WRONG1", t0()),
                Err(AuthError::InvalidCode)
            ));
        }
        assert!(matches!(
            verify_code(&mut account, "A1B2C3", t0()),
            Err(AuthError::AttemptsExhausted)
        ));
        assert!(!account.verified);
    }

    #[test]
    fn test_fresh_code_lifts_attempt_exhaustion() {
        let mut account = account_with_code("A1B2C3", t0());
        for _ in 0..3 {
            let _ = verify_code(&mut account, "WRONG1", t0());
        }
        let code = resend_code(&mut account, t0() + Duration::minutes(1)).unwrap();
        verify_code(&mut account, &code, t0() + Duration::minutes(2)).unwrap();
        assert!(account.verified);
    }

    #[test]
    fn test_verified_account_rejects_verify() {
        let mut account = account_with_code("A1B2C3", t0());
        verify_code(&mut account, "A1B2C3", t0()).unwrap();
        assert!(matches!(
            verify_code(&mut account, "A1B2C3", t0()),
            Err(AuthError::Conflict(_))
        ));
    }

    #[test]
    fn test_resend_within_cooldown_is_rate_limited() {
        let mut account = account_with_code("A1B2C3", t0());
        resend_code(&mut account, t0()).unwrap();

        let err = resend_code(&mut account, t0() + Duration::seconds(90)).unwrap_err();
        match err {
            AuthError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 30),
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert_eq!(account.resend_count, 1);
    }

    #[test]
    fn test_resend_replaces_code_and_records_timestamp() {
        let mut account = account_with_code("A1B2C3", t0());
        account.code_attempts = 2;
        let at = t0() + Duration::minutes(3);

        let code = resend_code(&mut account, at).unwrap();

        assert_eq!(account.verification_code.as_deref(), Some(code.as_str()));
        assert_eq!(account.code_expires_at, Some(at + Duration::minutes(15)));
        assert_eq!(account.code_attempts, 0);
        assert_eq!(account.resend_count, 1);
        assert_eq!(account.last_resend_at, Some(at));
    }

    #[test]
    fn test_fourth_resend_is_exhausted() {
        let mut account = account_with_code("A1B2C3", t0());
        let mut at = t0();
        for _ in 0..3 {
            resend_code(&mut account, at).unwrap();
            at += Duration::minutes(3);
        }
        assert!(matches!(
            resend_code(&mut account, at),
            Err(AuthError::ResendExhausted)
        ));
        assert_eq!(account.resend_count, 3);
    }

    #[test]
    fn test_verified_account_rejects_resend() {
        let mut account = account_with_code("A1B2C3", t0());
        verify_code(&mut account, "A1B2C3", t0()).unwrap();
        assert!(matches!(
            resend_code(&mut account, t0() + Duration::minutes(5)),
            Err(AuthError::Conflict(_))
        ));
    }

    #[test]
    fn test_restart_resets_resend_budget_and_cooldown() {
        let mut account = account_with_code("A1B2C3", t0());
        let mut at = t0();
        for _ in 0..3 {
            resend_code(&mut account, at).unwrap();
            at += Duration::minutes(3);
        }
        assert!(matches!(resend_code(&mut account, at), Err(AuthError::ResendExhausted)));

        let code = restart(&mut account, "$argon2id$second".into(), Some(Role::Employer), at).unwrap();

        assert_eq!(account.verification_code.as_deref(), Some(code.as_str()));
        assert_eq!(account.code_expires_at, Some(at + Duration::minutes(15)));
        assert_eq!(account.resend_count, 0);
        assert!(account.last_resend_at.is_none());
        assert_eq!(account.password_hash, "$argon2id$second");
        assert_eq!(account.role, Some(Role::Employer));

        // Fresh budget: a resend right away is allowed again.
        resend_code(&mut account, at).unwrap();
    }

    #[test]
    fn test_restart_lifts_attempt_exhaustion() {
        let mut account = account_with_code("A1B2C3", t0());
        for _ in 0..3 {
            let _ = verify_code(&mut account, "WRONG1", t0());
        }
        assert!(matches!(
            verify_code(&mut account, "A1B2C3", t0()),
            Err(AuthError::AttemptsExhausted)
        ));

        let at = t0() + Duration::minutes(3);
        let code = restart(&mut account, "$argon2id$second".into(), None, at).unwrap();
        assert_eq!(account.code_attempts, 0);

        verify_code(&mut account, &code, at).unwrap();
        assert!(account.verified);
    }

    #[test]
    fn test_restart_within_cooldown_is_rate_limited() {
        let mut account = account_with_code("A1B2C3", t0());
        for _ in 0..3 {
            let _ = verify_code(&mut account, "WRONG1", t0());
        }

        let err = restart(&mut account, "$argon2id$second".into(), None, t0() + Duration::minutes(1))
            .unwrap_err();
        match err {
            AuthError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 60),
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert_eq!(account.password_hash, "$argon2id$hash");
        assert_eq!(account.verification_code.as_deref(), Some("A1B2C3"));
    }

    #[test]
    fn test_restart_within_cooldown_of_last_resend_is_rate_limited() {
        let mut account = account_with_code("A1B2C3", t0());
        for _ in 0..3 {
            let _ = verify_code(&mut account, "WRONG1", t0());
        }
        let resend_at = t0() + Duration::minutes(5);
        resend_code(&mut account, resend_at).unwrap();
        for _ in 0..3 {
            let _ = verify_code(&mut account, "WRONG1", resend_at);
        }

        assert!(matches!(
            restart(&mut account, "$argon2id$second".into(), None, resend_at + Duration::seconds(30)),
            Err(AuthError::RateLimited { .. })
        ));
    }

    #[test]
    fn test_restart_keeps_password_while_code_pending() {
        let mut account = account_with_code("A1B2C3", t0());

        assert!(matches!(
            restart(&mut account, "$argon2id$intruder".into(), None, t0() + Duration::minutes(5)),
            Err(AuthError::Conflict(_))
        ));
        assert_eq!(account.password_hash, "$argon2id$hash");

        verify_code(&mut account, "A1B2C3", t0() + Duration::minutes(6)).unwrap();
        assert_eq!(account.password_hash, "$argon2id$hash");
    }

    #[test]
    fn test_restart_after_expiry_is_allowed() {
        let mut account = account_with_code("A1B2C3", t0());
        let at = t0() + Duration::minutes(16);
        restart(&mut account, "$argon2id$second".into(), None, at).unwrap();
        assert_eq!(account.code_expires_at, Some(at + Duration::minutes(15)));
    }

    #[test]
    fn test_restart_of_verified_account_conflicts() {
        let mut account = account_with_code("A1B2C3", t0());
        verify_code(&mut account, "A1B2C3", t0()).unwrap();
        assert!(matches!(
            check_restart(&account, t0() + Duration::hours(1)),
            Err(AuthError::Conflict(_))
        ));
    }
}
