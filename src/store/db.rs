//! PostgreSQL-backed account store and audit events.
//!
//! Tables:
//! - `accounts`: credentials plus nullable verification and reset columns
//! - `auth_events`: audit log for account operations

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::account::{Account, Role};
use crate::error::AuthError;

const ACCOUNT_COLUMNS: &str = r#"
    id::text, email, password_hash, confirmed, verified, role,
    verification_code, code_expires_at, code_attempts, resend_count, last_resend_at,
    reset_token_hash, reset_expires_at, created_at, updated_at
"#;

/// Account store backed by PostgreSQL.
pub struct AccountStore {
    pub pool: PgPool,
}

impl AccountStore {
    pub async fn new(db_url: &str) -> Result<Self, AuthError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(20)
            .connect(db_url)
            .await
            .map_err(|e| AuthError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool })
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                email               TEXT NOT NULL UNIQUE,
                password_hash       TEXT NOT NULL,
                confirmed           BOOLEAN NOT NULL DEFAULT false,
                verified            BOOLEAN NOT NULL DEFAULT false,
                role                TEXT,
                verification_code   TEXT,
                code_expires_at     TIMESTAMPTZ,
                code_attempts       INT NOT NULL DEFAULT 0,
                resend_count        INT NOT NULL DEFAULT 0,
                last_resend_at      TIMESTAMPTZ,
                reset_token_hash    TEXT,
                reset_expires_at    TIMESTAMPTZ,
                created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_events (
                id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                account_id  TEXT NOT NULL,
                event_type  TEXT NOT NULL,
                metadata    JSONB DEFAULT '{}',
                created_at  TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Partial indexes keep the expiry sweep cheap.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_accounts_code_expiry ON accounts(code_expires_at) WHERE code_expires_at IS NOT NULL"
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_accounts_reset_expiry ON accounts(reset_expires_at) WHERE reset_expires_at IS NOT NULL"
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_auth_events_account ON auth_events(account_id, created_at DESC)"
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up an account by (normalized) email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Account>, AuthError> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1::uuid"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    /// Insert a new account. Returns its ID.
    pub async fn insert(&self, account: &Account) -> Result<String, AuthError> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts
                (email, password_hash, confirmed, verified, role,
                 verification_code, code_expires_at, code_attempts, resend_count, last_resend_at,
                 reset_token_hash, reset_expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id::text
            "#,
        )
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.confirmed)
        .bind(account.verified)
        .bind(account.role.map(|r| r.as_str()))
        .bind(&account.verification_code)
        .bind(account.code_expires_at)
        .bind(account.code_attempts)
        .bind(account.resend_count)
        .bind(account.last_resend_at)
        .bind(&account.reset_token_hash)
        .bind(account.reset_expires_at)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(insert_error)?;

        let id: String = row.get(0);
        Ok(id)
    }

    /// Write back every mutable column. Concurrent writers: last write wins.
    pub async fn save(&self, account: &Account) -> Result<(), AuthError> {
        let affected = sqlx::query(
            r#"
            UPDATE accounts
            SET password_hash = $2,
                confirmed = $3,
                verified = $4,
                role = $5,
                verification_code = $6,
                code_expires_at = $7,
                code_attempts = $8,
                resend_count = $9,
                last_resend_at = $10,
                reset_token_hash = $11,
                reset_expires_at = $12,
                updated_at = $13
            WHERE id = $1::uuid
            "#,
        )
        .bind(&account.id)
        .bind(&account.password_hash)
        .bind(account.confirmed)
        .bind(account.verified)
        .bind(account.role.map(|r| r.as_str()))
        .bind(&account.verification_code)
        .bind(account.code_expires_at)
        .bind(account.code_attempts)
        .bind(account.resend_count)
        .bind(account.last_resend_at)
        .bind(&account.reset_token_hash)
        .bind(account.reset_expires_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(AuthError::NotFound(account.email.clone()));
        }

        Ok(())
    }

    /// Set the role only if none was chosen yet. Returns false if one was.
    pub async fn set_role_if_unset(&self, account_id: &str, role: Role) -> Result<bool, AuthError> {
        let affected = sqlx::query(
            "UPDATE accounts SET role = $2, updated_at = NOW() WHERE id = $1::uuid AND role IS NULL",
        )
        .bind(account_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected == 1)
    }

    /// Null out codes and reset tokens that expired before `now`.
    ///
    /// Counters are left as they are so ceilings keep applying until a fresh
    /// code is issued.
    pub async fn clear_expired(&self, now: DateTime<Utc>) -> Result<ExpiredCleared, AuthError> {
        let codes = sqlx::query(
            r#"
            UPDATE accounts
            SET verification_code = NULL, code_expires_at = NULL, updated_at = NOW()
            WHERE code_expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        let reset_tokens = sqlx::query(
            r#"
            UPDATE accounts
            SET reset_token_hash = NULL, reset_expires_at = NULL, updated_at = NOW()
            WHERE reset_expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(ExpiredCleared { codes, reset_tokens })
    }

    /// Log an audit event.
    pub async fn log_event(
        &self,
        account_id: &str,
        event_type: &str,
        metadata: serde_json::Value,
    ) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO auth_events (account_id, event_type, metadata)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(account_id)
        .bind(event_type)
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, AuthError> {
    let role: Option<String> = row.try_get(5)?;
    let role = role.as_deref().map(Role::parse).transpose().map_err(|_| {
        AuthError::Database(format!("unknown role {role:?} in accounts table"))
    })?;

    Ok(Account {
        id: row.try_get(0)?,
        email: row.try_get(1)?,
        password_hash: row.try_get(2)?,
        confirmed: row.try_get(3)?,
        verified: row.try_get(4)?,
        role,
        verification_code: row.try_get(6)?,
        code_expires_at: row.try_get(7)?,
        code_attempts: row.try_get(8)?,
        resend_count: row.try_get(9)?,
        last_resend_at: row.try_get(10)?,
        reset_token_hash: row.try_get(11)?,
        reset_expires_at: row.try_get(12)?,
        created_at: row.try_get(13)?,
        updated_at: row.try_get(14)?,
    })
}

/// A unique violation on insert means a concurrent registration for the same
/// email won the race. The caller only needs to submit again.
fn insert_error(e: sqlx::Error) -> AuthError {
    let unique_violation =
        e.as_database_error().and_then(|db| db.code()).as_deref() == Some("23505");
    if unique_violation {
        AuthError::Conflict("El registro no pudo completarse, inténtalo de nuevo".into())
    } else {
        AuthError::from(e)
    }
}

// ── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredCleared {
    pub codes: u64,
    pub reset_tokens: u64,
}
