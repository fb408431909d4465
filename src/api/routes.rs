//! API route handlers for the bolsa-auth service.
//!
//! All handlers receive `SharedState` via Axum state extraction. Each flow is
//! a read-modify-write of one account row: load, apply a lifecycle operation,
//! persist, then send mail. Mail goes out after the write, so a delivery
//! failure leaves the issued code or token in place.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::extract::{CurrentSession, ValidJson, Validate};
use crate::account::{normalize_email, validate_email, Account, Role};
use crate::auth::password;
use crate::error::AuthError;
use crate::lifecycle;
use crate::mail::{templates, MailMessage};
use crate::{AppState, SharedState};

// =============================================================================
// V1 Router
// =============================================================================

pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/status", get(status))
        // ── Registration & verification ──────────────────────────────────
        .route("/register", post(register))
        .route("/verify", post(verify))
        .route("/resend-code", post(resend_code))
        // ── Password reset ───────────────────────────────────────────────
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        // ── Sessions ─────────────────────────────────────────────────────
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/me/role", post(choose_role))
        .with_state(state)
}

// =============================================================================
// Helpers
// =============================================================================

async fn find_account(state: &AppState, email: &str) -> Result<Account, AuthError> {
    state
        .store
        .find_by_email(email)
        .await?
        .ok_or_else(|| AuthError::NotFound(email.to_string()))
}

async fn deliver(state: &AppState, message: MailMessage) -> Result<(), AuthError> {
    if let Err(e) = state.mailer.send(&message).await {
        tracing::warn!(
            "Mail backend '{}' failed for {}: {e}",
            state.mailer.id(),
            message.to
        );
        return Err(e);
    }
    Ok(())
}

/// Best-effort audit write; never fails the request.
async fn audit(state: &AppState, account_id: &str, event_type: &str, metadata: serde_json::Value) {
    if let Err(e) = state.store.log_event(account_id, event_type, metadata).await {
        tracing::warn!("Failed to record {event_type} for {account_id}: {e}");
    }
}

fn require(field: &str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::Validation(format!("el campo '{field}' es obligatorio")));
    }
    Ok(())
}

// =============================================================================
// Health
// =============================================================================

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "bolsa-auth",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// Registration & verification
// =============================================================================

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    role: Option<Role>,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), AuthError> {
        validate_email(&self.email)?;
        password::validate_password(&self.password)
    }
}

/// POST /v1/register — Create an account (or restart an unverified one) and
/// email a verification code.
async fn register(
    State(state): State<SharedState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AuthError> {
    let email = normalize_email(&body.email);
    let now = Utc::now();

    let (account, code, restarted) = match state.store.find_by_email(&email).await? {
        Some(mut account) => {
            // Checked before hashing so rejected restarts stay cheap.
            lifecycle::check_restart(&account, now)?;
            let password_hash = password::hash_password(&body.password)?;
            let code = lifecycle::restart(&mut account, password_hash, body.role, now)?;
            state.store.save(&account).await?;
            (account, code, true)
        }
        None => {
            let password_hash = password::hash_password(&body.password)?;
            let mut account = Account::new(&email, password_hash, body.role, now);
            let code = lifecycle::issue_code(&mut account, now);
            account.id = state.store.insert(&account).await?;
            (account, code, false)
        }
    };

    tracing::info!("Registered {} (restarted: {restarted})", account.email);
    audit(
        &state,
        &account.id,
        "account.registered",
        json!({ "restarted": restarted, "role": account.role }),
    )
    .await;

    deliver(&state, templates::verification_code(&account.email, &code)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "data": { "id": account.id, "email": account.email },
            "message": "Te enviamos un código de verificación a tu correo",
        })),
    ))
}

#[derive(Deserialize)]
struct VerifyRequest {
    email: String,
    code: String,
}

impl Validate for VerifyRequest {
    fn validate(&self) -> Result<(), AuthError> {
        require("email", &self.email)?;
        require("code", &self.code)
    }
}

/// POST /v1/verify — Confirm account ownership with the emailed code.
async fn verify(
    State(state): State<SharedState>,
    ValidJson(body): ValidJson<VerifyRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let email = normalize_email(&body.email);
    let mut account = find_account(&state, &email).await?;

    let outcome = lifecycle::verify_code(&mut account, &body.code, Utc::now());

    // A mismatch bumped the attempt counter; that has to stick.
    if matches!(outcome, Ok(()) | Err(AuthError::InvalidCode)) {
        state.store.save(&account).await?;
    }
    outcome?;

    tracing::info!("Verified {}", account.email);
    audit(&state, &account.id, "account.verified", json!({})).await;

    Ok(Json(json!({
        "data": { "verified": true },
        "message": "Tu cuenta ha sido verificada",
    })))
}

#[derive(Deserialize)]
struct EmailRequest {
    email: String,
}

impl Validate for EmailRequest {
    fn validate(&self) -> Result<(), AuthError> {
        require("email", &self.email)
    }
}

/// POST /v1/resend-code — Email a replacement code (cooldown + ceiling apply).
async fn resend_code(
    State(state): State<SharedState>,
    ValidJson(body): ValidJson<EmailRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let email = normalize_email(&body.email);
    let mut account = find_account(&state, &email).await?;

    let code = lifecycle::resend_code(&mut account, Utc::now())?;
    state.store.save(&account).await?;

    audit(
        &state,
        &account.id,
        "account.code_resent",
        json!({ "resend_count": account.resend_count }),
    )
    .await;

    deliver(&state, templates::verification_code(&account.email, &code)).await?;

    Ok(Json(json!({
        "data": {
            "resends_remaining": lifecycle::MAX_RESENDS - account.resend_count,
        },
        "message": "Te enviamos un nuevo código",
    })))
}

// =============================================================================
// Password reset
// =============================================================================

/// POST /v1/forgot-password — Email a single-use reset link.
async fn forgot_password(
    State(state): State<SharedState>,
    ValidJson(body): ValidJson<EmailRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let email = normalize_email(&body.email);
    let mut account = find_account(&state, &email).await?;

    let token = lifecycle::issue_reset_token(&mut account, &state.crypto, Utc::now())?;
    state.store.save(&account).await?;

    audit(&state, &account.id, "password.reset_requested", json!({})).await;

    let link = state.config.reset_link(&account.email, &token);
    deliver(&state, templates::password_reset(&account.email, &link)).await?;

    Ok(Json(json!({
        "data": { "sent": true },
        "message": "Te enviamos un enlace para restablecer tu contraseña",
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    email: String,
    token: String,
    new_password: String,
}

impl Validate for ResetPasswordRequest {
    fn validate(&self) -> Result<(), AuthError> {
        require("email", &self.email)?;
        require("token", &self.token)?;
        password::validate_password(&self.new_password)
    }
}

/// POST /v1/reset-password — Spend a reset token and set a new password.
async fn reset_password(
    State(state): State<SharedState>,
    ValidJson(body): ValidJson<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let email = normalize_email(&body.email);
    let mut account = find_account(&state, &email).await?;

    lifecycle::consume_reset_token(
        &mut account,
        &state.crypto,
        &body.token,
        &body.new_password,
        Utc::now(),
    )?;
    state.store.save(&account).await?;

    tracing::info!("Password reset for {}", account.email);
    audit(&state, &account.id, "password.reset", json!({})).await;

    Ok(Json(json!({
        "data": { "reset": true },
        "message": "Tu contraseña fue actualizada",
    })))
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), AuthError> {
        require("email", &self.email)?;
        require("password", &self.password)
    }
}

/// POST /v1/login — Exchange credentials of a verified account for a session.
async fn login(
    State(state): State<SharedState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let email = normalize_email(&body.email);
    let Some(account) = state.store.find_by_email(&email).await? else {
        // Same Argon2 cost as a known email, so timing does not reveal accounts.
        password::verify_against_dummy(&body.password);
        return Err(AuthError::InvalidCredentials);
    };

    if !password::verify_password(&body.password, &account.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    if !account.verified {
        return Err(AuthError::NotVerified);
    }

    let session = state.sessions.issue(&account, Utc::now())?;
    audit(&state, &account.id, "session.created", json!({})).await;

    Ok(Json(json!({
        "data": {
            "session": session,
            "account": account.summary(),
        }
    })))
}

/// GET /v1/me — The caller's account.
async fn me(
    State(state): State<SharedState>,
    CurrentSession(claims): CurrentSession,
) -> Result<Json<serde_json::Value>, AuthError> {
    let account = state
        .store
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| AuthError::NotFound(claims.email.clone()))?;

    Ok(Json(json!({ "data": account.summary() })))
}

#[derive(Deserialize)]
struct RoleRequest {
    role: Role,
}

impl Validate for RoleRequest {
    fn validate(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

/// POST /v1/me/role — Choose employer/employee once. Returns a session that
/// carries the role.
async fn choose_role(
    State(state): State<SharedState>,
    CurrentSession(claims): CurrentSession,
    ValidJson(body): ValidJson<RoleRequest>,
) -> Result<Json<serde_json::Value>, AuthError> {
    if !state.store.set_role_if_unset(&claims.sub, body.role).await? {
        return Err(AuthError::Conflict("El rol de la cuenta ya fue elegido".into()));
    }

    let account = state
        .store
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| AuthError::NotFound(claims.email.clone()))?;

    audit(
        &state,
        &account.id,
        "account.role_chosen",
        json!({ "role": body.role }),
    )
    .await;

    let session = state.sessions.issue(&account, Utc::now())?;

    Ok(Json(json!({
        "data": {
            "session": session,
            "account": account.summary(),
        }
    })))
}
