use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Unified error type for the bolsa-auth service.
///
/// User-facing variants carry Spanish messages; they are rendered as-is in the
/// JSON error envelope.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // ── Lifecycle Errors ────────────────────────────────────────────────
    #[error("No existe una cuenta asociada a {0}")]
    NotFound(String),

    #[error("El código o enlace ha expirado. Solicita uno nuevo")]
    Expired,

    #[error("Se agotaron los intentos de verificación. Solicita un nuevo código")]
    AttemptsExhausted,

    #[error("Se alcanzó el máximo de reenvíos. Vuelve a registrarte para recibir un código")]
    ResendExhausted,

    #[error("Espera {retry_after_secs} segundos antes de solicitar otro código")]
    RateLimited { retry_after_secs: i64 },

    #[error("El código ingresado no es válido")]
    InvalidCode,

    #[error("El enlace de restablecimiento no es válido")]
    InvalidToken,

    #[error("Datos inválidos: {0}")]
    Validation(String),

    // ── Account Errors ──────────────────────────────────────────────────
    #[error("{0}")]
    Conflict(String),

    #[error("Correo o contraseña incorrectos")]
    InvalidCredentials,

    #[error("La cuenta aún no ha sido verificada")]
    NotVerified,

    // ── Session Errors ──────────────────────────────────────────────────
    #[error("Se requiere iniciar sesión")]
    Unauthorized,

    #[error("La sesión ha expirado")]
    SessionExpired,

    // ── Internal ────────────────────────────────────────────────────────
    #[error("No se pudo enviar el correo: {0}")]
    Mail(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code used in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::NotFound(_) => "not_found",
            AuthError::Expired => "expired",
            AuthError::AttemptsExhausted => "attempts_exhausted",
            AuthError::ResendExhausted => "resend_exhausted",
            AuthError::RateLimited { .. } => "rate_limited",
            AuthError::InvalidCode => "invalid_code",
            AuthError::InvalidToken => "invalid_token",
            AuthError::Validation(_) => "validation_error",
            AuthError::Conflict(_) => "conflict",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::NotVerified => "not_verified",
            AuthError::Unauthorized => "unauthorized",
            AuthError::SessionExpired => "session_expired",
            AuthError::Mail(_) => "mail_error",
            AuthError::Database(_) => "database_error",
            AuthError::Crypto(_) => "crypto_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Expired => StatusCode::GONE,
            AuthError::AttemptsExhausted
            | AuthError::ResendExhausted
            | AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::InvalidCode | AuthError::InvalidToken => StatusCode::BAD_REQUEST,
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::Unauthorized
            | AuthError::SessionExpired => StatusCode::UNAUTHORIZED,
            AuthError::NotVerified => StatusCode::FORBIDDEN,
            AuthError::Mail(_) => StatusCode::BAD_GATEWAY,
            AuthError::Database(_) | AuthError::Crypto(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {e}");
        AuthError::Database(e.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(e: anyhow::Error) -> Self {
        AuthError::Internal(e.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the log, not in the response body.
        let message = if status.is_server_error() {
            tracing::error!("{self}");
            "Error interno del servidor".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        });

        let mut response = (status, axum::Json(body)).into_response();
        if let AuthError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
