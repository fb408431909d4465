//! Request extractors: validated JSON bodies and bearer sessions.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::auth::SessionClaims;
use crate::error::AuthError;
use crate::SharedState;

/// Field-level checks a request body runs after deserializing.
pub trait Validate {
    fn validate(&self) -> Result<(), AuthError>;
}

/// JSON body that deserialized and passed [`Validate`]. Malformed or
/// incomplete bodies are rejected as `AuthError::Validation`.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AuthError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// Claims of the caller's session, from `Authorization: Bearer <token>`.
pub struct CurrentSession(pub SessionClaims);

impl FromRequestParts<SharedState> for CurrentSession {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AuthError::Unauthorized)?;

        state.sessions.verify(token.trim()).map(CurrentSession)
    }
}
