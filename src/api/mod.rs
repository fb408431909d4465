//! Unified API router for bolsa-auth.
//!
//! Mounts all endpoints under /v1:
//! - /v1/register, /v1/verify, /v1/resend-code — account creation and email verification
//! - /v1/forgot-password, /v1/reset-password  — password recovery
//! - /v1/login, /v1/me, /v1/me/role            — sessions and role selection
//! - /v1/status                                — health check

pub mod extract;
pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/v1", routes::v1_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
