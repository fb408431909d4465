pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod lifecycle;
pub mod mail;
pub mod store;

pub use config::Config;
pub use error::AuthError;

use std::sync::Arc;

/// Shared application state passed to all API handlers.
pub struct AppState {
    pub config: Config,
    pub store: store::AccountStore,
    pub crypto: crypto::CryptoEngine,
    pub sessions: auth::SessionKeys,
    pub mailer: Box<dyn mail::Mailer>,
}

pub type SharedState = Arc<AppState>;
