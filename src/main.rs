use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use bolsa_auth::auth::SessionKeys;
use bolsa_auth::crypto::CryptoEngine;
use bolsa_auth::store::{self, AccountStore};
use bolsa_auth::{api, mail, AppState, Config, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bolsa_auth=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    info!("bolsa-auth v{}", env!("CARGO_PKG_VERSION"));
    info!("Listening on {}:{}", config.host, config.port);

    let crypto = CryptoEngine::new(&config.token_pepper)?;
    let sessions = SessionKeys::new(&config.session_secret, config.session_ttl_hours);
    let store = AccountStore::new(&config.database_url).await?;
    store.migrate().await?;
    info!("Database connected and migrated");

    let mailer = mail::from_config(&config);
    if mailer.id() == "log" {
        tracing::warn!("BREVO_API_KEY not set, emails will only be logged");
    }

    let state: SharedState = Arc::new(AppState {
        config: config.clone(),
        store,
        crypto,
        sessions,
        mailer,
    });

    // Optional expiry sweep
    let sweep_interval = config.sweep_interval_secs;
    if sweep_interval > 0 {
        let sweep_state = state.clone();
        tokio::spawn(async move {
            store::sweep_daemon(sweep_state, sweep_interval).await;
        });
    }

    let app = api::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server ready");
    axum::serve(listener, app).await?;

    Ok(())
}
