//! Background sweep of expired verification codes and reset tokens.
//!
//! Read-time checks in `lifecycle` stay authoritative; the sweep only keeps
//! stale secrets from lingering in the table. Disabled unless
//! `SWEEP_INTERVAL_SECS` is set.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

/// Start the sweep loop.
pub async fn sweep_daemon(state: Arc<crate::AppState>, interval_secs: u64) {
    let interval = tokio::time::Duration::from_secs(interval_secs);
    info!("Expiry sweep started (interval: {interval_secs}s)");

    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = sweep_cycle(&state).await {
            error!("Sweep cycle error: {e}");
        }
    }
}

async fn sweep_cycle(state: &crate::AppState) -> Result<(), crate::AuthError> {
    let cleared = state.store.clear_expired(Utc::now()).await?;

    if cleared.codes > 0 || cleared.reset_tokens > 0 {
        info!(
            "Cleared {} expired codes and {} expired reset tokens",
            cleared.codes, cleared.reset_tokens
        );
    }

    Ok(())
}
