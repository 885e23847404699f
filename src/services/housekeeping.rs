//! Housekeeping: periodic purge of expired sessions.
//!
//! DESIGN
//! ======
//! A background task wakes on a fixed interval and deletes session rows past
//! their expiry. Validation already ignores expired tokens, so the sweep only
//! bounds table growth; a failed sweep is logged and retried next tick.

use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::services::session;

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

#[must_use]
pub fn sweep_interval() -> Duration {
    Duration::from_secs(crate::config::env_parse("SESSION_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS).max(1))
}

/// Spawn the background sweep task. Returns a handle for shutdown.
pub fn spawn_session_sweeper(pool: PgPool, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            sweep_once(&pool).await;
        }
    })
}

async fn sweep_once(pool: &PgPool) {
    match session::purge_expired_sessions(pool).await {
        Ok(0) => debug!("session sweep: nothing expired"),
        Ok(purged) => info!(purged, "session sweep: expired sessions removed"),
        Err(e) => error!(error = %e, "session sweep failed"),
    }
}

#[cfg(test)]
#[path = "housekeeping_test.rs"]
mod tests;
