//! Revocation ledger garbage collection.
//!
//! Blacklisted refresh tokens only matter until their signed expiry passes;
//! after that the verifier rejects them on its own. A background task polls
//! the ledger on a fixed cadence and deletes rows whose `expires_at` is in
//! the past. Deleting a row for a still-valid token would re-enable replay,
//! so the sweep condition is the only line allowed to decide what goes.

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument};

#[derive(Clone, Copy, Debug)]
pub struct PurgeWorkerConfig {
    poll_interval: Duration,
}

impl PurgeWorkerConfig {
    /// Default sweep cadence: every 5 minutes. Rows linger at most one
    /// interval past their expiry, which only delays reclaiming space.
    #[must_use]
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_poll_interval_seconds(mut self, seconds: u64) -> Self {
        self.poll_interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let poll_interval = if self.poll_interval.is_zero() {
            Duration::from_secs(60)
        } else {
            self.poll_interval
        };
        Self { poll_interval }
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Default for PurgeWorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background task that sweeps expired ledger rows.
pub fn spawn_purge_worker(pool: PgPool, config: PurgeWorkerConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        let poll_interval = config.poll_interval();

        loop {
            match purge_expired_tokens(&pool).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged expired revoked tokens"),
                Err(err) => error!("revoked token purge failed: {err:#}"),
            }

            sleep(poll_interval).await;
        }
    })
}

/// Delete ledger rows whose token has expired on its own. Returns the
/// number of rows removed.
pub(crate) async fn purge_expired_tokens(pool: &PgPool) -> Result<u64> {
    let query = "DELETE FROM revoked_tokens WHERE expires_at <= NOW()";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge expired revoked tokens")?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_poll_interval() {
        let config = PurgeWorkerConfig::new();
        assert_eq!(config.poll_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_normalize_rejects_zero_interval() {
        let config = PurgeWorkerConfig::new()
            .with_poll_interval_seconds(0)
            .normalize();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_with_poll_interval_seconds() {
        let config = PurgeWorkerConfig::new().with_poll_interval_seconds(30);
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
    }
}
