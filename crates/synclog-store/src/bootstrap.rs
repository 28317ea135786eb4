//! Store startup: open the pool and migrate, retrying with backoff.
//!
//! The database may live on storage that is briefly unavailable when the
//! process starts. [`connect_with_retry`] keeps trying with exponential
//! backoff and jitter until it succeeds or is cancelled. There is no attempt
//! limit.

use std::path::PathBuf;
use std::time::Duration;

use synclog_core::RetryConfig;
use synclog_settings::{SynclogSettings, resolve_db_path};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::{Result, StoreError};
use crate::sqlite::connection::{ConnectionConfig, ConnectionPool, open_and_migrate};

/// Where and how to open the store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,
    /// Pool and pragma configuration.
    pub connection: ConnectionConfig,
}

impl StoreConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &SynclogSettings) -> Self {
        Self {
            path: resolve_db_path(settings),
            connection: ConnectionConfig::from(&settings.store),
        }
    }
}

/// Open the store, retrying failed attempts with backoff.
///
/// Only success or `cancel` ends the loop. Returns [`StoreError::Cancelled`]
/// as soon as `cancel` fires, including before the first attempt.
pub async fn connect_with_retry(
    config: &StoreConfig,
    retry: &RetryConfig,
    cancel: CancellationToken,
) -> Result<ConnectionPool> {
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let path = config.path.clone();
        let connection = config.connection.clone();
        let open = tokio::task::spawn_blocking(move || open_and_migrate(&path, &connection));

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StoreError::Cancelled),
            joined = open => joined
                .map_err(|e| StoreError::Internal(format!("store open task failed: {e}")))?,
        };

        let err = match outcome {
            Ok(pool) => {
                info!(
                    path = %config.path.display(),
                    attempts = attempt.saturating_add(1),
                    "store connected"
                );
                return Ok(pool);
            }
            Err(e) => e,
        };

        let delay_ms = retry.delay_ms(attempt, rand::random::<f64>());
        warn!(
            attempt = attempt.saturating_add(1),
            delay_ms,
            error = %err,
            "store connection failed, retrying"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StoreError::Cancelled),
            () = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
        }
        attempt = attempt.saturating_add(1);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
