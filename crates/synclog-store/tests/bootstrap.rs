//! Connection bootstrap: retrying until the store opens, and cancellation.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use synclog_core::RetryConfig;
use synclog_store::{ConnectionConfig, StoreConfig, StoreError, connect_with_retry};
use tokio_util::sync::CancellationToken;

fn config(path: PathBuf) -> StoreConfig {
    StoreConfig {
        path,
        connection: ConnectionConfig {
            connect_timeout_ms: 200,
            ..Default::default()
        },
    }
}

/// A database path whose parent is a regular file, so opening always fails.
fn unreachable_path(dir: &tempfile::TempDir) -> PathBuf {
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();
    blocker.join("synclog.db")
}

#[tokio::test]
async fn connects_to_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("synclog.db");
    let pool = connect_with_retry(&config(path.clone()), &RetryConfig::default(), CancellationToken::new())
        .await
        .unwrap();
    assert!(path.exists());
    assert!(pool.get().is_ok());
}

#[tokio::test]
async fn retries_until_storage_becomes_available() {
    let dir = tempfile::tempdir().unwrap();
    let path = unreachable_path(&dir);
    let blocker = dir.path().join("blocker");
    let retry = RetryConfig {
        base_delay_ms: 5,
        max_delay_ms: 20,
        jitter_factor: 0.0,
    };
    let _unblock = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        std::fs::remove_file(&blocker).unwrap();
    });

    let started = Instant::now();
    let pool = connect_with_retry(&config(path.clone()), &retry, CancellationToken::new())
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert!(path.exists());
    assert!(pool.get().is_ok());
}

#[tokio::test]
async fn keeps_retrying_until_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let retry = RetryConfig {
        base_delay_ms: 1,
        max_delay_ms: 2,
        jitter_factor: 0.0,
    };
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let _canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = connect_with_retry(&config(unreachable_path(&dir)), &retry, cancel).await;
    assert_matches!(result, Err(StoreError::Cancelled));
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn pre_cancelled_token_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = connect_with_retry(&config(dir.path().join("x.db")), &RetryConfig::default(), cancel).await;
    assert_matches!(result, Err(StoreError::Cancelled));
    assert!(!dir.path().join("x.db").exists());
}

#[tokio::test]
async fn cancel_interrupts_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let retry = RetryConfig {
        base_delay_ms: 60_000,
        max_delay_ms: 60_000,
        jitter_factor: 0.0,
    };
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let _canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = connect_with_retry(&config(unreachable_path(&dir)), &retry, cancel).await;
    assert_matches!(result, Err(StoreError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
}
