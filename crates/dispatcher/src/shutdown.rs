//! Process shutdown signal handling: a single cooperative cancellation
//! trigger, fired once by SIGINT or SIGTERM and propagated to both the
//! ingress listener and the worker pool. A single broadcast token: every
//! blocking operation observes the same cancellation, there is no separate
//! "force immediate exit" path.

use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;

async fn wait_for_signal() {
    let mut sigterm =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM");
        }
    }
}

/// Spawn a task that waits for SIGINT/SIGTERM and flips the returned
/// watch channel to `true` exactly once. Clone the receiver for every
/// consumer that needs to observe the same cancellation (the axum graceful
/// shutdown future and the engine handle).
pub fn spawn_shutdown_trigger() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = tx.send(true);
    });
    rx
}
