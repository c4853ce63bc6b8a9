// Signal handling module
//
// A single termination signal (SIGTERM or SIGINT) triggers the
// Accepting → Draining transition; there is no per-request cancellation.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{error, info};

/// Spawn a background task that waits for a termination signal and fires
/// the shutdown notifier.
#[cfg(unix)]
pub fn spawn_signal_listener(shutdown: Arc<Notify>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("failed to register SIGTERM handler: {e}");
                return;
            }
        };
        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("failed to register SIGINT handler: {e}");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown"),
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown"),
        }
        shutdown.notify_one();
    });
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn spawn_signal_listener(shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received, initiating graceful shutdown"),
            Err(e) => {
                error!("failed to listen for Ctrl+C: {e}");
                return;
            }
        }
        shutdown.notify_one();
    });
}
