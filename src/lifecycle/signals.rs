//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl-C) or SIGTERM and trigger graceful shutdown
//! - Reload configuration on SIGHUP
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown

use crate::config::ConfigWatcher;
use crate::lifecycle::Shutdown;

/// Resolve on the first SIGINT or SIGTERM.
pub async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Trigger `shutdown` once a termination signal arrives.
pub fn spawn_shutdown_on_signal(shutdown: Shutdown) {
    tokio::spawn(async move {
        wait_for_termination().await;
        tracing::info!("Shutting down");
        shutdown.trigger();
    });
}

/// Reload configuration every time SIGHUP arrives.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(reloader: ConfigWatcher) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGHUP");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            tracing::info!("Received SIGHUP, reloading configuration");
            if let Err(e) = reloader.reload() {
                tracing::error!(error = %e, "Reload failed, keeping current configuration");
            }
        }
    });
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(_reloader: ConfigWatcher) {}
