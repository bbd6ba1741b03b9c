//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated configuration into a [`ProxyContext`]
//! - Start optional background tasks (metrics, config watcher, signals)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, including a missing secret
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;

use crate::config::{ConfigError, ConfigWatcher, Directory, FileConfig, SharedConfig};
use crate::lifecycle::{signals, Shutdown};
use crate::net::ListenerError;
use crate::observability::init_metrics;
use crate::proxy::{ProxyContext, ProxyServer, ProxySettings};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to watch configuration: {0}")]
    Watch(#[from] notify::Error),
}

/// Build the shared context from a configuration file's contents.
pub fn build_context(config: &FileConfig) -> Result<ProxyContext, ConfigError> {
    let directory = Directory::from_config(config)?;
    Ok(ProxyContext::new(
        SharedConfig::new(directory),
        ProxySettings::from_config(config),
    ))
}

fn start_metrics(config: &FileConfig) {
    if !config.observability.metrics_enabled {
        return;
    }
    match config.observability.metrics_address.parse::<SocketAddr>() {
        Ok(addr) => {
            if let Err(e) = init_metrics(addr) {
                tracing::error!(error = %e, "Failed to start metrics endpoint");
            }
        }
        Err(_) => tracing::error!(
            metrics_address = %config.observability.metrics_address,
            "Failed to parse metrics address"
        ),
    }
}

/// Serve every endpoint until SIGINT/SIGTERM.
///
/// `path` is where `config` was loaded from; it is re-read on SIGHUP and,
/// with `watch`, whenever the file changes.
pub async fn run(config: FileConfig, path: &Path, watch: bool) -> Result<(), StartupError> {
    let ctx = build_context(&config)?;
    start_metrics(&config);

    let server = ProxyServer::bind(ctx.clone()).await?;

    let reloader = ConfigWatcher::new(path, ctx.config.clone());
    let _watcher = if watch {
        Some(reloader.clone().run()?)
    } else {
        None
    };
    signals::spawn_reload_on_hangup(reloader);

    let shutdown = Shutdown::new();
    signals::spawn_shutdown_on_signal(shutdown.clone());

    tracing::info!(endpoints = server.local_addrs().len(), "totp-gate started");
    server.run(shutdown).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, ConfigProvider};

    #[test]
    fn context_carries_settings_and_directory() {
        let config = parse_config(
            r#"
            secret = "abc"

            [limits]
            max_connections = 3

            [[endpoints]]
            id = 4
            listen = "127.0.0.1:0"
            upstream = "127.0.0.1:3000"
            "#,
        )
        .unwrap();

        let ctx = build_context(&config).unwrap();
        assert_eq!(ctx.settings.max_connections, 3);
        assert!(ctx.config.snapshot().get_endpoint(4).is_some());
    }

    #[test]
    fn missing_secret_is_fatal() {
        let config = FileConfig::default();
        assert!(matches!(build_context(&config), Err(ConfigError::Validation(_))));
    }
}
