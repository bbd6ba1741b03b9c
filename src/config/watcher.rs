//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::directory::{ConfigProvider, Directory, SharedConfig};
use crate::config::loader::{load_config, ConfigError};

/// Monitors the configuration file and swaps in each valid new version.
#[derive(Debug, Clone)]
pub struct ConfigWatcher {
    path: PathBuf,
    shared: SharedConfig,
}

impl ConfigWatcher {
    pub fn new(path: &Path, shared: SharedConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            shared,
        }
    }

    /// Load the file and publish it. On error the current directory stays.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let config = load_config(&self.path)?;
        let directory = Directory::from_config(&config)?;
        tracing::info!(
            endpoints = directory.list_endpoints().len(),
            "Configuration reloaded"
        );
        self.shared.replace(directory);
        Ok(())
    }

    /// Start watching the file. Dropping the returned watcher stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let file_name = path.file_name().map(ToOwned::to_owned);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(ToOwned::to_owned) == file_name);
                    if ours && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::debug!("Config file change detected, reloading");
                        if let Err(e) = self.reload() {
                            tracing::error!(
                                error = %e,
                                "Failed to reload config, keeping current configuration"
                            );
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        // Watch the directory: saves replace the file by rename.
        let target = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        watcher.watch(target, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;

    fn config_text(secret: &str) -> String {
        format!(
            r#"
            secret = "{secret}"

            [[endpoints]]
            id = 1
            listen = "127.0.0.1:8080"
            upstream = "127.0.0.1:3000"
            "#
        )
    }

    #[test]
    fn reload_swaps_valid_and_keeps_invalid() {
        let path = std::env::temp_dir().join(format!("totp-gate-watch-{}.toml", std::process::id()));
        std::fs::write(&path, config_text("first")).unwrap();

        let initial = Directory::from_config(&parse_config(&config_text("first")).unwrap()).unwrap();
        let shared = SharedConfig::new(initial);
        let watcher = ConfigWatcher::new(&path, shared.clone());

        std::fs::write(&path, config_text("second")).unwrap();
        watcher.reload().unwrap();
        assert_eq!(shared.snapshot().secret().expose(), "second");

        std::fs::write(&path, config_text("")).unwrap();
        assert!(watcher.reload().is_err());
        assert_eq!(shared.snapshot().secret().expose(), "second");

        std::fs::remove_file(&path).unwrap();
    }
}
