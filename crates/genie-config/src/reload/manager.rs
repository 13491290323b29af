use crate::schema::GenieConfig;
use crate::toml_loader;
use crate::validation;
use crate::watcher::ConfigWatcher;
use genie_common::ConfigError;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

/// Owns the reload loop for one config file.
///
/// An invalid file on disk never replaces the running config: the last good
/// config stays published and a warning is logged.
pub struct ReloadManager {
    pub(super) config_path: PathBuf,
}

impl ReloadManager {
    /// Load the initial config and spawn the watch loop.
    ///
    /// Falls back to defaults when the file is missing or broken. The
    /// returned receiver sees every later successful reload.
    pub async fn start(config_path: PathBuf) -> (GenieConfig, watch::Receiver<GenieConfig>) {
        let initial = match Self::load(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!("failed to load config: {e}, using defaults");
                GenieConfig::default()
            }
        };

        let (config_tx, config_rx) = watch::channel(initial.clone());
        let manager = ReloadManager { config_path };
        tokio::spawn(async move {
            manager.run(config_tx).await;
        });

        (initial, config_rx)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    async fn run(&self, config_tx: watch::Sender<GenieConfig>) {
        let watcher = match ConfigWatcher::new(self.config_path.clone()) {
            Ok(w) => w,
            Err(e) => {
                error!("failed to create config watcher: {e}");
                return;
            }
        };

        let (change_tx, mut change_rx) = broadcast::channel::<()>(16);
        tokio::spawn(async move {
            if let Err(e) = watcher.watch(change_tx).await {
                error!("config watcher error: {e}");
            }
        });

        loop {
            match change_rx.recv().await {
                Ok(()) => {
                    if !self.reload_into(&config_tx) {
                        info!("all config receivers dropped, stopping reload manager");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("config watcher lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("config watcher channel closed");
                    break;
                }
            }
        }
    }

    /// Reload once and publish if the result is valid and different.
    /// Returns `false` once nobody is listening.
    pub(super) fn reload_into(&self, config_tx: &watch::Sender<GenieConfig>) -> bool {
        info!(path = %self.config_path.display(), "reloading config");
        match Self::load(&self.config_path) {
            Ok(config) => {
                config_tx.send_if_modified(|current| {
                    if *current == config {
                        false
                    } else {
                        *current = config;
                        true
                    }
                });
            }
            Err(e) => warn!("config reload rejected, keeping previous settings: {e}"),
        }
        !config_tx.is_closed()
    }

    fn load(path: &Path) -> Result<GenieConfig, ConfigError> {
        let config = toml_loader::load_from_path(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
