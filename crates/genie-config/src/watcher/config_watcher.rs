use genie_common::ConfigError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Quiet period after the last file event before a reload is signalled.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Watches one config file and emits `()` on a broadcast channel per settled change.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
}

impl ConfigWatcher {
    /// Create a watcher for `path`. The file does not have to exist yet.
    pub fn new(path: PathBuf) -> Result<Self, ConfigError> {
        if path.file_name().is_none() {
            return Err(ConfigError::WatchError(format!(
                "{} does not name a file",
                path.display()
            )));
        }
        if !path.exists() {
            warn!(path = %path.display(), "config file missing, watching for creation");
        }
        Ok(Self {
            path,
            debounce: DEFAULT_DEBOUNCE,
        })
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run until the notify backend goes away. Each settled change sends `()`.
    pub async fn watch(&self, tx: broadcast::Sender<()>) -> Result<(), ConfigError> {
        let file_name = self.path.file_name().map(OsString::from).unwrap_or_default();
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, mut event_rx) = mpsc::channel::<()>(16);
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) if touches_file(&event, &file_name) => {
                    debug!(kind = ?event.kind, "config file event");
                    let _ = event_tx.try_send(());
                }
                Ok(_) => {}
                Err(e) => error!("file watcher error: {e}"),
            },
            notify::Config::default(),
        )
        .map_err(|e| ConfigError::WatchError(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::WatchError(format!("failed to watch {}: {e}", dir.display())))?;

        info!(path = %self.path.display(), "watching config file");

        while event_rx.recv().await.is_some() {
            if !self.settle(&mut event_rx).await {
                break;
            }
            if tx.send(()).is_err() {
                debug!("no receivers for config change signal");
            }
        }

        drop(watcher);
        Ok(())
    }

    /// Swallow events until `debounce` passes with none. Returns `false` if
    /// the event channel closed meanwhile.
    async fn settle(&self, event_rx: &mut mpsc::Receiver<()>) -> bool {
        loop {
            match tokio::time::timeout(self.debounce, event_rx.recv()).await {
                Err(_elapsed) => return true,
                Ok(Some(())) => continue,
                Ok(None) => return false,
            }
        }
    }
}

fn touches_file(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}
