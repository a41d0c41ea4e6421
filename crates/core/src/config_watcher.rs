use crate::config::AppConfig;
use crate::config_loader::ConfigLoader;
use anyhow::Result;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tokio::sync::watch;

/// How often the blocking watch loop checks whether anyone still listens.
const CLOSED_POLL: Duration = Duration::from_millis(250);

/// Reloads the configuration file on change and broadcasts the result.
///
/// Consumers hold a `watch::Receiver<AppConfig>` and pick up the latest value
/// between loop cycles; a reload that fails to parse keeps the previous value.
pub struct ConfigWatcher {
    tx: watch::Sender<AppConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver primed with `initial_config`.
    #[must_use]
    pub fn new(initial_config: AppConfig) -> (Self, watch::Receiver<AppConfig>) {
        let (tx, rx) = watch::channel(initial_config);
        (Self { tx }, rx)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AppConfig> {
        self.tx.subscribe()
    }

    /// Re-reads `config_path` and publishes it if it parsed and differs from
    /// the current value. Returns whether a new value was published.
    pub fn reload(&self, config_path: &Path) -> bool {
        reload_into(&self.tx, config_path)
    }

    /// Watches the configuration file until every receiver has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if file watching cannot be initiated or if the watcher task fails.
    pub async fn watch(&self, config_path: impl Into<PathBuf>) -> Result<()> {
        let tx = self.tx.clone();
        let config_path = config_path.into();

        tokio::task::spawn_blocking(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            })?;

            watcher.watch(&config_path, RecursiveMode::NonRecursive)?;
            tracing::info!(path = %config_path.display(), "Watching config file");

            loop {
                match notify_rx.recv_timeout(CLOSED_POLL) {
                    // Editors often replace the file instead of writing in place.
                    Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                        tracing::info!("Config file changed, reloading...");
                        reload_into(&tx, &config_path);
                    }
                    Ok(_) => {}
                    Err(RecvTimeoutError::Timeout) if tx.is_closed() => {
                        tracing::debug!("No config subscribers left, watcher exiting");
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            Ok::<_, anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}

fn reload_into(tx: &watch::Sender<AppConfig>, config_path: &Path) -> bool {
    match ConfigLoader::load_from(config_path) {
        Ok(new_config) => {
            let changed = tx.send_if_modified(|current| {
                if *current == new_config {
                    false
                } else {
                    *current = new_config;
                    true
                }
            });
            if changed {
                tracing::info!("Config reloaded successfully");
            }
            changed
        }
        Err(e) => {
            tracing::error!("Failed to reload config: {:#}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_publishes_only_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        std::fs::write(&path, "[engine]\nloop_interval_ms = 1000\n").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(AppConfig::default());
        assert!(!watcher.reload(&path));
        assert!(!rx.has_changed().unwrap());

        std::fs::write(&path, "[risk]\nmax_leverage = 1.5\n").unwrap();
        assert!(watcher.reload(&path));
        assert!(rx.has_changed().unwrap());
        let config = rx.borrow_and_update().clone();
        assert!((config.risk.max_leverage - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn broken_reload_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config.toml");
        std::fs::write(&path, "[risk\nmax_leverage = ").unwrap();

        let (watcher, rx) = ConfigWatcher::new(AppConfig::default());
        assert!(!watcher.reload(&path));
        assert_eq!(*rx.borrow(), AppConfig::default());
    }
}
