//! Artifact Watcher for Hot Reload

use crate::loader::ModelLoader;
use crate::state::{ModelDescriptor, ServingState};
use crate::LoadError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

/// Polls the artifact's modification time and reloads when it changes
pub struct ModelWatcher {
    state: Arc<ServingState>,
    loader: ModelLoader,
    path: PathBuf,
    /// Poll period
    period: Duration,
    /// Modification time of the artifact at the last reload attempt
    last_modified: Option<SystemTime>,
}

impl ModelWatcher {
    /// Create a watcher.
    ///
    /// The current modification time is taken as already seen, so a watcher
    /// created right after the startup load does not reload the same file.
    pub fn new(
        state: Arc<ServingState>,
        loader: ModelLoader,
        path: impl Into<PathBuf>,
        period: Duration,
    ) -> Self {
        let path = path.into();
        let last_modified = modified(&path);
        info!(path = %path.display(), period_secs = period.as_secs(), "Creating model watcher");
        Self {
            state,
            loader,
            path,
            period,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the artifact once, reloading if it changed.
    ///
    /// Returns `None` when nothing changed or the file is absent.
    pub async fn poll_once(&mut self) -> Option<Result<ModelDescriptor, LoadError>> {
        let current = modified(&self.path)?;
        if self.last_modified == Some(current) {
            return None;
        }

        debug!(path = %self.path.display(), "Model artifact changed");
        self.last_modified = Some(current);

        let state = Arc::clone(&self.state);
        let loader = self.loader.clone();
        let path = self.path.clone();
        match tokio::task::spawn_blocking(move || state.reload(&loader, path)).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!(error = %e, "Model reload task failed");
                None
            }
        }
    }

    /// Poll until `shutdown` flips to `true` or its sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(path = %self.path.display(), "Starting model watcher");
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Model watcher stopped");
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ModelStatus;
    use std::io::Write;

    fn artifact(class: u32) -> String {
        format!(
            r#"{{"format_version":1,"n_features":9,"classes":[0,1],
                "trees":[{{"root":{{"type":"leaf","class":{}}}}}]}}"#,
            class
        )
    }

    fn write(path: &Path, body: &str, mtime: SystemTime) {
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file.set_modified(mtime).unwrap();
    }

    fn watcher_for(state: &Arc<ServingState>, path: &std::path::Path) -> ModelWatcher {
        ModelWatcher::new(Arc::clone(state), ModelLoader::new(), path, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_unchanged_artifact_not_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        write(&path, &artifact(0), SystemTime::UNIX_EPOCH + Duration::from_secs(1_000));

        let state = Arc::new(ServingState::new());
        state.reload(&ModelLoader::new(), &path).unwrap();

        let mut watcher = watcher_for(&state, &path);
        assert!(watcher.poll_once().await.is_none());
        assert_eq!(state.descriptor().unwrap().generation, 1);
    }

    #[tokio::test]
    async fn test_changed_artifact_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        write(&path, &artifact(0), SystemTime::UNIX_EPOCH + Duration::from_secs(1_000));

        let state = Arc::new(ServingState::new());
        state.reload(&ModelLoader::new(), &path).unwrap();
        let mut watcher = watcher_for(&state, &path);

        write(&path, &artifact(1), SystemTime::UNIX_EPOCH + Duration::from_secs(2_000));
        let descriptor = watcher.poll_once().await.unwrap().unwrap();
        assert_eq!(descriptor.generation, 2);
        assert_eq!(state.status(), ModelStatus::Ready);
    }

    #[tokio::test]
    async fn test_late_artifact_recovers_load_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let state = Arc::new(ServingState::new());
        assert!(state.reload(&ModelLoader::new(), &path).is_err());
        assert_eq!(state.status(), ModelStatus::LoadFailed);

        let mut watcher = watcher_for(&state, &path);
        assert!(watcher.poll_once().await.is_none());

        write(&path, &artifact(1), SystemTime::UNIX_EPOCH + Duration::from_secs(3_000));
        assert!(watcher.poll_once().await.unwrap().is_ok());
        assert!(state.is_serving());
    }

    #[tokio::test]
    async fn test_corrupt_update_degrades_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        write(&path, &artifact(0), SystemTime::UNIX_EPOCH + Duration::from_secs(1_000));

        let state = Arc::new(ServingState::new());
        state.reload(&ModelLoader::new(), &path).unwrap();
        let mut watcher = watcher_for(&state, &path);

        write(&path, "garbage", SystemTime::UNIX_EPOCH + Duration::from_secs(2_000));
        assert!(watcher.poll_once().await.unwrap().is_err());
        assert_eq!(state.status(), ModelStatus::Degraded);

        // Same bad file is not retried
        assert!(watcher.poll_once().await.is_none());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(ServingState::new());
        let path = dir.path().join("m.json");
        let watcher = ModelWatcher::new(state, ModelLoader::new(), path, Duration::from_millis(10));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(watcher.run(rx));
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
