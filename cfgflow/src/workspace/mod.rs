//! Per-run ephemeral directories.
//!
//! Every run gets `<ephemeral_root>/<uuid>`, populated with copies of the
//! configured assets. The directory is removed by [`Workspace::close`] or, if
//! the owner never gets that far, by `Drop`. Nothing here touches the process
//! working directory: callers thread [`Workspace::path`] explicitly.

mod assets;

use crate::errors::CfgflowError;
use crate::events::{kinds, EventSink, NoOpEventSink, PipelineEvent};
use futures::future::try_join_all;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub use assets::copy_asset;

/// Allocates workspaces under a shared ephemeral root.
#[derive(Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    assets: Vec<PathBuf>,
    event_sink: Arc<dyn EventSink>,
}

impl WorkspaceManager {
    /// Creates a manager for `root`, copying `assets` into each workspace.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, assets: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            assets,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the ephemeral root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh workspace and stages the assets into it.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created or an existing asset
    /// cannot be copied. Missing assets are skipped.
    pub async fn create(&self, run_id: &str) -> Result<Workspace, CfgflowError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let id = Uuid::new_v4();
        let path = self.root.join(id.to_string());
        tokio::fs::create_dir(&path).await?;

        // from here on Drop removes the directory
        let workspace = Workspace {
            id,
            path,
            closed: false,
            run_id: run_id.to_string(),
            event_sink: Arc::clone(&self.event_sink),
        };

        let copies = self.assets.iter().map(|asset| {
            let source = asset.clone();
            let dest_dir = workspace.path.clone();
            async move {
                let copied = tokio::task::spawn_blocking(move || copy_asset(&source, &dest_dir))
                    .await
                    .map_err(|e| CfgflowError::Io(std::io::Error::other(e)))??;
                if !copied {
                    debug!(asset = %asset.display(), "Asset missing, skipped");
                }
                Ok::<_, CfgflowError>(())
            }
        });
        try_join_all(copies).await?;

        debug!(workspace = %workspace.path.display(), run_id, "Workspace created");
        self.event_sink.emit(
            PipelineEvent::new(kinds::WORKSPACE_CREATED, run_id)
                .with_data(serde_json::json!({"workspace": id.to_string()})),
        );
        Ok(workspace)
    }

    /// Runs `f` inside a fresh workspace and removes it on every exit path.
    ///
    /// The closure receives the workspace directory. If the returned future is
    /// dropped before completion the directory is still removed.
    ///
    /// # Errors
    ///
    /// Returns creation errors, or whatever `f` returns.
    pub async fn with_workspace<T, F, Fut>(&self, run_id: &str, f: F) -> Result<T, CfgflowError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<T, CfgflowError>>,
    {
        let workspace = self.create(run_id).await?;
        let result = f(workspace.path().to_path_buf()).await;
        if let Err(err) = workspace.close().await {
            warn!(error = %err, "Failed to remove workspace");
        }
        result
    }
}

impl std::fmt::Debug for WorkspaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceManager")
            .field("root", &self.root)
            .field("assets", &self.assets)
            .finish_non_exhaustive()
    }
}

/// A uniquely named directory owned by one run.
pub struct Workspace {
    id: Uuid,
    path: PathBuf,
    closed: bool,
    run_id: String,
    event_sink: Arc<dyn EventSink>,
}

impl Workspace {
    /// Returns the workspace id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the workspace directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Joins a relative path onto the workspace directory.
    #[must_use]
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.path.join(relative)
    }

    /// Removes the directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns the IO error if removal fails for a reason other than the
    /// directory already being gone.
    pub async fn close(mut self) -> std::io::Result<()> {
        self.closed = true;
        match tokio::fs::remove_dir_all(&self.path).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
            _ => {
                self.removed();
                Ok(())
            }
        }
    }

    fn removed(&self) {
        debug!(workspace = %self.path.display(), "Workspace removed");
        self.event_sink.emit(
            PipelineEvent::new(kinds::WORKSPACE_REMOVED, self.run_id.clone())
                .with_data(serde_json::json!({"workspace": self.id.to_string()})),
        );
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => {
                warn!(workspace = %self.path.display(), error = %err, "Failed to remove workspace on drop");
            }
            _ => self.removed(),
        }
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use tempfile::TempDir;

    fn manager(root: &TempDir, assets: Vec<PathBuf>) -> WorkspaceManager {
        WorkspaceManager::new(root.path().join("ephemeral"), assets)
    }

    #[tokio::test]
    async fn test_create_and_close() {
        let root = TempDir::new().unwrap();
        let sink = Arc::new(CollectingEventSink::new());
        let manager = manager(&root, vec![]).with_event_sink(sink.clone());

        let workspace = manager.create("run").await.unwrap();
        let path = workspace.path().to_path_buf();
        assert!(path.is_dir());
        assert_eq!(path.parent().unwrap(), manager.root());
        assert_eq!(workspace.join("graph.png"), path.join("graph.png"));

        workspace.close().await.unwrap();
        assert!(!path.exists());
        assert_eq!(
            sink.event_types(),
            vec![kinds::WORKSPACE_CREATED, kinds::WORKSPACE_REMOVED]
        );
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root, vec![]);

        let workspace = manager.create("run").await.unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::write(path.join("scratch.txt"), "x").unwrap();
        drop(workspace);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_assets_are_staged() {
        let root = TempDir::new().unwrap();
        let assets_dir = root.path().join("src");
        std::fs::create_dir_all(assets_dir.join("prompt/Java")).unwrap();
        std::fs::write(assets_dir.join("prompt/Java/fusion_prompt.txt"), "f").unwrap();
        std::fs::write(assets_dir.join("config.yaml"), "k: v").unwrap();

        let manager = manager(
            &root,
            vec![
                assets_dir.join("prompt"),
                assets_dir.join("config.yaml"),
                assets_dir.join("util"),
            ],
        );
        let workspace = manager.create("run").await.unwrap();

        assert!(workspace.join("prompt/Java/fusion_prompt.txt").is_file());
        assert_eq!(
            std::fs::read_to_string(workspace.join("config.yaml")).unwrap(),
            "k: v"
        );
        assert!(!workspace.join("util").exists());
    }

    #[tokio::test]
    async fn test_with_workspace_cleans_up_on_error() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root, vec![]);
        let seen = Arc::new(parking_lot::Mutex::new(None));

        let seen_in = Arc::clone(&seen);
        let result: Result<(), CfgflowError> = manager
            .with_workspace("run", |dir| async move {
                *seen_in.lock() = Some(dir.clone());
                tokio::fs::write(dir.join("graph_code.py"), "x").await?;
                Err(CfgflowError::Config("render blew up".to_string()))
            })
            .await;

        assert!(result.is_err());
        let dir = seen.lock().clone().unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_dropped_future_still_cleans_up() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root, vec![]);
        let seen = Arc::new(parking_lot::Mutex::new(None));

        let seen_in = Arc::clone(&seen);
        let fut = manager.with_workspace("run", |dir| async move {
            *seen_in.lock() = Some(dir);
            std::future::pending::<Result<(), CfgflowError>>().await
        });
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(50), fut).await;

        assert!(timed_out.is_err());
        let dir = seen.lock().clone().unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_concurrent_workspaces_are_isolated() {
        let root = TempDir::new().unwrap();
        let manager = manager(&root, vec![]);

        let first = manager.create("a").await.unwrap();
        let second = manager.create("b").await.unwrap();
        assert_ne!(first.path(), second.path());

        std::fs::write(first.join("graph.png"), "first").unwrap();
        std::fs::write(second.join("graph.png"), "second").unwrap();

        let second_path = second.path().to_path_buf();
        first.close().await.unwrap();

        assert_eq!(
            std::fs::read_to_string(second_path.join("graph.png")).unwrap(),
            "second"
        );
        second.close().await.unwrap();
    }
}
