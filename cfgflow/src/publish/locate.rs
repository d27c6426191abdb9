//! Tiered search for the rendered image inside a workspace.

use crate::events::{kinds, EventSink, NoOpEventSink, PipelineEvent};
use crate::render::Renderer;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Marker that a graph program renders itself when executed.
pub const RENDER_DIRECTIVE: &str = "dot.render";

/// Which tier found the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageTier {
    /// The expected image path.
    Primary,
    /// Any image found by scanning the workspace.
    Scan,
    /// Found after re-executing the program.
    Recovery,
}

/// An image found inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedImage {
    /// Absolute path of the image.
    pub path: PathBuf,
    /// Tier that found it.
    pub tier: ImageTier,
}

/// Looks for the rendered image, trying each tier once:
///
/// 1. `<workspace>/<image_file_name>`
/// 2. the first file (by name) in the workspace with the image extension
/// 3. if the program contains [`RENDER_DIRECTIVE`], execute it again through
///    [`Renderer::execute_source`] and repeat 1 and 2
#[derive(Clone)]
pub struct ImageLocator {
    renderer: Arc<dyn Renderer>,
    image_file_name: String,
    event_sink: Arc<dyn EventSink>,
}

impl ImageLocator {
    /// Creates a locator.
    #[must_use]
    pub fn new(renderer: Arc<dyn Renderer>, image_file_name: impl Into<String>) -> Self {
        Self {
            renderer,
            image_file_name: image_file_name.into(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Runs the tiers against `workdir`; `program` is the generated source.
    pub async fn locate_image(
        &self,
        workdir: &Path,
        program: &str,
        run_id: &str,
    ) -> Option<LocatedImage> {
        if let Some(found) = self.check(workdir).await {
            return Some(found);
        }

        if !program.contains(RENDER_DIRECTIVE) {
            debug!(workspace = %workdir.display(), "No image and no render directive");
            return None;
        }

        self.emit_fallback(run_id, "re-executing graph program");
        if let Err(err) = self.renderer.execute_source(workdir, program).await {
            warn!(error = %err, "Recovery execution failed");
        }

        self.check(workdir).await.map(|found| LocatedImage {
            tier: ImageTier::Recovery,
            ..found
        })
    }

    async fn check(&self, workdir: &Path) -> Option<LocatedImage> {
        let primary = workdir.join(&self.image_file_name);
        if is_file(&primary).await {
            return Some(LocatedImage {
                path: primary,
                tier: ImageTier::Primary,
            });
        }

        let extension = Path::new(&self.image_file_name)
            .extension()
            .unwrap_or_else(|| OsStr::new("png"));
        let found = scan_for_extension(workdir, extension).await?;
        warn!(image = %found.display(), "Expected image missing, using scanned match");
        Some(LocatedImage {
            path: found,
            tier: ImageTier::Scan,
        })
    }

    fn emit_fallback(&self, run_id: &str, reason: &str) {
        self.event_sink.emit(
            PipelineEvent::new(kinds::RENDER_FALLBACK, run_id)
                .with_data(serde_json::json!({"reason": reason})),
        );
    }
}

impl std::fmt::Debug for ImageLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLocator")
            .field("image_file_name", &self.image_file_name)
            .finish_non_exhaustive()
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

async fn scan_for_extension(dir: &Path, extension: &OsStr) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    let mut matches = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let wanted = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if wanted && is_file(&path).await {
            matches.push(path);
        }
    }
    matches.sort();
    matches.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRenderer;
    use tempfile::TempDir;

    fn locator(renderer: Arc<FakeRenderer>) -> ImageLocator {
        ImageLocator::new(renderer, "graph.png")
    }

    #[tokio::test]
    async fn test_primary_tier() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("graph.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        let renderer = Arc::new(FakeRenderer::new());

        let found = locator(renderer.clone())
            .locate_image(dir.path(), "dot.render('graph')", "run")
            .await
            .unwrap();

        assert_eq!(found.tier, ImageTier::Primary);
        assert_eq!(found.path, dir.path().join("graph.png"));
        assert_eq!(renderer.execute_count(), 0);
    }

    #[tokio::test]
    async fn test_scan_tier_picks_first_by_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("zeta.png"), b"x").unwrap();
        std::fs::write(dir.path().join("Digraph.gv.png"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let found = locator(Arc::new(FakeRenderer::new()))
            .locate_image(dir.path(), "", "run")
            .await
            .unwrap();

        assert_eq!(found.tier, ImageTier::Scan);
        assert_eq!(found.path, dir.path().join("Digraph.gv.png"));
    }

    #[tokio::test]
    async fn test_recovery_tier_runs_once() {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(FakeRenderer::new().recover_with("graph.png"));

        let found = locator(renderer.clone())
            .locate_image(dir.path(), "dot.edge('a', 'b')\ndot.render('graph')", "run")
            .await
            .unwrap();

        assert_eq!(found.tier, ImageTier::Recovery);
        assert_eq!(renderer.execute_count(), 1);
    }

    #[tokio::test]
    async fn test_no_directive_skips_recovery() {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(FakeRenderer::new().recover_with("graph.png"));

        let found = locator(renderer.clone())
            .locate_image(dir.path(), "dot.edge('a', 'b')", "run")
            .await;

        assert!(found.is_none());
        assert_eq!(renderer.execute_count(), 0);
    }

    #[tokio::test]
    async fn test_all_tiers_exhausted() {
        let dir = TempDir::new().unwrap();
        let renderer = Arc::new(FakeRenderer::new());

        let found = locator(renderer.clone())
            .locate_image(dir.path(), "dot.render('graph')", "run")
            .await;

        assert!(found.is_none());
        assert_eq!(renderer.execute_count(), 1);
    }
}
