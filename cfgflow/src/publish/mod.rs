//! Finding the rendered image and promoting it to the public directory.

mod locate;

pub use locate::{ImageLocator, ImageTier, LocatedImage, RENDER_DIRECTIVE};

use crate::errors::CfgflowError;
use crate::events::{kinds, EventSink, NoOpEventSink, PipelineEvent};
use crate::utils::unique_file_name;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tracing::{debug, info};

const FILE_PREFIX: &str = "cfg";
const MAX_NAME_ATTEMPTS: usize = 8;

/// An image copied into the public directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedImage {
    /// Location inside the public directory.
    pub path: PathBuf,
    /// URL the image is served at.
    pub url: String,
}

/// Everything one run leaves behind.
///
/// The image path points into the public directory; the workspace copy is
/// gone by the time the artifact is returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Published image, if rendering produced one.
    pub rendered_image_path: Option<PathBuf>,
    /// URL of the published image.
    pub public_url: Option<String>,
    /// The generated graph program.
    pub generated_source: String,
}

impl Artifact {
    /// Creates an artifact without an image.
    #[must_use]
    pub fn source_only(generated_source: impl Into<String>) -> Self {
        Self {
            generated_source: generated_source.into(),
            ..Self::default()
        }
    }

    /// Attaches a published image.
    #[must_use]
    pub fn with_image(mut self, image: PublishedImage) -> Self {
        self.rendered_image_path = Some(image.path);
        self.public_url = Some(image.url);
        self
    }
}

/// Copies images into the public directory under fresh names.
#[derive(Clone)]
pub struct ArtifactPublisher {
    public_root: PathBuf,
    url_prefix: String,
    event_sink: Arc<dyn EventSink>,
}

impl ArtifactPublisher {
    /// Creates a publisher writing into `public_root`, served at `url_prefix`.
    #[must_use]
    pub fn new(public_root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            public_root: public_root.into(),
            url_prefix: url_prefix.into(),
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the public directory.
    #[must_use]
    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    /// Copies `candidate` to `<public_root>/cfg_<uuid>.<ext>`.
    ///
    /// The destination is opened with create-new semantics, so an existing
    /// file is never overwritten; a name collision retries with a fresh name.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the candidate cannot be read or no destination can be
    /// created.
    pub async fn publish(
        &self,
        candidate: &Path,
        run_id: &str,
    ) -> Result<PublishedImage, CfgflowError> {
        tokio::fs::create_dir_all(&self.public_root).await?;
        let extension = candidate
            .extension()
            .map_or_else(|| "png".to_string(), |ext| ext.to_string_lossy().into_owned());

        for _ in 0..MAX_NAME_ATTEMPTS {
            let file_name = unique_file_name(FILE_PREFIX, &extension);
            let dest = self.public_root.join(&file_name);
            let mut target = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&dest)
                .await
            {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!(file = %file_name, "Public name taken, retrying");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let copied = async {
                let mut source = tokio::fs::File::open(candidate).await?;
                tokio::io::copy(&mut source, &mut target).await
            }
            .await;
            if let Err(err) = copied {
                drop(target);
                // best effort: do not leave a truncated file behind
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(err.into());
            }

            let url = format!("{}/{}", self.url_prefix.trim_end_matches('/'), file_name);
            info!(url = %url, source = %candidate.display(), "Artifact published");
            self.event_sink.emit(
                PipelineEvent::new(kinds::ARTIFACT_PUBLISHED, run_id)
                    .with_data(serde_json::json!({"url": url})),
            );
            return Ok(PublishedImage { path: dest, url });
        }

        Err(CfgflowError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "could not allocate a unique public file name",
        )))
    }
}

impl std::fmt::Debug for ArtifactPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactPublisher")
            .field("public_root", &self.public_root)
            .field("url_prefix", &self.url_prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_publish_copies_under_fresh_name() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("graph.png");
        std::fs::write(&image, b"PNG").unwrap();
        let sink = Arc::new(CollectingEventSink::new());
        let publisher =
            ArtifactPublisher::new(dir.path().join("static"), "/static").with_event_sink(sink.clone());

        let published = publisher.publish(&image, "run").await.unwrap();
        let url = published.url;

        assert!(url.starts_with("/static/cfg_"));
        assert!(url.ends_with(".png"));
        let file_name = url.trim_start_matches("/static/");
        assert_eq!(published.path, publisher.public_root().join(file_name));
        assert_eq!(std::fs::read(&published.path).unwrap(), b"PNG");
        assert!(image.exists());
        assert_eq!(sink.events_of_type(kinds::ARTIFACT_PUBLISHED).len(), 1);
    }

    #[tokio::test]
    async fn test_publish_twice_gives_distinct_urls() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("graph.png");
        std::fs::write(&image, b"PNG").unwrap();
        let publisher = ArtifactPublisher::new(dir.path().join("static"), "/static/");

        let first = publisher.publish(&image, "a").await.unwrap().url;
        let second = publisher.publish(&image, "b").await.unwrap().url;

        assert_ne!(first, second);
        assert!(!first.contains("//"));
        assert_eq!(std::fs::read_dir(publisher.public_root()).unwrap().count(), 2);
    }

    #[test]
    fn test_artifact_with_image() {
        let artifact = Artifact::source_only("dot.render()").with_image(PublishedImage {
            path: PathBuf::from("static/cfg_1.png"),
            url: "/static/cfg_1.png".to_string(),
        });

        assert_eq!(artifact.public_url.as_deref(), Some("/static/cfg_1.png"));
        assert_eq!(artifact.generated_source, "dot.render()");
    }

    #[tokio::test]
    async fn test_publish_missing_candidate() {
        let dir = TempDir::new().unwrap();
        let publisher = ArtifactPublisher::new(dir.path().join("static"), "/static");

        let err = publisher
            .publish(&dir.path().join("absent.png"), "run")
            .await
            .unwrap_err();

        assert_eq!(err.code(), "IO");
        assert_eq!(std::fs::read_dir(publisher.public_root()).unwrap().count(), 0);
    }
}
