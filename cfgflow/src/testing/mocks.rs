//! Scripted collaborators.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::completion::{CompletionClient, CompletionRequest};
use crate::errors::{CompletionError, RenderError};
use crate::render::Renderer;

type Responder = Arc<dyn Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync>;

/// A completion client that replays a script of replies.
///
/// Replies are consumed in order; once the script is empty the fallback
/// reply (if any) is repeated, otherwise a terminal failure is returned.
#[derive(Default)]
pub struct ScriptedCompletionClient {
    script: Mutex<VecDeque<Result<String, CompletionError>>>,
    fallback: Mutex<Option<Result<String, CompletionError>>>,
    responder: Option<Responder>,
    delay: Option<Duration>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletionClient {
    /// Creates a client with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes every reply from the request; the script is ignored.
    #[must_use]
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Delays every reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a successful reply.
    #[must_use]
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(text.into()));
        self
    }

    /// Queues a transient failure.
    #[must_use]
    pub fn fail_transient(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .push_back(Err(CompletionError::transient(message)));
        self
    }

    /// Queues a terminal failure.
    #[must_use]
    pub fn fail_terminal(self, message: impl Into<String>) -> Self {
        self.script
            .lock()
            .push_back(Err(CompletionError::terminal(message)));
        self
    }

    /// Replies with `text` once the script runs out.
    #[must_use]
    pub fn respond_always(self, text: impl Into<String>) -> Self {
        *self.fallback.lock() = Some(Ok(text.into()));
        self
    }

    /// Fails transiently once the script runs out.
    #[must_use]
    pub fn fail_transient_always(self, message: impl Into<String>) -> Self {
        *self.fallback.lock() = Some(Err(CompletionError::transient(message)));
        self
    }

    /// Returns the requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(responder) = &self.responder {
            return responder(request);
        }
        let next = self.script.lock().pop_front();
        next.or_else(|| self.fallback.lock().clone())
            .unwrap_or_else(|| Err(CompletionError::terminal("completion script exhausted")))
    }
}

impl std::fmt::Debug for ScriptedCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedCompletionClient")
            .field("pending", &self.script.lock().len())
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

/// A renderer that writes placeholder image files instead of rendering.
#[derive(Debug, Default)]
pub struct FakeRenderer {
    produces: Vec<String>,
    recovers: Vec<String>,
    failure: Option<String>,
    delay: Option<Duration>,
    render_dirs: Mutex<Vec<PathBuf>>,
    execute_count: Mutex<usize>,
}

impl FakeRenderer {
    /// Creates a renderer that writes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `file_name` into the workspace on every render.
    #[must_use]
    pub fn produce(mut self, file_name: impl Into<String>) -> Self {
        self.produces.push(file_name.into());
        self
    }

    /// Writes `file_name` into the workspace when the recovery path runs.
    #[must_use]
    pub fn recover_with(mut self, file_name: impl Into<String>) -> Self {
        self.recovers.push(file_name.into());
        self
    }

    /// Makes every render fail after writing its files.
    #[must_use]
    pub fn fail_with(mut self, stderr: impl Into<String>) -> Self {
        self.failure = Some(stderr.into());
        self
    }

    /// Sleeps for `delay` before every render.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the workspace directories renders ran in.
    #[must_use]
    pub fn render_dirs(&self) -> Vec<PathBuf> {
        self.render_dirs.lock().clone()
    }

    /// Returns how often the recovery path ran.
    #[must_use]
    pub fn execute_count(&self) -> usize {
        *self.execute_count.lock()
    }

    async fn write_all(workdir: &Path, files: &[String]) -> Result<(), RenderError> {
        for file in files {
            tokio::fs::write(workdir.join(file), b"\x89PNG fake").await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, workdir: &Path, _source_file: &Path) -> Result<(), RenderError> {
        self.render_dirs.lock().push(workdir.to_path_buf());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Self::write_all(workdir, &self.produces).await?;
        match &self.failure {
            Some(stderr) => Err(RenderError::Exit {
                status: "exit status: 1".to_string(),
                stderr: stderr.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn execute_source(&self, workdir: &Path, _source: &str) -> Result<(), RenderError> {
        *self.execute_count.lock() += 1;
        Self::write_all(workdir, &self.recovers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_and_fallback() {
        let client = ScriptedCompletionClient::new()
            .respond("one")
            .fail_transient("two")
            .respond_always("rest");
        let request = CompletionRequest::new("gpt-4", "p", 0.0);

        assert_eq!(client.complete(&request).await.unwrap(), "one");
        assert!(client.complete(&request).await.unwrap_err().is_transient());
        assert_eq!(client.complete(&request).await.unwrap(), "rest");
        assert_eq!(client.complete(&request).await.unwrap(), "rest");
        assert_eq!(client.call_count(), 4);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_terminal() {
        let client = ScriptedCompletionClient::new();
        let err = client
            .complete(&CompletionRequest::new("gpt-4", "p", 0.0))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_responder() {
        let client = ScriptedCompletionClient::new()
            .with_responder(|request| Ok(request.prompt.to_uppercase()));
        let reply = client
            .complete(&CompletionRequest::new("gpt-4", "abc", 0.0))
            .await
            .unwrap();
        assert_eq!(reply, "ABC");
    }

    #[tokio::test]
    async fn test_fake_renderer_writes_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let renderer = FakeRenderer::new().produce("graph.png").fail_with("boom");

        let err = renderer
            .render(dir.path(), &dir.path().join("graph_code.py"))
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::Exit { .. }));
        assert!(dir.path().join("graph.png").is_file());
        assert_eq!(renderer.render_dirs(), vec![dir.path().to_path_buf()]);
    }
}
