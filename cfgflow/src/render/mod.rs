//! Compiling fusion payloads into graph programs and rendering them.
//!
//! The [`Renderer`] always receives the workspace directory explicitly and
//! runs with it as the child's working directory. Whether rendering worked is
//! decided by the caller looking for the image, not by the exit status alone.

mod compiler;
mod interpreter;

pub use compiler::GraphSourceCompiler;
pub use interpreter::InterpreterRenderer;

use crate::errors::RenderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File the recovery path writes a re-executed program to.
pub const RECOVERY_SOURCE_FILE: &str = "graph_code_recovery.py";

/// Rendering settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Interpreter used to run graph programs.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Time budget per render.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Name of the generated program inside the workspace.
    #[serde(default = "default_source_file_name")]
    pub source_file_name: String,
    /// Name of the image the program writes.
    #[serde(default = "default_image_file_name")]
    pub image_file_name: String,
    /// Font applied to every node.
    #[serde(default = "default_node_font")]
    pub node_font: String,
}

fn default_interpreter() -> String {
    "python".to_string()
}

fn default_timeout_seconds() -> u64 {
    120
}

fn default_source_file_name() -> String {
    "graph_code.py".to_string()
}

fn default_image_file_name() -> String {
    "graph.png".to_string()
}

fn default_node_font() -> String {
    "SimSun".to_string()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            timeout_seconds: default_timeout_seconds(),
            source_file_name: default_source_file_name(),
            image_file_name: default_image_file_name(),
            node_font: default_node_font(),
        }
    }
}

impl RenderConfig {
    /// Sets the interpreter.
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Sets the render timeout.
    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Engine that turns a graph program into an image inside a workspace.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Runs the program at `source_file` with `workdir` as working directory.
    ///
    /// # Errors
    ///
    /// Returns launch, exit-status and timeout failures.
    async fn render(&self, workdir: &Path, source_file: &Path) -> Result<(), RenderError>;

    /// Executes `source` directly; the last-resort recovery path.
    ///
    /// The default writes [`RECOVERY_SOURCE_FILE`] into `workdir` and renders it.
    ///
    /// # Errors
    ///
    /// Same as [`Renderer::render`], plus write failures.
    async fn execute_source(&self, workdir: &Path, source: &str) -> Result<(), RenderError> {
        let path = workdir.join(RECOVERY_SOURCE_FILE);
        tokio::fs::write(&path, source).await?;
        self.render(workdir, &path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_config_defaults() {
        let config: RenderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.interpreter, "python");
        assert_eq!(config.image_file_name, "graph.png");
        assert_eq!(config.node_font, "SimSun");
    }
}
