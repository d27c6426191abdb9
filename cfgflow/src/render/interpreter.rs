//! Renderer that runs graph programs through an external interpreter.

use super::{RenderConfig, Renderer};
use crate::errors::RenderError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `<interpreter> <source_file>` with the workspace as working directory.
#[derive(Debug, Clone)]
pub struct InterpreterRenderer {
    interpreter: String,
    timeout: Duration,
}

impl InterpreterRenderer {
    /// Creates a renderer.
    #[must_use]
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    /// Creates a renderer from settings.
    #[must_use]
    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(
            config.interpreter.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }
}

#[async_trait]
impl Renderer for InterpreterRenderer {
    async fn render(&self, workdir: &Path, source_file: &Path) -> Result<(), RenderError> {
        debug!(
            interpreter = %self.interpreter,
            workspace = %workdir.display(),
            source = %source_file.display(),
            "Rendering graph program"
        );

        let child = Command::new(&self.interpreter)
            .arg(source_file)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Launch {
                program: self.interpreter.clone(),
                source,
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::Timeout {
                seconds: self.timeout.as_secs_f64(),
            })??;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = %output.status, stderr = %stderr, "Renderer exited unsuccessfully");
            Err(RenderError::Exit {
                status: output.status.to_string(),
                stderr,
            })
        }
    }
}
