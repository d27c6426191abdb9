//! Error types for the cfgflow synthesis pipeline.
//!
//! Missing templates, exhausted or rejected completions and malformed stage
//! payloads abort a run. [`CfgflowError::Rendering`] is the degradable kind:
//! the service reports it as a warning next to the graph data.

use crate::core::{Language, StageName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for cfgflow operations.
#[derive(Debug, Error)]
pub enum CfgflowError {
    /// No prompt template exists for the requested stage and language.
    #[error("{0}")]
    TemplateNotFound(#[from] TemplateNotFoundError),

    /// Transient completion failures exhausted the retry budget or deadline.
    #[error("Completion service unavailable after {attempts} attempt(s): {last_error}")]
    CompletionUnavailable {
        /// Number of attempts made.
        attempts: usize,
        /// The last transient failure observed.
        last_error: String,
    },

    /// The completion service rejected the request permanently.
    #[error("Completion failed permanently: {0}")]
    CompletionTerminal(String),

    /// A stage produced a payload that failed validation.
    #[error("{0}")]
    MalformedPayload(#[from] MalformedPayloadError),

    /// Rendering the graph program failed.
    #[error("{0}")]
    Rendering(#[from] RenderError),

    /// The incoming request is invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The run was cancelled.
    #[error("Synthesis cancelled: {0}")]
    Cancelled(String),

    /// The run exceeded its deadline.
    #[error("Synthesis exceeded its deadline of {seconds}s")]
    DeadlineExceeded {
        /// The deadline in seconds.
        seconds: f64,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CfgflowError {
    /// Returns a stable machine-readable code for the error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            Self::CompletionUnavailable { .. } => "COMPLETION_UNAVAILABLE",
            Self::CompletionTerminal(_) => "COMPLETION_TERMINAL",
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::Rendering(_) => "RENDERING_FAILURE",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Cancelled(_) => "CANCELLED",
            Self::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            Self::Config(_) => "CONFIG",
            Self::Serialization(_) => "SERIALIZATION",
            Self::Io(_) => "IO",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::MalformedPayload(err) = self {
            map.insert("stage".to_string(), serde_json::json!(err.stage));
        }
        if let Self::TemplateNotFound(err) = self {
            map.insert("stage".to_string(), serde_json::json!(err.stage));
            map.insert("language".to_string(), serde_json::json!(err.language));
        }
        map
    }
}

impl From<serde_json::Error> for CfgflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Error raised when a prompt template is missing.
#[derive(Debug, Clone, Error)]
#[error("Template not found for stage '{stage}' and language '{language}'{}", searched_suffix(.path))]
pub struct TemplateNotFoundError {
    /// The stage whose template is missing.
    pub stage: StageName,
    /// The requested language.
    pub language: Language,
    /// The location that was searched, if file-backed.
    pub path: Option<PathBuf>,
}

impl TemplateNotFoundError {
    /// Creates a new template-not-found error.
    #[must_use]
    pub fn new(stage: StageName, language: Language) -> Self {
        Self {
            stage,
            language,
            path: None,
        }
    }

    /// Sets the searched path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

fn searched_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" (looked at {})", p.display()))
        .unwrap_or_default()
}

/// Error raised when a stage payload fails its validation checkpoint.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Malformed payload from stage '{stage}': {reason}")]
pub struct MalformedPayloadError {
    /// The stage that produced the payload.
    pub stage: StageName,
    /// Why the payload was rejected.
    pub reason: String,
}

impl MalformedPayloadError {
    /// Creates a new malformed payload error.
    #[must_use]
    pub fn new(stage: StageName, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }
}

/// Failures reported by a completion client.
///
/// The invoker retries `Transient` failures and aborts on `Terminal` ones.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// Network error, rate limit, server error or undecodable response.
    #[error("transient completion failure: {0}")]
    Transient(String),

    /// Invalid credential, unsupported model or rejected request.
    #[error("terminal completion failure: {0}")]
    Terminal(String),
}

impl CompletionError {
    /// Creates a transient failure.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Creates a terminal failure.
    #[must_use]
    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal(message.into())
    }

    /// Returns true if the failure may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classifies an HTTP status code.
    ///
    /// Rate limits, timeouts, conflicts and server errors are transient;
    /// every other client error is terminal.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}: {body}");
        match status {
            408 | 409 | 429 | 500..=599 => Self::Transient(message),
            _ => Self::Terminal(message),
        }
    }
}

/// Failures reported by the rendering engine.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer process could not be spawned.
    #[error("Failed to launch renderer '{program}': {source}")]
    Launch {
        /// The program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The renderer exited unsuccessfully.
    #[error("Renderer exited with status {status}: {stderr}")]
    Exit {
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The renderer exceeded its time budget.
    #[error("Renderer timed out after {seconds}s")]
    Timeout {
        /// The timeout in seconds.
        seconds: f64,
    },

    /// The run deadline ran out before rendering finished.
    #[error("Rendering exceeded the remaining run deadline of {seconds}s")]
    OutOfTime {
        /// The time that was left for rendering, in seconds.
        seconds: f64,
    },

    /// No tier produced an image.
    #[error("no rendered image was found")]
    NoImage,

    /// Writing the graph program or waiting on the renderer failed.
    #[error("Renderer IO failure: {0}")]
    Io(#[from] std::io::Error),
}
