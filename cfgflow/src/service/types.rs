//! Request and result types exchanged with the transport layer.

use crate::catalog::{check_compatibility, ClientName, ModelId};
use crate::core::Language;
use crate::errors::CfgflowError;
use crate::extract::GraphModel;
use crate::pipeline::StageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest accepted sampling temperature.
pub const MAX_TEMPERATURE: f32 = 2.0;

/// A request to synthesize a control-flow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Source code to analyze.
    pub code: String,
    /// Source language.
    pub language: Language,
    /// Completion model.
    #[serde(default, alias = "model_name")]
    pub model: ModelId,
    /// Client serving the model.
    #[serde(default, alias = "client_name")]
    pub client: ClientName,
    /// Sampling temperature in `0.0..=2.0`.
    #[serde(default)]
    pub temperature: f32,
    /// Credential overriding the configured one for this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl SynthesisRequest {
    /// Creates a request served by the model's own client.
    #[must_use]
    pub fn new(code: impl Into<String>, language: Language, model: ModelId) -> Self {
        Self {
            code: code.into(),
            language,
            model,
            client: model.default_client(),
            temperature: 0.0,
            api_key: None,
        }
    }

    /// Sets the client.
    #[must_use]
    pub fn with_client(mut self, client: ClientName) -> Self {
        self.client = client;
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets a per-request credential.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Checks the request before any work is done.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for empty code, an out-of-range temperature
    /// or a client that cannot serve the model.
    pub fn validate(&self) -> Result<(), CfgflowError> {
        if self.code.trim().is_empty() {
            return Err(CfgflowError::InvalidRequest("code must not be empty".to_string()));
        }
        if !(0.0..=MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(CfgflowError::InvalidRequest(format!(
                "temperature must be between 0 and {MAX_TEMPERATURE}, got {}",
                self.temperature
            )));
        }
        check_compatibility(self.client, self.model)
    }
}

/// Outcome of a synthesis run; always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisResult {
    /// Whether the run produced a graph.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Wall-clock duration of the run.
    pub processing_time_seconds: f64,
    /// Generated graph program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_code: Option<String>,
    /// Structured graph recovered from the program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_data: Option<GraphModel>,
    /// Public URL of the rendered image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Advisory warning for degraded runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Stable error code when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Per-stage records.
    #[serde(default)]
    pub stages: Vec<StageRecord>,
}

impl SynthesisResult {
    /// Creates a failed result from an error.
    #[must_use]
    pub fn failure(error: &CfgflowError, processing_time_seconds: f64, stages: Vec<StageRecord>) -> Self {
        Self {
            success: false,
            message: format!("CFG generation failed: {error}"),
            processing_time_seconds,
            graph_code: None,
            graph_data: None,
            image_url: None,
            warning: None,
            error_code: Some(error.code().to_string()),
            stages,
        }
    }
}

/// Result of a connectivity probe against one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProbe {
    /// Probed model.
    pub model: ModelId,
    /// Client used.
    pub client: ClientName,
    /// Whether the model answered as asked.
    pub available: bool,
    /// Human-readable outcome.
    pub message: String,
    /// When the probe ran.
    pub tested_at: DateTime<Utc>,
}
