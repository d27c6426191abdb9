//! Per-run pipeline state and stage records.

use crate::core::{Language, StageName, StageStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timing and outcome of one executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage name.
    pub stage: StageName,
    /// Stage status.
    pub status: StageStatus,
    /// When the stage started.
    pub started_at: DateTime<Utc>,
    /// When the stage ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Length in bytes of the stripped payload.
    pub payload_len: usize,
    /// Completion attempts made.
    pub attempts: usize,
    /// Error message if the stage failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Validation warning if the payload was forwarded degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl StageRecord {
    /// Creates a running record stamped now.
    #[must_use]
    pub fn started(stage: StageName) -> Self {
        Self {
            stage,
            status: StageStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            payload_len: 0,
            attempts: 0,
            error: None,
            warning: None,
        }
    }

    /// Marks the stage as completed.
    #[must_use]
    pub fn completed(mut self, payload_len: usize, attempts: usize) -> Self {
        self.status = StageStatus::Ok;
        self.payload_len = payload_len;
        self.attempts = attempts;
        self.ended_at = Some(Utc::now());
        self
    }

    /// Marks the stage as completed with a forwarded, invalid payload.
    #[must_use]
    pub fn degraded(self, payload_len: usize, attempts: usize, warning: impl Into<String>) -> Self {
        let mut record = self.completed(payload_len, attempts);
        record.status = StageStatus::Degraded;
        record.warning = Some(warning.into());
        record
    }

    /// Marks the stage as failed.
    #[must_use]
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = StageStatus::Fail;
        self.error = Some(error.into());
        self.ended_at = Some(Utc::now());
        self
    }

    /// Marks the stage as cancelled.
    #[must_use]
    pub fn cancelled(mut self, reason: impl Into<String>) -> Self {
        self.status = StageStatus::Cancel;
        self.error = Some(reason.into());
        self.ended_at = Some(Utc::now());
        self
    }

    /// Returns the duration in milliseconds, or zero while running.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_ms(&self) -> f64 {
        self.ended_at
            .map_or(0.0, |ended| (ended - self.started_at).num_milliseconds() as f64)
    }
}

/// State of one synthesis run, filled in stage by stage.
///
/// A context belongs to exactly one run and is never shared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineContext {
    /// Run identifier used in logs and events.
    pub run_id: String,
    /// Source code as submitted.
    pub original_code: String,
    /// Source language.
    pub language: Language,
    /// Normalized code; equals `original_code` unless normalization ran.
    pub normalized_code: String,
    /// Structure stage payload.
    pub structure_description: Option<String>,
    /// Nested stage payload.
    pub nested_blocks: Option<String>,
    /// Subgraph stage payload.
    pub subgraph_fragments: Option<String>,
    /// Fusion stage payload: the raw graph statements.
    pub fusion_source: Option<String>,
    /// One record per executed stage, in order.
    #[serde(default)]
    pub stage_records: Vec<StageRecord>,
}

impl PipelineContext {
    /// Creates a context for a run.
    #[must_use]
    pub fn new(run_id: impl Into<String>, code: impl Into<String>, language: Language) -> Self {
        let code = code.into();
        Self {
            run_id: run_id.into(),
            normalized_code: code.clone(),
            original_code: code,
            language,
            structure_description: None,
            nested_blocks: None,
            subgraph_fragments: None,
            fusion_source: None,
            stage_records: Vec::new(),
        }
    }

    /// Returns the payload produced by `stage`, if it ran.
    #[must_use]
    pub fn payload(&self, stage: StageName) -> Option<&str> {
        match stage {
            StageName::Normalize => self
                .stage_records
                .iter()
                .any(|r| r.stage == StageName::Normalize && r.status.is_success())
                .then_some(self.normalized_code.as_str()),
            StageName::Structure => self.structure_description.as_deref(),
            StageName::Nested => self.nested_blocks.as_deref(),
            StageName::Subgraph => self.subgraph_fragments.as_deref(),
            StageName::Fusion => self.fusion_source.as_deref(),
        }
    }

    /// Stores the payload produced by `stage`.
    pub fn set_payload(&mut self, stage: StageName, payload: String) {
        match stage {
            StageName::Normalize => self.normalized_code = payload,
            StageName::Structure => self.structure_description = Some(payload),
            StageName::Nested => self.nested_blocks = Some(payload),
            StageName::Subgraph => self.subgraph_fragments = Some(payload),
            StageName::Fusion => self.fusion_source = Some(payload),
        }
    }

    /// Returns the warnings recorded on degraded stages.
    #[must_use]
    pub fn warnings(&self) -> Vec<&str> {
        self.stage_records
            .iter()
            .filter_map(|r| r.warning.as_deref())
            .collect()
    }
}
