//! Stage names and the linear pipeline state machine.

use super::Language;
use crate::templates::{INPUT_NESTED, INPUT_STRUCTURE, INPUT_SUBGRAPH};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the synthesis pipeline, each backed by its own template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Rewrites the source into a flat form (Python only).
    Normalize,
    /// Extracts the high-level structure.
    Structure,
    /// Describes the nested control regions.
    Nested,
    /// Produces per-block graph fragments.
    Subgraph,
    /// Fuses the fragments into the final graph statements.
    Fusion,
}

impl StageName {
    /// Stages in execution order.
    pub const ORDER: [Self; 5] = [
        Self::Normalize,
        Self::Structure,
        Self::Nested,
        Self::Subgraph,
        Self::Fusion,
    ];

    /// Returns the template key (`<key>_prompt.txt`).
    #[must_use]
    pub fn template_key(&self) -> &'static str {
        match self {
            Self::Normalize => "unwrap",
            Self::Structure => "structure",
            Self::Nested => "nested",
            Self::Subgraph => "subgraph",
            Self::Fusion => "fusion",
        }
    }

    /// Returns the placeholder that carries the previous stage's payload.
    ///
    /// `Normalize` and `Structure` only consume the code itself.
    #[must_use]
    pub fn upstream_placeholder(&self) -> Option<&'static str> {
        match self {
            Self::Normalize | Self::Structure => None,
            Self::Nested => Some(INPUT_STRUCTURE),
            Self::Subgraph => Some(INPUT_NESTED),
            Self::Fusion => Some(INPUT_SUBGRAPH),
        }
    }

    /// Returns the stage whose payload feeds this one.
    #[must_use]
    pub fn upstream(&self) -> Option<Self> {
        match self {
            Self::Normalize | Self::Structure => None,
            Self::Nested => Some(Self::Structure),
            Self::Subgraph => Some(Self::Nested),
            Self::Fusion => Some(Self::Subgraph),
        }
    }

    /// Returns the stage name as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::Structure => "structure",
            Self::Nested => "nested",
            Self::Subgraph => "subgraph",
            Self::Fusion => "fusion",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States of the sequencer.
///
/// Runs never branch or loop: every state has exactly one successor for a
/// given language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Optional normalization.
    Normalize,
    /// Structure extraction.
    Structure,
    /// Nested-block extraction.
    Nested,
    /// Subgraph synthesis.
    Subgraph,
    /// Fusion.
    Fusion,
    /// Terminal state.
    Done,
}

impl PipelineState {
    /// Returns the entry state for a language.
    #[must_use]
    pub fn initial(language: Language) -> Self {
        if language.requires_normalization() {
            Self::Normalize
        } else {
            Self::Structure
        }
    }

    /// Returns the successor state.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Normalize => Self::Structure,
            Self::Structure => Self::Nested,
            Self::Nested => Self::Subgraph,
            Self::Subgraph => Self::Fusion,
            Self::Fusion | Self::Done => Self::Done,
        }
    }

    /// Returns the stage executed in this state, if any.
    #[must_use]
    pub fn stage(self) -> Option<StageName> {
        match self {
            Self::Normalize => Some(StageName::Normalize),
            Self::Structure => Some(StageName::Structure),
            Self::Nested => Some(StageName::Nested),
            Self::Subgraph => Some(StageName::Subgraph),
            Self::Fusion => Some(StageName::Fusion),
            Self::Done => None,
        }
    }

    /// Returns the stages a run for `language` will execute, in order.
    #[must_use]
    pub fn plan(language: Language) -> Vec<StageName> {
        let mut stages = Vec::with_capacity(StageName::ORDER.len());
        let mut state = Self::initial(language);
        while let Some(stage) = state.stage() {
            stages.push(stage);
            state = state.next();
        }
        stages
    }
}
