//! Core domain model types for cfgflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Source languages and their gating rules
//! - Stage names, template keys and the pipeline state machine
//! - Stage status values

mod language;
mod stage;
mod status;

pub use language::Language;
pub use stage::{PipelineState, StageName};
pub use status::StageStatus;
