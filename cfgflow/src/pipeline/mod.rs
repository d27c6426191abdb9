//! The staged synthesis pipeline.
//!
//! [`StageSequencer`] owns the linear state machine; [`PipelineContext`]
//! carries one run's payloads and per-stage records.

mod context;
mod sequencer;

pub use context::{PipelineContext, StageRecord};
pub use sequencer::StageSequencer;
