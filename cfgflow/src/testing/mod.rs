//! Test doubles and fixtures for synthesis runs.
//!
//! - [`ScriptedCompletionClient`] replays canned completions and records requests
//! - [`FakeRenderer`] drops image files into the workspace instead of rendering
//! - fixtures for template sets and sample graph programs
//! - assertions over graph models and stage records

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_graph_closed, assert_stage_statuses};
pub use fixtures::{full_template_set, write_template_tree, SAMPLE_FUSION, SAMPLE_FUSION_EDGES_ONLY};
pub use mocks::{FakeRenderer, ScriptedCompletionClient};
