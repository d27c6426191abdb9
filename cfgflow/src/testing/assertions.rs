//! Assertions over synthesis output.

use crate::core::{StageName, StageStatus};
use crate::extract::GraphModel;
use crate::pipeline::StageRecord;

/// Asserts that every edge endpoint of `model` is a declared node.
pub fn assert_graph_closed(model: &GraphModel) {
    for edge in &model.edges {
        for endpoint in [&edge.source, &edge.target] {
            assert!(
                model.node(endpoint).is_some(),
                "Edge endpoint '{endpoint}' missing from nodes {:?}",
                model.nodes.iter().map(|n| &n.id).collect::<Vec<_>>()
            );
        }
    }
}

/// Asserts the sequence of stage names and statuses.
pub fn assert_stage_statuses(records: &[StageRecord], expected: &[(StageName, StageStatus)]) {
    let actual: Vec<_> = records.iter().map(|r| (r.stage, r.status)).collect();
    assert_eq!(actual, expected, "Unexpected stage records");
}
