//! Line scanner that turns a graph program into a [`GraphModel`].

use super::model::{GraphEdge, GraphModel, GraphNode};
use super::patterns::{classify_line, Declaration};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Returns true if any line of `source` is a recognized declaration.
#[must_use]
pub fn contains_declaration(source: &str) -> bool {
    source.lines().any(|line| classify_line(line).is_some())
}

/// Rebuilds nodes and edges from graph program text.
///
/// Extraction never fails: a panic while parsing is caught and reported as
/// [`GraphModel::failed`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphDataExtractor;

impl GraphDataExtractor {
    /// Creates an extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extracts the graph model from `source`.
    ///
    /// Every edge endpoint of the returned model is a node: with no node
    /// declarations all endpoints become nodes in first-seen order, otherwise
    /// undeclared endpoints are appended after the declared nodes. Duplicate
    /// node ids keep their first declaration.
    #[must_use]
    pub fn extract(&self, source: &str) -> GraphModel {
        match panic::catch_unwind(AssertUnwindSafe(|| build_model(source))) {
            Ok(model) => {
                debug!(
                    nodes = model.nodes.len(),
                    edges = model.edges.len(),
                    "Extracted graph data"
                );
                model
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(error = %message, "Graph data extraction failed");
                GraphModel::failed(format!("graph data extraction failed: {message}"))
            }
        }
    }
}

fn build_model(source: &str) -> GraphModel {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let mut seen = HashSet::new();

    for declaration in source.lines().filter_map(classify_line) {
        match declaration {
            Declaration::Node { id, label } => {
                if seen.insert(id.clone()) {
                    nodes.push(GraphNode::new(id, label));
                }
            }
            Declaration::Edge { source, target } => edges.push(GraphEdge::new(source, target)),
        }
    }

    for edge in &edges {
        for endpoint in [&edge.source, &edge.target] {
            if seen.insert(endpoint.clone()) {
                nodes.push(GraphNode::bare(endpoint.clone()));
            }
        }
    }

    GraphModel::new(nodes, edges)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
