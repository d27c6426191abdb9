//! Graph model types.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// A graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique identifier within one model.
    pub id: String,
    /// Display label.
    pub label: String,
}

impl GraphNode {
    /// Creates a node.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Creates a node labelled with its own id.
    #[must_use]
    pub fn bare(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
        }
    }
}

/// A directed edge.
///
/// Serialized with both `source`/`target` and `from`/`to` keys; either pair
/// is accepted when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawEdge")]
pub struct GraphEdge {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
}

impl GraphEdge {
    /// Creates an edge.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl Serialize for GraphEdge {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("GraphEdge", 4)?;
        state.serialize_field("source", &self.source)?;
        state.serialize_field("target", &self.target)?;
        state.serialize_field("from", &self.source)?;
        state.serialize_field("to", &self.target)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct RawEdge {
    source: Option<String>,
    target: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

impl TryFrom<RawEdge> for GraphEdge {
    type Error = String;

    fn try_from(raw: RawEdge) -> Result<Self, Self::Error> {
        let source = raw.source.or(raw.from).ok_or("edge has no source/from")?;
        let target = raw.target.or(raw.to).ok_or("edge has no target/to")?;
        Ok(Self { source, target })
    }
}

/// Graph kind tag carried in the serialized model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GraphKind {
    /// The only kind produced.
    #[default]
    #[serde(rename = "directed_graph")]
    Directed,
}

/// Nodes and edges recovered from a graph program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphModel {
    /// Nodes in declaration order.
    pub nodes: Vec<GraphNode>,
    /// Edges in declaration order.
    pub edges: Vec<GraphEdge>,
    /// Graph kind.
    #[serde(rename = "type", default)]
    pub kind: GraphKind,
    /// Set when extraction failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GraphModel {
    /// Creates a model.
    #[must_use]
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self {
            nodes,
            edges,
            kind: GraphKind::Directed,
            error: None,
        }
    }

    /// Creates the empty, error-tagged model returned when extraction fails.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Returns true if extraction failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Returns true if the model has neither nodes nor edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Returns true if every edge endpoint is a declared node.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.edges
            .iter()
            .all(|edge| self.node(&edge.source).is_some() && self.node(&edge.target).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_edge_serializes_both_views() {
        let value = serde_json::to_value(GraphEdge::new("s", "e")).unwrap();
        assert_eq!(value, json!({"source": "s", "target": "e", "from": "s", "to": "e"}));
    }

    #[test]
    fn test_edge_deserializes_either_view() {
        let edge: GraphEdge = serde_json::from_value(json!({"from": "a", "to": "b"})).unwrap();
        assert_eq!(edge, GraphEdge::new("a", "b"));

        let err = serde_json::from_value::<GraphEdge>(json!({"from": "a"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_model_serialization() {
        let model = GraphModel::new(vec![GraphNode::bare("a")], vec![]);
        let value = serde_json::to_value(&model).unwrap();

        assert_eq!(value["type"], "directed_graph");
        assert_eq!(value["nodes"][0]["label"], "a");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_failed_model() {
        let model = GraphModel::failed("boom");
        let value = serde_json::to_value(&model).unwrap();

        assert!(model.is_failed());
        assert_eq!(value, json!({"nodes": [], "edges": [], "type": "directed_graph", "error": "boom"}));
    }

    #[test]
    fn test_is_closed() {
        let mut model = GraphModel::new(
            vec![GraphNode::bare("a"), GraphNode::bare("b")],
            vec![GraphEdge::new("a", "b")],
        );
        assert!(model.is_closed());

        model.edges.push(GraphEdge::new("b", "c"));
        assert!(!model.is_closed());
    }
}
