//! Recovery of structured graph data from a generated graph program.
//!
//! The rendered image is not machine readable, so the node/edge model handed
//! back to callers is rebuilt from the program text.

mod extractor;
mod model;
mod patterns;

pub use extractor::{contains_declaration, GraphDataExtractor};
pub use model::{GraphEdge, GraphKind, GraphModel, GraphNode};
pub use patterns::{classify_line, Declaration, EDGE_PATTERNS, NODE_PATTERNS};
