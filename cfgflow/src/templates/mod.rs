//! Prompt templates: storage seam, lookup and placeholder substitution.
//!
//! Templates live in a read-only repository keyed by `(stage, language)`.
//! The resolver maps a pipeline stage onto the right key and fills named
//! `{placeholder}` slots in a single pass.

mod repository;
mod resolver;

pub use repository::{FileTemplateRepository, InMemoryTemplateRepository, TemplateRepository};
pub use resolver::{substitute, TemplateResolver};

#[cfg(test)]
pub use repository::MockTemplateRepository;

/// Placeholder carrying the (normalized) source code.
pub const INPUT_CODE: &str = "input_code";
/// Placeholder carrying the structure description.
pub const INPUT_STRUCTURE: &str = "input_structure";
/// Placeholder carrying the nested-block description.
pub const INPUT_NESTED: &str = "input_nested";
/// Placeholder carrying the subgraph fragments.
pub const INPUT_SUBGRAPH: &str = "input_subgraph";
