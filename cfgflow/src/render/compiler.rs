//! Wraps fusion statements into a runnable graphviz program.

use super::RenderConfig;
use std::path::Path;

/// Builds the graph program written into the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSourceCompiler {
    node_font: String,
    output_stem: String,
    output_format: String,
}

impl Default for GraphSourceCompiler {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

impl GraphSourceCompiler {
    /// Creates a compiler whose program writes `config.image_file_name`.
    #[must_use]
    pub fn from_config(config: &RenderConfig) -> Self {
        let image = Path::new(&config.image_file_name);
        Self {
            node_font: config.node_font.clone(),
            output_stem: image
                .file_stem()
                .map_or_else(|| "graph".to_string(), |s| s.to_string_lossy().into_owned()),
            output_format: image
                .extension()
                .map_or_else(|| "png".to_string(), |s| s.to_string_lossy().into_owned()),
        }
    }

    /// Returns the program header preceding the statements.
    #[must_use]
    pub fn header(&self) -> String {
        format!(
            "from graphviz import Digraph\ndot = Digraph()\ndot.attr('node', fontname='{}')\n",
            self.node_font
        )
    }

    /// Returns the render call appended after the statements.
    #[must_use]
    pub fn footer(&self) -> String {
        format!(
            "\ndot.render('{}', format='{}', view=False)",
            self.output_stem, self.output_format
        )
    }

    /// Compiles fusion statements into a complete program.
    #[must_use]
    pub fn compile(&self, fusion_source: &str) -> String {
        format!("{}{}{}", self.header(), fusion_source, self.footer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_default_program() {
        let program = GraphSourceCompiler::default().compile("dot.edge('a', 'b')");
        assert_eq!(
            program,
            "from graphviz import Digraph\n\
             dot = Digraph()\n\
             dot.attr('node', fontname='SimSun')\n\
             dot.edge('a', 'b')\n\
             dot.render('graph', format='png', view=False)"
        );
    }

    #[test]
    fn test_compile_follows_image_name() {
        let config = RenderConfig {
            image_file_name: "cfg.svg".to_string(),
            node_font: "Arial".to_string(),
            ..RenderConfig::default()
        };
        let program = GraphSourceCompiler::from_config(&config).compile("");

        assert!(program.contains("fontname='Arial'"));
        assert!(program.ends_with("dot.render('cfg', format='svg', view=False)"));
    }
}
