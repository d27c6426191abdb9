//! Ordered tables of the call shapes recognized in graph programs.
//!
//! Only trimmed lines starting with `dot.node(` or `dot.edge(` are matched.
//! Within a table the first matching pattern wins, so the most specific
//! shapes come first.

use regex::Regex;
use std::sync::LazyLock;

const NODE_CALL: &str = "dot.node(";
const EDGE_CALL: &str = "dot.edge(";

/// A recognized declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// `dot.node(id[, label])`
    Node {
        /// Node id.
        id: String,
        /// Label; equals `id` when the call has none.
        label: String,
    },
    /// `dot.edge(source, target)`
    Edge {
        /// Source node id.
        source: String,
        /// Target node id.
        target: String,
    },
}

/// One entry of a pattern table.
#[derive(Debug)]
pub struct CallPattern {
    /// Short name, used in tests and logs.
    pub name: &'static str,
    /// Anchored pattern; group 1 and optional group 2 capture the arguments.
    pub regex: Regex,
}

impl CallPattern {
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("call pattern must compile"),
        }
    }
}

/// Node shapes, most specific first:
///
/// | name | shape |
/// |---|---|
/// | `single_id_label` | `dot.node('id', 'label'...` |
/// | `double_id_label` | `dot.node("id", "label"...` |
/// | `single_id_keyword_label` | `dot.node('id', label='label'...` |
/// | `double_id_keyword_label` | `dot.node("id", label="label"...` |
/// | `single_id` | `dot.node('id')` or `dot.node('id', ...` |
/// | `double_id` | `dot.node("id")` or `dot.node("id", ...` |
pub static NODE_PATTERNS: LazyLock<Vec<CallPattern>> = LazyLock::new(|| {
    vec![
        CallPattern::new("single_id_label", r"^dot\.node\(\s*'([^']+)'\s*,\s*'([^']+)'"),
        CallPattern::new("double_id_label", r#"^dot\.node\(\s*"([^"]+)"\s*,\s*"([^"]+)""#),
        CallPattern::new(
            "single_id_keyword_label",
            r"^dot\.node\(\s*'([^']+)'\s*,.*?\blabel\s*=\s*'([^']+)'",
        ),
        CallPattern::new(
            "double_id_keyword_label",
            r#"^dot\.node\(\s*"([^"]+)"\s*,.*?\blabel\s*=\s*"([^"]+)""#,
        ),
        CallPattern::new("single_id", r"^dot\.node\(\s*'([^']+)'\s*[,)]"),
        CallPattern::new("double_id", r#"^dot\.node\(\s*"([^"]+)"\s*[,)]"#),
    ]
});

/// Edge shapes, most specific first:
///
/// | name | shape |
/// |---|---|
/// | `single` | `dot.edge('a', 'b'...` |
/// | `double` | `dot.edge("a", "b"...` |
pub static EDGE_PATTERNS: LazyLock<Vec<CallPattern>> = LazyLock::new(|| {
    vec![
        CallPattern::new("single", r"^dot\.edge\(\s*'([^']+)'\s*,\s*'([^']+)'"),
        CallPattern::new("double", r#"^dot\.edge\(\s*"([^"]+)"\s*,\s*"([^"]+)""#),
    ]
});

/// Classifies one line of a graph program.
///
/// Returns `None` for lines that are not a recognized declaration.
#[must_use]
pub fn classify_line(line: &str) -> Option<Declaration> {
    let line = line.trim();
    if line.starts_with(NODE_CALL) {
        NODE_PATTERNS.iter().find_map(|pattern| {
            let caps = pattern.regex.captures(line)?;
            let id = caps.get(1)?.as_str().to_string();
            let label = caps
                .get(2)
                .map_or_else(|| id.clone(), |m| m.as_str().to_string());
            Some(Declaration::Node { id, label })
        })
    } else if line.starts_with(EDGE_CALL) {
        EDGE_PATTERNS.iter().find_map(|pattern| {
            let caps = pattern.regex.captures(line)?;
            Some(Declaration::Edge {
                source: caps.get(1)?.as_str().to_string(),
                target: caps.get(2)?.as_str().to_string(),
            })
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(id: &str, label: &str) -> Option<Declaration> {
        Some(Declaration::Node {
            id: id.to_string(),
            label: label.to_string(),
        })
    }

    fn edge(source: &str, target: &str) -> Option<Declaration> {
        Some(Declaration::Edge {
            source: source.to_string(),
            target: target.to_string(),
        })
    }

    fn matching_pattern(patterns: &[CallPattern], line: &str) -> Option<&'static str> {
        patterns
            .iter()
            .find(|pattern| pattern.regex.is_match(line))
            .map(|pattern| pattern.name)
    }

    #[test]
    fn test_accepted_node_shapes() {
        let corpus = [
            ("dot.node('s', 'Start')", node("s", "Start")),
            ("dot.node('s','Start', shape='box')", node("s", "Start")),
            (r#"dot.node("s", "Start")"#, node("s", "Start")),
            ("dot.node('s', label='Start')", node("s", "Start")),
            ("dot.node('s', shape='box', label='Start')", node("s", "Start")),
            (r#"dot.node("s", label="Start")"#, node("s", "Start")),
            ("dot.node('s')", node("s", "s")),
            (r#"dot.node("s")"#, node("s", "s")),
            ("    dot.node('n1', 'x = 1')  ", node("n1", "x = 1")),
            ("dot.node( 'a' , 'A' )", node("a", "A")),
        ];

        for (line, expected) in corpus {
            assert_eq!(classify_line(line), expected, "line: {line}");
        }
    }

    #[test]
    fn test_accepted_edge_shapes() {
        let corpus = [
            ("dot.edge('a', 'b')", edge("a", "b")),
            ("dot.edge('a','b', label='yes')", edge("a", "b")),
            (r#"dot.edge("a", "b")"#, edge("a", "b")),
            ("  dot.edge( 'a' ,'b' )", edge("a", "b")),
        ];

        for (line, expected) in corpus {
            assert_eq!(classify_line(line), expected, "line: {line}");
        }
    }

    #[test]
    fn test_rejected_lines() {
        let corpus = [
            "",
            "# dot.node('a')",
            "x = dot.node('a')",
            "dot.node()",
            "dot.node('')",
            "dot.node(name)",
            "dot.edge('a')",
            "dot.edges([('a', 'b')])",
            "dot.attr('node', fontname='SimSun')",
            "dot.render('graph', format='png', view=False)",
        ];

        for line in corpus {
            assert_eq!(classify_line(line), None, "line: {line}");
        }
    }

    #[test]
    fn test_pattern_precedence() {
        assert_eq!(
            matching_pattern(&NODE_PATTERNS, "dot.node('a', 'A', label='B')"),
            Some("single_id_label")
        );
        assert_eq!(
            matching_pattern(&NODE_PATTERNS, "dot.node('a', label='B')"),
            Some("single_id_keyword_label")
        );
        assert_eq!(matching_pattern(&NODE_PATTERNS, "dot.node('a')"), Some("single_id"));
        assert_eq!(
            matching_pattern(&EDGE_PATTERNS, r#"dot.edge("a", "b")"#),
            Some("double")
        );
    }
}
