//! Template sets and sample graph programs.

use crate::core::{Language, StageName};
use crate::templates::InMemoryTemplateRepository;
use std::io;
use std::path::Path;

/// Fusion payload with declared nodes.
pub const SAMPLE_FUSION: &str = "dot.node('s','Start')\ndot.node('e','End')\ndot.edge('s','e')";

/// Fusion payload with edges only.
pub const SAMPLE_FUSION_EDGES_ONLY: &str = "dot.edge('a','b')\ndot.edge('b','c')";

fn template_text(stage: StageName, language: Language) -> String {
    let mut text = format!("{} {}: {{input_code}}", stage.template_key(), language);
    if let Some(placeholder) = stage.upstream_placeholder() {
        text.push_str(&format!(" | {{{placeholder}}}"));
    }
    text
}

/// Returns a repository with a template for every stage and language.
///
/// Each template reads `<key> <Language>: {input_code}` followed by
/// ` | {<upstream placeholder>}` where the stage has one, which makes the
/// prompts sent by a run easy to assert on.
#[must_use]
pub fn full_template_set() -> InMemoryTemplateRepository {
    let repo = InMemoryTemplateRepository::new();
    repo.insert(
        StageName::Normalize,
        Language::Python,
        template_text(StageName::Normalize, Language::Python),
    );
    for language in Language::ALL {
        for stage in StageName::ORDER.into_iter().skip(1) {
            repo.insert(stage, language, template_text(stage, language));
        }
    }
    repo
}

/// Writes the same template set as files under `root`.
///
/// # Errors
///
/// Returns any IO error from creating the tree.
pub fn write_template_tree(root: &Path) -> io::Result<()> {
    let normalize = root.join(Language::Python.as_str());
    std::fs::create_dir_all(&normalize)?;
    std::fs::write(
        normalize.join(format!("{}_prompt.txt", StageName::Normalize.template_key())),
        template_text(StageName::Normalize, Language::Python),
    )?;
    for language in Language::ALL {
        let dir = root.join(language.as_str());
        std::fs::create_dir_all(&dir)?;
        for stage in StageName::ORDER.into_iter().skip(1) {
            std::fs::write(
                dir.join(format!("{}_prompt.txt", stage.template_key())),
                template_text(stage, language),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{FileTemplateRepository, TemplateRepository};

    #[test]
    fn test_full_template_set_shape() {
        let repo = full_template_set();
        assert_eq!(repo.len(), 1 + 4 * Language::ALL.len());
        assert_eq!(
            repo.load(StageName::Fusion, Language::C).unwrap(),
            "fusion C: {input_code} | {input_subgraph}"
        );
    }

    #[test]
    fn test_template_tree_matches_in_memory_set() {
        let dir = tempfile::TempDir::new().unwrap();
        write_template_tree(dir.path()).unwrap();
        let files = FileTemplateRepository::new(dir.path());
        let memory = full_template_set();

        for language in Language::ALL {
            for stage in StageName::ORDER.into_iter().skip(1) {
                assert_eq!(
                    files.load(stage, language).unwrap(),
                    memory.load(stage, language).unwrap()
                );
            }
        }
    }
}
