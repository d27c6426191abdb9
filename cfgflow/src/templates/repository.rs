//! Template repositories.

use crate::core::{Language, StageName};
use crate::errors::{CfgflowError, TemplateNotFoundError};
use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Read-only lookup of template text by stage and language.
///
/// `load` may block on IO. [`TemplateResolver`](super::TemplateResolver)
/// calls it on the blocking pool.
#[cfg_attr(test, mockall::automock)]
pub trait TemplateRepository: Send + Sync {
    /// Loads the template for the pair.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` when no template exists for the pair.
    fn load(&self, stage: StageName, language: Language) -> Result<String, CfgflowError>;
}

/// Repository reading `<root>/<Language>/<key>_prompt.txt` files.
#[derive(Debug, Clone)]
pub struct FileTemplateRepository {
    root: PathBuf,
}

impl FileTemplateRepository {
    /// Creates a repository rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path for a pair.
    #[must_use]
    pub fn template_path(&self, stage: StageName, language: Language) -> PathBuf {
        self.root
            .join(language.as_str())
            .join(format!("{}_prompt.txt", stage.template_key()))
    }
}

impl TemplateRepository for FileTemplateRepository {
    fn load(&self, stage: StageName, language: Language) -> Result<String, CfgflowError> {
        let path = self.template_path(stage, language);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(TemplateNotFoundError::new(stage, language).with_path(path).into())
            }
            Err(e) => Err(CfgflowError::Io(e)),
        }
    }
}

/// In-memory repository backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryTemplateRepository {
    templates: DashMap<(StageName, Language), String>,
}

impl InMemoryTemplateRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a template.
    pub fn insert(&self, stage: StageName, language: Language, template: impl Into<String>) {
        self.templates.insert((stage, language), template.into());
    }

    /// Adds a template, builder style.
    #[must_use]
    pub fn with_template(
        self,
        stage: StageName,
        language: Language,
        template: impl Into<String>,
    ) -> Self {
        self.insert(stage, language, template);
        self
    }

    /// Returns the number of stored templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if no template is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateRepository for InMemoryTemplateRepository {
    fn load(&self, stage: StageName, language: Language) -> Result<String, CfgflowError> {
        self.templates
            .get(&(stage, language))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TemplateNotFoundError::new(stage, language).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_repository_path_layout() {
        let repo = FileTemplateRepository::new("prompt");
        assert_eq!(
            repo.template_path(StageName::Nested, Language::Java),
            PathBuf::from("prompt/Java/nested_prompt.txt")
        );
        assert_eq!(
            repo.template_path(StageName::Normalize, Language::Python),
            PathBuf::from("prompt/Python/unwrap_prompt.txt")
        );
    }

    #[test]
    fn test_file_repository_loads_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("C")).unwrap();
        std::fs::write(dir.path().join("C/structure_prompt.txt"), "code: {input_code}").unwrap();

        let repo = FileTemplateRepository::new(dir.path());
        let text = repo.load(StageName::Structure, Language::C).unwrap();
        assert_eq!(text, "code: {input_code}");
    }

    #[test]
    fn test_file_repository_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileTemplateRepository::new(dir.path());

        let err = repo.load(StageName::Fusion, Language::Java).unwrap_err();
        assert_eq!(err.code(), "TEMPLATE_NOT_FOUND");
        assert!(err.to_string().contains("fusion_prompt.txt"));
    }

    #[test]
    fn test_in_memory_repository() {
        let repo = InMemoryTemplateRepository::new()
            .with_template(StageName::Structure, Language::Java, "structure");

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.load(StageName::Structure, Language::Java).unwrap(), "structure");
        assert!(repo.load(StageName::Structure, Language::C).is_err());
    }
}
