//! Template resolution and placeholder substitution.

use super::TemplateRepository;
use crate::core::{Language, StageName};
use crate::errors::CfgflowError;
use regex::{Captures, Regex};
use std::sync::{Arc, LazyLock};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex must compile")
});

/// Replaces every `{name}` whose name appears in `values`.
///
/// Substitution is a single pass: text inserted from `values` is never
/// scanned again, so a payload that happens to contain `{input_code}` is kept
/// verbatim. Unknown placeholders are left untouched.
#[must_use]
pub fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map_or_else(|| caps[0].to_string(), |(_, value)| (*value).to_string())
        })
        .into_owned()
}

/// Resolves stage templates for a language.
#[derive(Clone)]
pub struct TemplateResolver {
    repository: Arc<dyn TemplateRepository>,
}

impl TemplateResolver {
    /// Creates a resolver over a repository.
    #[must_use]
    pub fn new(repository: Arc<dyn TemplateRepository>) -> Self {
        Self { repository }
    }

    /// Returns the template text for a stage.
    ///
    /// The normalization template is shared and always stored under Python.
    /// The repository is read on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` when the repository has no entry.
    pub async fn resolve(
        &self,
        stage: StageName,
        language: Language,
    ) -> Result<String, CfgflowError> {
        let lookup = match stage {
            StageName::Normalize => Language::Python,
            _ => language,
        };
        let repository = Arc::clone(&self.repository);
        tokio::task::spawn_blocking(move || repository.load(stage, lookup))
            .await
            .map_err(|e| CfgflowError::Io(std::io::Error::other(e)))?
    }

    /// Resolves and substitutes in one step.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` when the repository has no entry.
    pub async fn render(
        &self,
        stage: StageName,
        language: Language,
        values: &[(&str, &str)],
    ) -> Result<String, CfgflowError> {
        let template = self.resolve(stage, language).await?;
        Ok(substitute(&template, values))
    }
}

impl std::fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResolver").finish_non_exhaustive()
    }
}
