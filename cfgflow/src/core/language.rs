//! Source languages accepted by the synthesis pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A programming language whose code can be turned into a CFG.
///
/// The serialized form doubles as the template directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    /// Python source.
    Python,
    /// Java source.
    Java,
    /// C source.
    C,
}

impl Language {
    /// All supported languages, in catalog order.
    pub const ALL: [Self; 3] = [Self::Python, Self::Java, Self::C];

    /// Returns the canonical name, also used as the template directory.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "Python",
            Self::Java => "Java",
            Self::C => "C",
        }
    }

    /// Returns true if code in this language is normalized before analysis.
    ///
    /// Only Python enables the unwrap stage.
    #[must_use]
    pub fn requires_normalization(&self) -> bool {
        matches!(self, Self::Python)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unsupported language: {s}"))
    }
}
