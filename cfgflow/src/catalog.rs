//! Catalog of supported models, clients and languages.
//!
//! Each logical client name maps to exactly one physical endpoint; models are
//! only served by the client family that owns them.

use crate::core::Language;
use crate::errors::CfgflowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical completion client name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientName {
    /// OpenAI endpoint.
    #[default]
    Openai,
    /// DeepSeek endpoint.
    Deepseek,
}

impl ClientName {
    /// All known clients.
    pub const ALL: [Self; 2] = [Self::Openai, Self::Deepseek];

    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Deepseek => "deepseek",
        }
    }
}

impl fmt::Display for ClientName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported completion models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelId {
    /// `gpt-4`
    #[default]
    #[serde(rename = "gpt-4")]
    Gpt4,
    /// `gpt-4-turbo`
    #[serde(rename = "gpt-4-turbo")]
    Gpt4Turbo,
    /// `gpt-4o`
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    /// `gpt-3.5-turbo`
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    /// `deepseek-chat`
    #[serde(rename = "deepseek-chat")]
    DeepseekChat,
}

impl ModelId {
    /// All known models, in catalog order.
    pub const ALL: [Self; 5] = [
        Self::Gpt4,
        Self::Gpt4Turbo,
        Self::Gpt4o,
        Self::Gpt35Turbo,
        Self::DeepseekChat,
    ];

    /// Returns the model identifier sent to the endpoint.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4 => "gpt-4",
            Self::Gpt4Turbo => "gpt-4-turbo",
            Self::Gpt4o => "gpt-4o",
            Self::Gpt35Turbo => "gpt-3.5-turbo",
            Self::DeepseekChat => "deepseek-chat",
        }
    }

    /// Returns the client family that serves this model.
    #[must_use]
    pub fn default_client(&self) -> ClientName {
        if self.as_str().starts_with("gpt") {
            ClientName::Openai
        } else {
            ClientName::Deepseek
        }
    }

    /// Returns the display name, e.g. `GPT 4 TURBO`.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.as_str().to_uppercase().replace('-', " ")
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelId {
    type Err = CfgflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|model| model.as_str() == s)
            .ok_or_else(|| CfgflowError::InvalidRequest(format!("Unsupported model: {s}")))
    }
}

/// Catalog entry describing a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Wire name.
    pub name: String,
    /// Human-readable name.
    pub display_name: String,
    /// Serving client.
    pub client: ClientName,
    /// Short description.
    pub description: String,
}

/// Checks that `client` can serve `model`.
///
/// # Errors
///
/// Returns `InvalidRequest` for a mismatched pair.
pub fn check_compatibility(client: ClientName, model: ModelId) -> Result<(), CfgflowError> {
    if model.default_client() == client {
        Ok(())
    } else {
        Err(CfgflowError::InvalidRequest(match client {
            ClientName::Openai => format!("The openai client only serves GPT models, not {model}"),
            ClientName::Deepseek => {
                format!("The deepseek client only serves deepseek-chat, not {model}")
            }
        }))
    }
}

/// Returns the supported languages.
#[must_use]
pub fn supported_languages() -> Vec<Language> {
    Language::ALL.to_vec()
}

/// Returns the supported models.
#[must_use]
pub fn supported_models() -> Vec<ModelInfo> {
    ModelId::ALL
        .into_iter()
        .map(|model| ModelInfo {
            name: model.as_str().to_string(),
            display_name: model.display_name(),
            client: model.default_client(),
            description: format!("{model} model"),
        })
        .collect()
}
