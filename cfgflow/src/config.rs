//! Service configuration.
//!
//! Every field has a serde default, so a partial JSON file (or `{}`) is a
//! valid configuration. Selected paths can be overridden from the
//! environment with [`SynthesisConfig::apply_env_overrides`].

use crate::catalog::ClientName;
use crate::completion::RetryConfig;
use crate::errors::CfgflowError;
use crate::render::RenderConfig;
use crate::validation::MalformedPayloadPolicy;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `templates_root`.
pub const ENV_TEMPLATES_ROOT: &str = "CFGFLOW_TEMPLATES_ROOT";
/// Overrides `ephemeral_root`.
pub const ENV_EPHEMERAL_ROOT: &str = "CFGFLOW_EPHEMERAL_ROOT";
/// Overrides `public_root`.
pub const ENV_PUBLIC_ROOT: &str = "CFGFLOW_PUBLIC_ROOT";
/// Overrides `render.interpreter`.
pub const ENV_INTERPRETER: &str = "CFGFLOW_INTERPRETER";

/// One completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEndpoint {
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Inline credential; takes precedence over `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_client_timeout")]
    pub timeout_seconds: u64,
}

fn default_client_timeout() -> u64 {
    120
}

impl ClientEndpoint {
    /// Creates an endpoint reading its key from `api_key_env`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key_env: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            api_key_env: Some(api_key_env.into()),
            timeout_seconds: default_client_timeout(),
        }
    }

    /// Returns the credential, inline first, then from the environment.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
                .filter(|key| !key.trim().is_empty())
        })
    }
}

/// Configuration of a [`SynthesisService`](crate::service::SynthesisService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Root of the prompt templates.
    #[serde(default = "default_templates_root")]
    pub templates_root: PathBuf,
    /// Parent of the per-run workspaces.
    #[serde(default = "default_ephemeral_root")]
    pub ephemeral_root: PathBuf,
    /// Directory published images are copied into.
    #[serde(default = "default_public_root")]
    pub public_root: PathBuf,
    /// URL prefix under which `public_root` is served.
    #[serde(default = "default_public_url_prefix")]
    pub public_url_prefix: String,
    /// Files and directories copied into every workspace.
    #[serde(default = "default_assets")]
    pub assets: Vec<PathBuf>,
    /// Completion retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Deadline for the stages of a run, rendering gets the rest; 0 disables it.
    #[serde(default = "default_run_deadline_seconds")]
    pub run_deadline_seconds: u64,
    /// Deadline for one completion invocation including retries; 0 disables it.
    #[serde(default = "default_invocation_deadline_seconds")]
    pub invocation_deadline_seconds: u64,
    /// Rendering settings.
    #[serde(default)]
    pub render: RenderConfig,
    /// Completion endpoints by logical client name.
    #[serde(default = "default_clients")]
    pub clients: HashMap<ClientName, ClientEndpoint>,
    /// What to do with payloads that fail validation.
    #[serde(default)]
    pub malformed_payload_policy: MalformedPayloadPolicy,
}

fn default_templates_root() -> PathBuf {
    PathBuf::from("prompt")
}

fn default_ephemeral_root() -> PathBuf {
    std::env::temp_dir().join("cfgflow")
}

fn default_public_root() -> PathBuf {
    PathBuf::from("static")
}

fn default_public_url_prefix() -> String {
    "/static".to_string()
}

fn default_assets() -> Vec<PathBuf> {
    vec![
        PathBuf::from("prompt"),
        PathBuf::from("config.yaml"),
        PathBuf::from("util"),
    ]
}

fn default_run_deadline_seconds() -> u64 {
    600
}

fn default_invocation_deadline_seconds() -> u64 {
    180
}

fn default_clients() -> HashMap<ClientName, ClientEndpoint> {
    HashMap::from([
        (
            ClientName::Openai,
            ClientEndpoint::new("https://api.openai.com/v1", "OPENAI_API_KEY"),
        ),
        (
            ClientName::Deepseek,
            ClientEndpoint::new("https://api.deepseek.com/v1", "DEEPSEEK_API_KEY"),
        ),
    ])
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            templates_root: default_templates_root(),
            ephemeral_root: default_ephemeral_root(),
            public_root: default_public_root(),
            public_url_prefix: default_public_url_prefix(),
            assets: default_assets(),
            retry: RetryConfig::default(),
            run_deadline_seconds: default_run_deadline_seconds(),
            invocation_deadline_seconds: default_invocation_deadline_seconds(),
            render: RenderConfig::default(),
            clients: default_clients(),
            malformed_payload_policy: MalformedPayloadPolicy::default(),
        }
    }
}

impl SynthesisConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed; the error names the file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Applies the `CFGFLOW_*` environment overrides.
    #[must_use]
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides from an arbitrary lookup; empty values are ignored.
    #[must_use]
    pub fn apply_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(value) = get(ENV_TEMPLATES_ROOT) {
            self.templates_root = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_EPHEMERAL_ROOT) {
            self.ephemeral_root = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_PUBLIC_ROOT) {
            self.public_root = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_INTERPRETER) {
            self.render.interpreter = value;
        }
        self
    }

    /// Sets the templates root.
    #[must_use]
    pub fn with_templates_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.templates_root = root.into();
        self
    }

    /// Sets the ephemeral root.
    #[must_use]
    pub fn with_ephemeral_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.ephemeral_root = root.into();
        self
    }

    /// Sets the public root.
    #[must_use]
    pub fn with_public_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.public_root = root.into();
        self
    }

    /// Sets the workspace assets.
    #[must_use]
    pub fn with_assets(mut self, assets: Vec<PathBuf>) -> Self {
        self.assets = assets;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the run deadline in seconds; 0 disables it.
    #[must_use]
    pub fn with_run_deadline_seconds(mut self, seconds: u64) -> Self {
        self.run_deadline_seconds = seconds;
        self
    }

    /// Sets the per-invocation deadline in seconds; 0 disables it.
    #[must_use]
    pub fn with_invocation_deadline_seconds(mut self, seconds: u64) -> Self {
        self.invocation_deadline_seconds = seconds;
        self
    }

    /// Sets the render settings.
    #[must_use]
    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// Sets the malformed payload policy.
    #[must_use]
    pub fn with_malformed_payload_policy(mut self, policy: MalformedPayloadPolicy) -> Self {
        self.malformed_payload_policy = policy;
        self
    }

    /// Returns the run deadline, if enabled.
    #[must_use]
    pub fn run_deadline(&self) -> Option<Duration> {
        (self.run_deadline_seconds > 0).then(|| Duration::from_secs(self.run_deadline_seconds))
    }

    /// Returns the per-invocation deadline, if enabled.
    #[must_use]
    pub fn invocation_deadline(&self) -> Option<Duration> {
        (self.invocation_deadline_seconds > 0)
            .then(|| Duration::from_secs(self.invocation_deadline_seconds))
    }

    /// Returns the endpoint configured for `client`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the client has no endpoint.
    pub fn endpoint(&self, client: ClientName) -> Result<&ClientEndpoint, CfgflowError> {
        self.clients
            .get(&client)
            .ok_or_else(|| CfgflowError::Config(format!("No endpoint configured for '{client}'")))
    }

    /// Builds the HTTP client for `client`, optionally with a caller-supplied key.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an unknown client or an unbuildable HTTP client.
    #[cfg(feature = "http")]
    pub fn http_client(
        &self,
        client: ClientName,
        api_key_override: Option<String>,
    ) -> Result<crate::completion::OpenAiCompatibleClient, CfgflowError> {
        use crate::completion::{OpenAiCompatibleClient, OpenAiCompatibleConfig};

        let endpoint = self.endpoint(client)?;
        OpenAiCompatibleClient::new(OpenAiCompatibleConfig {
            base_url: endpoint.base_url.clone(),
            api_key: api_key_override.or_else(|| endpoint.resolve_api_key()),
            timeout_secs: endpoint.timeout_seconds,
            provider_name: client.as_str().to_string(),
        })
    }

    /// Builds a registry with one HTTP client per configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `Config` if an HTTP client cannot be built.
    #[cfg(feature = "http")]
    pub fn client_registry(&self) -> Result<crate::completion::ClientRegistry, CfgflowError> {
        let mut registry = crate::completion::ClientRegistry::new();
        for name in self.clients.keys() {
            registry.register(*name, std::sync::Arc::new(self.http_client(*name, None)?));
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_json_is_default() {
        let config: SynthesisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SynthesisConfig::default());
        assert_eq!(config.public_url_prefix, "/static");
        assert_eq!(config.run_deadline(), Some(Duration::from_secs(600)));
        assert_eq!(config.invocation_deadline(), Some(Duration::from_secs(180)));
        assert_eq!(config.malformed_payload_policy, MalformedPayloadPolicy::Abort);
        assert_eq!(config.clients.len(), 2);
    }

    #[test]
    fn test_partial_json() {
        let config: SynthesisConfig = serde_json::from_str(
            r#"{
                "run_deadline_seconds": 0,
                "retry": {"max_attempts": 2},
                "render": {"interpreter": "python3"},
                "clients": {"deepseek": {"base_url": "http://localhost:8000/v1", "api_key": "k"}},
                "malformed_payload_policy": "degrade"
            }"#,
        )
        .unwrap();

        assert_eq!(config.run_deadline(), None);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.render.interpreter, "python3");
        assert_eq!(config.render.image_file_name, "graph.png");
        assert_eq!(config.clients.len(), 1);
        assert_eq!(
            config.endpoint(ClientName::Deepseek).unwrap().resolve_api_key().as_deref(),
            Some("k")
        );
        assert!(config.endpoint(ClientName::Openai).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"public_url_prefix": "/img"}}"#).unwrap();

        let config = SynthesisConfig::load(file.path()).unwrap();
        assert_eq!(config.public_url_prefix, "/img");
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = SynthesisConfig::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains(&file.path().display().to_string()));

        assert!(SynthesisConfig::load("/definitely/not/here.json").is_err());
    }

    #[test]
    fn test_overrides() {
        let config = SynthesisConfig::default().apply_overrides_from(|name| match name {
            ENV_TEMPLATES_ROOT => Some("/srv/prompt".to_string()),
            ENV_INTERPRETER => Some("python3".to_string()),
            ENV_PUBLIC_ROOT => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.templates_root, PathBuf::from("/srv/prompt"));
        assert_eq!(config.render.interpreter, "python3");
        assert_eq!(config.public_root, PathBuf::from("static"));
    }
}
