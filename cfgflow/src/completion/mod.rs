//! Completion capability: client seam, static client registry and the
//! retrying invoker.
//!
//! A [`CompletionClient`] performs exactly one request and classifies its
//! failure as transient or terminal. The [`CompletionInvoker`] owns the retry
//! policy, the per-invocation deadline and cancellation.

#[cfg(feature = "http")]
mod http;
mod invoker;
mod retry;

#[cfg(feature = "http")]
pub use http::{OpenAiCompatibleClient, OpenAiCompatibleConfig};
pub use invoker::{Completion, CompletionInvoker};
pub use retry::{should_retry, BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision, RetryState};

use crate::catalog::ClientName;
use crate::errors::{CfgflowError, CompletionError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A single completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier understood by the endpoint.
    pub model: String,
    /// Fully substituted prompt.
    pub prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
}

impl CompletionRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature,
        }
    }
}

/// Opaque request/response completion capability.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns a short name for logs.
    fn name(&self) -> &str;

    /// Performs one completion request.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CompletionError`]; implementations never retry.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Static mapping from logical client name to one physical endpoint.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientName, Arc<dyn CompletionClient>>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client, builder style.
    #[must_use]
    pub fn with_client(mut self, name: ClientName, client: Arc<dyn CompletionClient>) -> Self {
        self.register(name, client);
        self
    }

    /// Registers or replaces a client.
    pub fn register(&mut self, name: ClientName, client: Arc<dyn CompletionClient>) {
        self.clients.insert(name, client);
    }

    /// Returns the client registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `Config` when no client is registered for the name.
    pub fn get(&self, name: ClientName) -> Result<Arc<dyn CompletionClient>, CfgflowError> {
        self.clients
            .get(&name)
            .cloned()
            .ok_or_else(|| CfgflowError::Config(format!("No completion client registered for '{name}'")))
    }

    /// Returns the registered client names.
    #[must_use]
    pub fn names(&self) -> Vec<ClientName> {
        let mut names: Vec<_> = self.clients.keys().copied().collect();
        names.sort_by_key(ClientName::as_str);
        names
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.names())
            .finish()
    }
}
