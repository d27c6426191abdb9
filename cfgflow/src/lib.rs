//! # Cfgflow
//!
//! Control-flow-graph synthesis driven by a chain of language-model stages.
//!
//! A run takes source code through up to five prompt stages
//! (`Normalize? -> Structure -> Nested -> Subgraph -> Fusion`), compiles the
//! final payload into a graph program, renders it inside an isolated
//! workspace and recovers a structured [`GraphModel`](extract::GraphModel)
//! from the program text.
//!
//! - **Bounded completions**: retries with backoff, jitter, deadlines and
//!   cooperative cancellation
//! - **Validated stages**: every payload passes a checkpoint before it is
//!   forwarded
//! - **Isolated rendering**: per-run workspaces removed on every exit path
//! - **Event-driven observability**: stage, retry, workspace and publish events
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cfgflow::prelude::*;
//!
//! let config = SynthesisConfig::load("cfgflow.json")?.apply_env_overrides();
//! let service = SynthesisService::from_config(config)?;
//!
//! let request = SynthesisRequest::new("int main() { return 0; }", Language::C, ModelId::Gpt4o);
//! let result = service.synthesize(request).await;
//! println!("{}", serde_json::to_string_pretty(&result)?);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod core;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod extract;
pub mod observability;
pub mod pipeline;
pub mod publish;
pub mod render;
pub mod service;
pub mod templates;
pub mod testing;
pub mod utils;
pub mod validation;
pub mod workspace;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::catalog::{supported_languages, supported_models, ClientName, ModelId};
    pub use crate::completion::{
        ClientRegistry, CompletionClient, CompletionInvoker, CompletionRequest, RetryConfig,
    };
    pub use crate::config::SynthesisConfig;
    pub use crate::core::{Language, StageName, StageStatus};
    pub use crate::errors::{CfgflowError, CompletionError, RenderError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::extract::{GraphDataExtractor, GraphEdge, GraphModel, GraphNode};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{PipelineContext, StageRecord, StageSequencer};
    pub use crate::publish::{Artifact, ArtifactPublisher};
    pub use crate::render::{InterpreterRenderer, RenderConfig, Renderer};
    pub use crate::service::{ModelProbe, SynthesisRequest, SynthesisResult, SynthesisService};
    pub use crate::templates::{
        FileTemplateRepository, InMemoryTemplateRepository, TemplateRepository, TemplateResolver,
    };
    pub use crate::validation::MalformedPayloadPolicy;
    pub use crate::workspace::{Workspace, WorkspaceManager};

    #[cfg(feature = "http")]
    pub use crate::completion::{OpenAiCompatibleClient, OpenAiCompatibleConfig};
}
