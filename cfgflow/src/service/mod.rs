//! The synthesis entry point.
//!
//! [`SynthesisService`] validates a request, drives the stage sequencer,
//! compiles the fusion payload into a graph program, renders it inside a
//! fresh workspace and publishes the image. Every outcome is reported as a
//! [`SynthesisResult`]; only rendering problems degrade into a warning.

mod types;


pub use types::{ModelProbe, SynthesisRequest, SynthesisResult, MAX_TEMPERATURE};

use crate::cancellation::CancellationToken;
use crate::catalog::{check_compatibility, ClientName, ModelId};
use crate::completion::{ClientRegistry, CompletionClient, CompletionInvoker, RetryConfig};
use crate::config::SynthesisConfig;
use crate::errors::{CfgflowError, RenderError};
use crate::events::{EventSink, NoOpEventSink};
use crate::extract::GraphDataExtractor;
use crate::observability::SpanTimer;
use crate::pipeline::{PipelineContext, StageSequencer};
use crate::publish::{Artifact, ArtifactPublisher, ImageLocator, PublishedImage};
use crate::render::{GraphSourceCompiler, Renderer};
use crate::templates::{TemplateRepository, TemplateResolver};
use crate::utils::generate_uuid;
use crate::validation::PayloadValidator;
use crate::workspace::WorkspaceManager;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Prompt sent by [`SynthesisService::probe_model`].
pub const PROBE_PROMPT: &str = "Hello, this is a test message. Please respond with 'OK'.";

const SUCCESS_MESSAGE: &str = "CFG generated successfully";

/// Runs synthesis requests end to end.
pub struct SynthesisService {
    config: SynthesisConfig,
    resolver: TemplateResolver,
    clients: ClientRegistry,
    renderer: Arc<dyn Renderer>,
    workspaces: WorkspaceManager,
    publisher: ArtifactPublisher,
    compiler: GraphSourceCompiler,
    extractor: GraphDataExtractor,
    event_sink: Arc<dyn EventSink>,
}

impl SynthesisService {
    /// Creates a service from explicit collaborators.
    #[must_use]
    pub fn new(
        config: SynthesisConfig,
        templates: Arc<dyn TemplateRepository>,
        clients: ClientRegistry,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let workspaces = WorkspaceManager::new(
            config.ephemeral_root.clone(),
            config.assets.clone(),
        );
        let publisher =
            ArtifactPublisher::new(config.public_root.clone(), config.public_url_prefix.clone());
        let compiler = GraphSourceCompiler::from_config(&config.render);
        Self {
            resolver: TemplateResolver::new(templates),
            clients,
            renderer,
            workspaces,
            publisher,
            compiler,
            extractor: GraphDataExtractor::new(),
            event_sink: Arc::new(NoOpEventSink),
            config,
        }
    }

    /// Creates a service with file templates, HTTP clients and the
    /// interpreter renderer, all taken from `config`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if an HTTP client cannot be built.
    #[cfg(feature = "http")]
    pub fn from_config(config: SynthesisConfig) -> Result<Self, CfgflowError> {
        use crate::render::InterpreterRenderer;
        use crate::templates::FileTemplateRepository;

        let templates = Arc::new(FileTemplateRepository::new(config.templates_root.clone()));
        let clients = config.client_registry()?;
        let renderer = Arc::new(InterpreterRenderer::from_config(&config.render));
        Ok(Self::new(config, templates, clients, renderer))
    }

    /// Sets the event sink shared by every component of a run.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.workspaces = self.workspaces.with_event_sink(Arc::clone(&sink));
        self.publisher = self.publisher.with_event_sink(Arc::clone(&sink));
        self.event_sink = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Runs one request with its own cancellation token.
    pub async fn synthesize(&self, request: SynthesisRequest) -> SynthesisResult {
        self.synthesize_with_cancellation(request, Arc::new(CancellationToken::new()))
            .await
    }

    /// Runs one request, observing `cancel` between stages and retries.
    ///
    /// Running out of the run deadline during the stages fails the run.
    /// Rendering gets whatever is left; running out there only costs the
    /// image.
    #[instrument(
        skip_all,
        fields(language = %request.language, model = %request.model, client = %request.client)
    )]
    pub async fn synthesize_with_cancellation(
        &self,
        request: SynthesisRequest,
        cancel: Arc<CancellationToken>,
    ) -> SynthesisResult {
        let timer = SpanTimer::start("synthesis");
        let mut ctx = PipelineContext::new(
            generate_uuid().to_string(),
            request.code.clone(),
            request.language,
        );

        let started = Instant::now();
        let deadline = self.config.run_deadline();
        let staged = match deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.run_stages(&request, &mut ctx, &cancel))
                    .await
                {
                    Ok(staged) => staged,
                    Err(_) => Err(CfgflowError::DeadlineExceeded {
                        seconds: deadline.as_secs_f64(),
                    }),
                }
            }
            None => self.run_stages(&request, &mut ctx, &cancel).await,
        };

        let outcome = match staged {
            Ok(()) => {
                let program = self
                    .compiler
                    .compile(ctx.fusion_source.as_deref().unwrap_or_default());
                let budget = deadline.map(|deadline| deadline.saturating_sub(started.elapsed()));
                Ok(self.render_and_publish(&ctx.run_id, program, budget).await)
            }
            Err(err) => Err(err),
        };

        let elapsed = timer.elapsed_seconds();
        match outcome {
            Ok((artifact, render_warning)) => {
                let graph_data = self.extractor.extract(&artifact.generated_source);
                let mut warnings: Vec<String> =
                    ctx.warnings().into_iter().map(str::to_string).collect();
                warnings.extend(render_warning);
                info!(
                    run_id = %ctx.run_id,
                    nodes = graph_data.nodes.len(),
                    edges = graph_data.edges.len(),
                    image = artifact.public_url.is_some(),
                    elapsed_ms = timer.elapsed_ms(),
                    "Synthesis finished"
                );
                SynthesisResult {
                    success: true,
                    message: SUCCESS_MESSAGE.to_string(),
                    processing_time_seconds: elapsed,
                    graph_code: Some(artifact.generated_source),
                    graph_data: Some(graph_data),
                    image_url: artifact.public_url,
                    warning: (!warnings.is_empty()).then(|| warnings.join("; ")),
                    error_code: None,
                    stages: ctx.stage_records,
                }
            }
            Err(err) => {
                warn!(run_id = %ctx.run_id, code = err.code(), error = %err, "Synthesis failed");
                SynthesisResult::failure(&err, elapsed, ctx.stage_records)
            }
        }
    }

    /// Sends [`PROBE_PROMPT`] to `model` and reports whether it answered `OK`.
    ///
    /// The probe makes a single attempt; completion failures are reported in
    /// the probe rather than returned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an incompatible pair and `Config` if no
    /// client is available.
    pub async fn probe_model(
        &self,
        client: ClientName,
        model: ModelId,
        api_key: Option<&str>,
    ) -> Result<ModelProbe, CfgflowError> {
        check_compatibility(client, model)?;
        let mut invoker = CompletionInvoker::new(self.client_for(client, api_key)?, model.as_str())
            .with_retry(RetryConfig::new().with_max_attempts(1));
        if let Some(deadline) = self.config.invocation_deadline() {
            invoker = invoker.with_deadline(deadline);
        }

        let (available, message) = match invoker.invoke(PROBE_PROMPT).await {
            Ok(completion) if completion.text.contains("OK") => {
                (true, format!("{model} is available"))
            }
            Ok(completion) => (
                false,
                format!("{model} answered unexpectedly: {}", completion.text.trim()),
            ),
            Err(err) => (false, describe_probe_failure(&err)),
        };
        info!(%client, %model, available, "Model probed");

        Ok(ModelProbe {
            model,
            client,
            available,
            message,
            tested_at: Utc::now(),
        })
    }

    async fn run_stages(
        &self,
        request: &SynthesisRequest,
        ctx: &mut PipelineContext,
        cancel: &Arc<CancellationToken>,
    ) -> Result<(), CfgflowError> {
        request.validate()?;
        let client = self.client_for(request.client, request.api_key.as_deref())?;

        let mut invoker = CompletionInvoker::new(client, request.model.as_str())
            .with_temperature(request.temperature)
            .with_retry(self.config.retry.clone())
            .with_cancellation(Arc::clone(cancel))
            .with_event_sink(Arc::clone(&self.event_sink), ctx.run_id.clone());
        if let Some(deadline) = self.config.invocation_deadline() {
            invoker = invoker.with_deadline(deadline);
        }

        StageSequencer::new(self.resolver.clone(), invoker)
            .with_validator(PayloadValidator::new(self.config.malformed_payload_policy))
            .with_event_sink(Arc::clone(&self.event_sink))
            .with_cancellation(Arc::clone(cancel))
            .run(ctx)
            .await
    }

    /// Renders within `budget`; failures come back as a warning.
    async fn render_and_publish(
        &self,
        run_id: &str,
        program: String,
        budget: Option<Duration>,
    ) -> (Artifact, Option<String>) {
        let rendering = self.render_in_workspace(run_id, &program);
        let outcome = match budget {
            Some(budget) => tokio::time::timeout(budget, rendering)
                .await
                .unwrap_or_else(|_| {
                    Err(RenderError::OutOfTime {
                        seconds: budget.as_secs_f64(),
                    }
                    .into())
                }),
            None => rendering.await,
        };

        let artifact = Artifact::source_only(program);
        match outcome {
            Ok(image) => (artifact.with_image(image), None),
            Err(err) => {
                warn!(run_id, code = err.code(), error = %err, "Image generation failed");
                (artifact, Some(format!("image generation failed: {err}")))
            }
        }
    }

    async fn render_in_workspace(
        &self,
        run_id: &str,
        source: &str,
    ) -> Result<PublishedImage, CfgflowError> {
        self.workspaces
            .with_workspace(run_id, |dir| async move {
                let source_file = dir.join(&self.config.render.source_file_name);
                tokio::fs::write(&source_file, source).await?;

                let render_error = self.renderer.render(&dir, &source_file).await.err();
                if let Some(err) = &render_error {
                    debug!(error = %err, "Renderer reported a failure");
                }

                let locator = ImageLocator::new(
                    Arc::clone(&self.renderer),
                    self.config.render.image_file_name.clone(),
                )
                .with_event_sink(Arc::clone(&self.event_sink));
                let Some(found) = locator.locate_image(&dir, source, run_id).await else {
                    return Err(CfgflowError::Rendering(
                        render_error.unwrap_or(RenderError::NoImage),
                    ));
                };
                debug!(image = %found.path.display(), tier = ?found.tier, "Image located");
                self.publisher.publish(&found.path, run_id).await
            })
            .await
    }

    fn client_for(
        &self,
        client: ClientName,
        api_key: Option<&str>,
    ) -> Result<Arc<dyn CompletionClient>, CfgflowError> {
        match api_key.map(str::trim).filter(|key| !key.is_empty()) {
            Some(key) => self.keyed_client(client, key),
            None => self.clients.get(client),
        }
    }

    #[cfg(feature = "http")]
    fn keyed_client(
        &self,
        client: ClientName,
        api_key: &str,
    ) -> Result<Arc<dyn CompletionClient>, CfgflowError> {
        Ok(Arc::new(
            self.config.http_client(client, Some(api_key.to_string()))?,
        ))
    }

    #[cfg(not(feature = "http"))]
    fn keyed_client(
        &self,
        client: ClientName,
        _api_key: &str,
    ) -> Result<Arc<dyn CompletionClient>, CfgflowError> {
        debug!(%client, "Per-request credentials need the http feature, using the registry");
        self.clients.get(client)
    }
}

fn describe_probe_failure(err: &CfgflowError) -> String {
    let text = err.to_string();
    let lower = text.to_lowercase();
    if lower.contains("401") || lower.contains("invalid") {
        format!("Credential rejected: {text}")
    } else if ["timeout", "timed out", "deadline"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        format!("Connection timed out: {text}")
    } else {
        format!("Connection failed: {text}")
    }
}

impl std::fmt::Debug for SynthesisService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisService")
            .field("clients", &self.clients.names())
            .field("workspaces", &self.workspaces)
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}
