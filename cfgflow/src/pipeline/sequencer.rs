//! Drives one run through its stages.

use super::context::{PipelineContext, StageRecord};
use crate::cancellation::CancellationToken;
use crate::completion::CompletionInvoker;
use crate::core::{PipelineState, StageName};
use crate::envelope::{strip, strip_fence};
use crate::errors::CfgflowError;
use crate::events::{kinds, EventSink, NoOpEventSink, PipelineEvent};
use crate::templates::{TemplateResolver, INPUT_CODE};
use crate::validation::{PayloadValidator, Verdict};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Executes `Normalize? -> Structure -> Nested -> Subgraph -> Fusion`.
///
/// Each stage resolves its template, substitutes the normalized code and the
/// previous payload, invokes the model, strips the envelope and validates the
/// result before storing it in the [`PipelineContext`].
#[derive(Clone)]
pub struct StageSequencer {
    resolver: TemplateResolver,
    invoker: CompletionInvoker,
    validator: PayloadValidator,
    event_sink: Arc<dyn EventSink>,
    cancel: Option<Arc<CancellationToken>>,
}

impl StageSequencer {
    /// Creates a sequencer with the abort policy and no event sink.
    #[must_use]
    pub fn new(resolver: TemplateResolver, invoker: CompletionInvoker) -> Self {
        Self {
            resolver,
            invoker,
            validator: PayloadValidator::default(),
            event_sink: Arc::new(NoOpEventSink),
            cancel: None,
        }
    }

    /// Sets the payload validator.
    #[must_use]
    pub fn with_validator(mut self, validator: PayloadValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the cancellation token checked between stages.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Runs every applicable stage in order.
    ///
    /// # Errors
    ///
    /// Returns the first stage error; the context keeps the records and
    /// payloads of the stages that ran.
    #[instrument(skip_all, fields(run_id = %ctx.run_id, language = %ctx.language))]
    pub async fn run(&self, ctx: &mut PipelineContext) -> Result<(), CfgflowError> {
        let mut state = PipelineState::initial(ctx.language);
        while let Some(stage) = state.stage() {
            if let Some(token) = self.cancel.as_ref().filter(|t| t.is_cancelled()) {
                let reason = token.reason().unwrap_or_else(|| "cancelled".to_string());
                ctx.stage_records
                    .push(StageRecord::started(stage).cancelled(reason.clone()));
                self.emit(kinds::STAGE_FAILED, ctx, stage, serde_json::json!({"error": reason}));
                return Err(CfgflowError::Cancelled(reason));
            }
            self.run_stage(stage, ctx).await?;
            state = state.next();
        }
        info!(stages = ctx.stage_records.len(), "Pipeline completed");
        Ok(())
    }

    /// Runs a single stage against the context.
    ///
    /// # Errors
    ///
    /// Returns template, completion, malformed-payload or cancellation errors.
    pub async fn run_stage(
        &self,
        stage: StageName,
        ctx: &mut PipelineContext,
    ) -> Result<(), CfgflowError> {
        let record = StageRecord::started(stage);
        self.emit(kinds::STAGE_STARTED, ctx, stage, serde_json::Value::Null);

        match self.execute(stage, ctx).await {
            Ok((payload, attempts, verdict)) => {
                let len = payload.len();
                ctx.set_payload(stage, payload);
                let record = match verdict {
                    Verdict::Valid => {
                        self.emit(
                            kinds::STAGE_COMPLETED,
                            ctx,
                            stage,
                            serde_json::json!({"payload_len": len, "attempts": attempts}),
                        );
                        record.completed(len, attempts)
                    }
                    Verdict::Degraded(warning) => {
                        self.emit(
                            kinds::STAGE_DEGRADED,
                            ctx,
                            stage,
                            serde_json::json!({"warning": warning}),
                        );
                        record.degraded(len, attempts, warning)
                    }
                };
                info!(stage = %stage, payload_len = len, attempts, "Stage finished");
                ctx.stage_records.push(record);
                Ok(())
            }
            Err(err) => {
                warn!(stage = %stage, error = %err, "Stage failed");
                self.emit(
                    kinds::STAGE_FAILED,
                    ctx,
                    stage,
                    serde_json::json!({"error": err.to_string(), "code": err.code()}),
                );
                let mut record = match &err {
                    CfgflowError::Cancelled(reason) => record.cancelled(reason.clone()),
                    _ => record.failed(err.to_string()),
                };
                if let CfgflowError::CompletionUnavailable { attempts, .. } = &err {
                    record.attempts = *attempts;
                }
                ctx.stage_records.push(record);
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        stage: StageName,
        ctx: &PipelineContext,
    ) -> Result<(String, usize, Verdict), CfgflowError> {
        let mut values = vec![(INPUT_CODE, ctx.normalized_code.as_str())];
        if let (Some(placeholder), Some(upstream)) = (stage.upstream_placeholder(), stage.upstream()) {
            values.push((placeholder, ctx.payload(upstream).unwrap_or_default()));
        }

        let prompt = self.resolver.render(stage, ctx.language, &values).await?;
        let completion = self.invoker.invoke(&prompt).await?;
        let payload = match stage {
            StageName::Normalize => strip_fence(&completion.text),
            _ => strip(&completion.text),
        };
        let verdict = self.validator.validate(stage, &payload)?;
        Ok((payload, completion.attempts, verdict))
    }

    fn emit(&self, event_type: &str, ctx: &PipelineContext, stage: StageName, data: serde_json::Value) {
        let data = match data {
            serde_json::Value::Object(mut map) => {
                map.insert("stage".to_string(), serde_json::json!(stage));
                serde_json::Value::Object(map)
            }
            _ => serde_json::json!({"stage": stage}),
        };
        self.event_sink
            .emit(PipelineEvent::new(event_type, ctx.run_id.clone()).with_data(data));
    }
}

impl std::fmt::Debug for StageSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageSequencer")
            .field("invoker", &self.invoker)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}
