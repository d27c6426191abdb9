//! Bounded, cancellable invocation of a completion client.

use super::retry::{should_retry, RetryConfig, RetryDecision, RetryState};
use super::{CompletionClient, CompletionRequest};
use crate::cancellation::CancellationToken;
use crate::errors::{CfgflowError, CompletionError};
use crate::events::{kinds, EventSink, NoOpEventSink, PipelineEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A successful completion and the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Raw response text.
    pub text: String,
    /// Attempts made, including the successful one.
    pub attempts: usize,
}

/// Sends prompts to one client, retrying transient failures.
///
/// The loop is bounded three ways: the attempt budget of the [`RetryConfig`],
/// the optional per-invocation deadline, and the cancellation token, which is
/// checked before every attempt and interrupts backoff sleeps.
#[derive(Clone)]
pub struct CompletionInvoker {
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f32,
    retry: RetryConfig,
    deadline: Option<Duration>,
    cancel: Option<Arc<CancellationToken>>,
    event_sink: Arc<dyn EventSink>,
    run_id: String,
}

impl CompletionInvoker {
    /// Creates an invoker with the default retry policy and no deadline.
    #[must_use]
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.0,
            retry: RetryConfig::default(),
            deadline: None,
            cancel: None,
            event_sink: Arc::new(NoOpEventSink),
            run_id: String::new(),
        }
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Bounds every invocation by a wall-clock deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sets the event sink and the run id stamped on emitted events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>, run_id: impl Into<String>) -> Self {
        self.event_sink = sink;
        self.run_id = run_id.into();
        self
    }

    /// Returns the model identifier sent with each request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends `prompt` and returns the raw response text.
    ///
    /// # Errors
    ///
    /// - `Cancelled` when the token fires before or between attempts.
    /// - `CompletionTerminal` on the first terminal failure.
    /// - `CompletionUnavailable` when attempts or the deadline run out.
    pub async fn invoke(&self, prompt: &str) -> Result<Completion, CfgflowError> {
        let request = CompletionRequest::new(self.model.clone(), prompt, self.temperature);
        let started = Instant::now();
        let mut state = RetryState::new();

        loop {
            self.check_cancelled()?;

            let remaining = match self.remaining(started) {
                Some(remaining) if remaining.is_zero() => {
                    return Err(unavailable(&state, "deadline exceeded before attempt"));
                }
                other => other,
            };

            state.record_attempt();
            let attempt = state.attempt;
            debug!(client = self.client.name(), model = %self.model, attempt, "Sending completion request");

            let outcome = match remaining {
                Some(remaining) => tokio::time::timeout(remaining, self.client.complete(&request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(CompletionError::transient("completion attempt hit the invocation deadline"))
                    }),
                None => self.client.complete(&request).await,
            };

            let last_error = match outcome {
                Ok(text) => return Ok(Completion { text, attempts: attempt }),
                Err(CompletionError::Terminal(message)) => {
                    warn!(client = self.client.name(), attempt, error = %message, "Completion rejected");
                    return Err(CfgflowError::CompletionTerminal(message));
                }
                Err(CompletionError::Transient(message)) => message,
            };

            let delay = match should_retry(&mut state, &self.retry) {
                RetryDecision::Retry(delay) => delay,
                RetryDecision::GiveUp => return Err(unavailable(&state, last_error)),
            };

            if let Some(remaining) = self.remaining(started) {
                if delay >= remaining {
                    return Err(unavailable(&state, last_error));
                }
            }

            warn!(
                client = self.client.name(),
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %last_error,
                "Transient completion failure, retrying"
            );
            self.event_sink.emit(
                PipelineEvent::new(kinds::COMPLETION_RETRY, self.run_id.clone()).with_data(
                    serde_json::json!({
                        "attempt": attempt,
                        "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "error": last_error,
                    }),
                ),
            );

            self.sleep(delay).await?;
        }
    }

    fn remaining(&self, started: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_sub(started.elapsed()))
    }

    fn check_cancelled(&self) -> Result<(), CfgflowError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(cancelled(token)),
            _ => Ok(()),
        }
    }

    async fn sleep(&self, delay: Duration) -> Result<(), CfgflowError> {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    () = tokio::time::sleep(delay) => Ok(()),
                    () = token.cancelled() => Err(cancelled(token)),
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for CompletionInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionInvoker")
            .field("client", &self.client.name())
            .field("model", &self.model)
            .field("retry", &self.retry)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

fn unavailable(state: &RetryState, last_error: impl Into<String>) -> CfgflowError {
    CfgflowError::CompletionUnavailable {
        attempts: state.attempt,
        last_error: last_error.into(),
    }
}

fn cancelled(token: &CancellationToken) -> CfgflowError {
    CfgflowError::Cancelled(token.reason().unwrap_or_else(|| "cancelled".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::JitterStrategy;
    use crate::events::CollectingEventSink;
    use crate::testing::ScriptedCompletionClient;
    use pretty_assertions::assert_eq;

    fn fast_retry(max_attempts: usize) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(max_attempts)
            .with_base_delay_ms(10)
            .with_jitter(JitterStrategy::None)
    }

    #[tokio::test]
    async fn test_invoke_success_first_attempt() {
        let client = Arc::new(ScriptedCompletionClient::new().respond("graph"));
        let invoker = CompletionInvoker::new(client.clone(), "gpt-4").with_temperature(0.5);

        let completion = invoker.invoke("prompt").await.unwrap();

        assert_eq!(completion.text, "graph");
        assert_eq!(completion.attempts, 1);
        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gpt-4");
        assert_eq!(requests[0].prompt, "prompt");
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_retries_transient_then_succeeds() {
        let client = Arc::new(
            ScriptedCompletionClient::new()
                .fail_transient("rate limited")
                .fail_transient("rate limited")
                .respond("ok"),
        );
        let sink = Arc::new(CollectingEventSink::new());
        let invoker = CompletionInvoker::new(client.clone(), "gpt-4")
            .with_retry(fast_retry(5))
            .with_event_sink(sink.clone(), "run-1");

        let completion = invoker.invoke("prompt").await.unwrap();

        assert_eq!(completion.attempts, 3);
        assert_eq!(client.call_count(), 3);
        assert_eq!(sink.events_of_type(kinds::COMPLETION_RETRY).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_exhausts_attempts() {
        let client = Arc::new(ScriptedCompletionClient::new().fail_transient_always("503"));
        let invoker = CompletionInvoker::new(client.clone(), "gpt-4").with_retry(fast_retry(3));

        let err = invoker.invoke("prompt").await.unwrap_err();

        match err {
            CfgflowError::CompletionUnavailable { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "503");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_invoke_terminal_aborts_immediately() {
        let client = Arc::new(
            ScriptedCompletionClient::new()
                .fail_terminal("invalid api key")
                .respond("never"),
        );
        let invoker = CompletionInvoker::new(client.clone(), "gpt-4").with_retry(fast_retry(5));

        let err = invoker.invoke("prompt").await.unwrap_err();

        assert_eq!(err.code(), "COMPLETION_TERMINAL");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_deadline_bounds_retries() {
        let client = Arc::new(ScriptedCompletionClient::new().fail_transient_always("busy"));
        let invoker = CompletionInvoker::new(client.clone(), "gpt-4")
            .with_retry(
                RetryConfig::new()
                    .with_max_attempts(100)
                    .with_base_delay_ms(1000)
                    .with_backoff(crate::completion::BackoffStrategy::Constant)
                    .with_jitter(JitterStrategy::None),
            )
            .with_deadline(Duration::from_millis(2500));

        let err = invoker.invoke("prompt").await.unwrap_err();

        assert_eq!(err.code(), "COMPLETION_UNAVAILABLE");
        assert!(client.call_count() <= 3);
    }

    #[tokio::test]
    async fn test_invoke_cancelled_before_attempt() {
        let client = Arc::new(ScriptedCompletionClient::new().respond("ok"));
        let token = Arc::new(CancellationToken::new());
        token.cancel("client went away");
        let invoker = CompletionInvoker::new(client.clone(), "gpt-4").with_cancellation(token);

        let err = invoker.invoke("prompt").await.unwrap_err();

        assert!(matches!(err, CfgflowError::Cancelled(ref reason) if reason == "client went away"));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_cancel_interrupts_backoff() {
        let client = Arc::new(ScriptedCompletionClient::new().fail_transient_always("busy"));
        let token = Arc::new(CancellationToken::new());
        let invoker = CompletionInvoker::new(client.clone(), "gpt-4")
            .with_retry(
                RetryConfig::new()
                    .with_base_delay_ms(60_000)
                    .with_max_delay_ms(60_000)
                    .with_jitter(JitterStrategy::None),
            )
            .with_cancellation(token.clone());

        let handle = tokio::spawn(async move { invoker.invoke("prompt").await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel("shutdown");

        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.code(), "CANCELLED");
        assert_eq!(client.call_count(), 1);
    }
}
