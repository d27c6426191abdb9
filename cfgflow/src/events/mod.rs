//! Event sinks for run observability.
//!
//! The sequencer, the completion invoker, the workspace manager and the
//! artifact locator report lifecycle events through an [`EventSink`]. Sinks
//! must never fail the run.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};

/// Event type names.
pub mod kinds {
    /// A stage started.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage completed with a valid payload.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A stage payload failed validation but was forwarded.
    pub const STAGE_DEGRADED: &str = "stage.degraded";
    /// A stage failed.
    pub const STAGE_FAILED: &str = "stage.failed";
    /// A completion attempt failed transiently and will be retried.
    pub const COMPLETION_RETRY: &str = "completion.retry";
    /// A workspace was created.
    pub const WORKSPACE_CREATED: &str = "workspace.created";
    /// A workspace was removed.
    pub const WORKSPACE_REMOVED: &str = "workspace.removed";
    /// An image location tier was tried.
    pub const RENDER_FALLBACK: &str = "render.fallback";
    /// An image was published.
    pub const ARTIFACT_PUBLISHED: &str = "artifact.published";
}
