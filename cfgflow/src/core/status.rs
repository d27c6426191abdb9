//! Outcome of one stage in a run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a stage record stands.
///
/// Records start `Running` and end in exactly one of the other states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage is waiting on the model.
    #[default]
    Running,
    /// The payload passed validation.
    Ok,
    /// The payload failed validation and was forwarded under the degrade policy.
    Degraded,
    /// The stage aborted the run.
    Fail,
    /// The run was cancelled before or during the stage.
    Cancel,
}

impl StageStatus {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Returns true if the stage left a payload for the next one.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::Degraded)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
