//! Checkpoint between stripping a stage payload and forwarding it.

use crate::core::StageName;
use crate::errors::{CfgflowError, MalformedPayloadError};
use crate::extract::contains_declaration;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What to do when a stage payload fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPayloadPolicy {
    /// Stop the run with a `MalformedPayload` error.
    #[default]
    Abort,
    /// Record a warning on the stage and forward the payload anyway.
    Degrade,
}

/// Outcome of a validated payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The payload passed every check.
    Valid,
    /// The payload failed a check but the policy let it through.
    Degraded(String),
}

/// Validates stage payloads and applies the configured policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadValidator {
    policy: MalformedPayloadPolicy,
}

impl PayloadValidator {
    /// Creates a validator with the given policy.
    #[must_use]
    pub fn new(policy: MalformedPayloadPolicy) -> Self {
        Self { policy }
    }

    /// Returns the configured policy.
    #[must_use]
    pub fn policy(&self) -> MalformedPayloadPolicy {
        self.policy
    }

    /// Runs the checks for `stage` without applying the policy.
    ///
    /// # Errors
    ///
    /// Returns the first violated check.
    pub fn check(&self, stage: StageName, payload: &str) -> Result<(), MalformedPayloadError> {
        if payload.trim().is_empty() {
            return Err(MalformedPayloadError::new(stage, "payload is empty after stripping"));
        }
        if stage == StageName::Fusion && !contains_declaration(payload) {
            return Err(MalformedPayloadError::new(
                stage,
                "payload contains no recognizable node or edge declaration",
            ));
        }
        Ok(())
    }

    /// Checks `payload` and applies the policy.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload` under [`MalformedPayloadPolicy::Abort`].
    pub fn validate(&self, stage: StageName, payload: &str) -> Result<Verdict, CfgflowError> {
        match self.check(stage, payload) {
            Ok(()) => Ok(Verdict::Valid),
            Err(err) => match self.policy {
                MalformedPayloadPolicy::Abort => Err(err.into()),
                MalformedPayloadPolicy::Degrade => {
                    warn!(stage = %stage, reason = %err.reason, "Forwarding malformed payload");
                    Ok(Verdict::Degraded(err.to_string()))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_rejected() {
        let validator = PayloadValidator::default();
        let err = validator.validate(StageName::Structure, "  \n").unwrap_err();
        assert_eq!(err.code(), "MALFORMED_PAYLOAD");
    }

    #[test]
    fn test_intermediate_payload_is_opaque() {
        let validator = PayloadValidator::default();
        assert_eq!(
            validator.validate(StageName::Nested, "anything at all").unwrap(),
            Verdict::Valid
        );
    }

    #[test]
    fn test_fusion_requires_declaration() {
        let validator = PayloadValidator::default();
        assert!(validator.validate(StageName::Fusion, "no graph here").is_err());
        assert_eq!(
            validator
                .validate(StageName::Fusion, "dot.edge('a', 'b')")
                .unwrap(),
            Verdict::Valid
        );
    }

    #[test]
    fn test_degrade_policy_forwards() {
        let validator = PayloadValidator::new(MalformedPayloadPolicy::Degrade);
        match validator.validate(StageName::Fusion, "").unwrap() {
            Verdict::Degraded(warning) => assert!(warning.contains("fusion")),
            Verdict::Valid => panic!("expected a degraded verdict"),
        }
    }

    #[test]
    fn test_policy_serde() {
        let policy: MalformedPayloadPolicy = serde_json::from_str(r#""degrade""#).unwrap();
        assert_eq!(policy, MalformedPayloadPolicy::Degrade);
        assert_eq!(MalformedPayloadPolicy::default(), MalformedPayloadPolicy::Abort);
    }
}
