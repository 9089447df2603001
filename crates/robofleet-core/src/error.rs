//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot lifecycle orchestration and read models."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::fmt;

use robofleet_common::{ContextError, EcuId, RobotId, TeamId};
use robofleet_security::KeyId;
use robofleet_store::StoreError;
use serde::Serialize;
use uuid::Uuid;

/// Result alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Who is at fault for a failed lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultClass {
    /// The request itself cannot succeed (absent robot, malformed id).
    Client,
    /// A collaborator failed; the request may succeed later or needs an operator.
    Server,
}

/// Outcome taxonomy of lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Robot absent from the caller's team (never existed, already deleted, other team).
    #[error("robot {robot_id} not found in team {team_id}")]
    NotFound { team_id: TeamId, robot_id: RobotId },
    /// Malformed caller input.
    #[error("validation failed: {0}")]
    Validation(String),
    /// A collaborator failed before anything destructive committed.
    #[error("{operation} failed: {reason}")]
    Dependency {
        operation: &'static str,
        reason: String,
    },
    /// The robot row is gone but some of its secrets or the audit trail were not handled.
    #[error(transparent)]
    PartialCleanup(#[from] PartialCleanupFailure),
}

impl LifecycleError {
    pub fn classification(&self) -> FaultClass {
        match self {
            LifecycleError::NotFound { .. } | LifecycleError::Validation(_) => FaultClass::Client,
            LifecycleError::Dependency { .. } | LifecycleError::PartialCleanup(_) => {
                FaultClass::Server
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LifecycleError::NotFound { .. })
    }

    pub(crate) fn dependency(operation: &'static str, reason: impl fmt::Display) -> Self {
        LifecycleError::Dependency {
            operation,
            reason: reason.to_string(),
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { team_id, robot_id } => {
                LifecycleError::NotFound { team_id, robot_id }
            }
            other => LifecycleError::dependency("entity store", other),
        }
    }
}

impl From<ContextError> for LifecycleError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Validation { .. } => LifecycleError::Validation(err.to_string()),
            ContextError::DeadlineExceeded => LifecycleError::dependency("entity store", err),
        }
    }
}

/// Sub-step of a deletion that runs after the robot row is gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum CleanupStep {
    KeyTeardown { ecu_id: EcuId, key_id: KeyId },
    CertificateRevocation { serial: String },
    AuditEmission,
}

impl fmt::Display for CleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupStep::KeyTeardown { ecu_id, key_id } => {
                write!(f, "key teardown for ecu {ecu_id} ({key_id})")
            }
            CleanupStep::CertificateRevocation { serial } => {
                write!(f, "revocation of certificate {serial}")
            }
            CleanupStep::AuditEmission => f.write_str("audit emission"),
        }
    }
}

/// One failed cleanup sub-step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    #[serde(flatten)]
    pub step: CleanupStep,
    pub reason: String,
}

/// Robot row deleted, cleanup incomplete. Carries what an operator needs to reconcile by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error(
    "robot {robot_id} in team {team_id} deleted with {} failed cleanup step(s) (request {request_id})",
    .failures.len()
)]
pub struct PartialCleanupFailure {
    pub robot_id: RobotId,
    pub team_id: TeamId,
    pub request_id: Uuid,
    pub failures: Vec<CleanupFailure>,
}

impl PartialCleanupFailure {
    /// Failed steps in the order they were attempted.
    pub fn steps(&self) -> impl Iterator<Item = &CleanupStep> {
        self.failures.iter().map(|failure| &failure.step)
    }

    pub fn failed_keys(&self) -> impl Iterator<Item = &KeyId> {
        self.failures.iter().filter_map(|failure| match &failure.step {
            CleanupStep::KeyTeardown { key_id, .. } => Some(key_id),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_follows_taxonomy() {
        let not_found = LifecycleError::from(StoreError::NotFound {
            team_id: TeamId::parse("t1").unwrap(),
            robot_id: RobotId::parse("r1").unwrap(),
        });
        assert!(not_found.is_not_found());
        assert_eq!(not_found.classification(), FaultClass::Client);

        let unavailable = LifecycleError::from(StoreError::Unavailable("db down".into()));
        assert!(matches!(
            unavailable,
            LifecycleError::Dependency { operation: "entity store", .. }
        ));
        assert_eq!(unavailable.classification(), FaultClass::Server);

        let deadline = LifecycleError::from(ContextError::DeadlineExceeded);
        assert_eq!(deadline.classification(), FaultClass::Server);

        let partial = LifecycleError::from(PartialCleanupFailure {
            robot_id: RobotId::parse("r1").unwrap(),
            team_id: TeamId::parse("t1").unwrap(),
            request_id: Uuid::nil(),
            failures: vec![CleanupFailure {
                step: CleanupStep::AuditEmission,
                reason: "bus offline".into(),
            }],
        });
        assert_eq!(partial.classification(), FaultClass::Server);
        assert!(partial.to_string().contains("1 failed cleanup step"));
    }

    #[test]
    fn cleanup_failure_serializes_flat() {
        let failure = CleanupFailure {
            step: CleanupStep::KeyTeardown {
                ecu_id: EcuId::parse("e1").unwrap(),
                key_id: KeyId::for_ecu(
                    &TeamId::parse("t1").unwrap(),
                    &EcuId::parse("e1").unwrap(),
                ),
            },
            reason: "timeout".into(),
        };
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["step"], "key_teardown");
        assert_eq!(value["key_id"], "t1-e1");
        assert_eq!(value["reason"], "timeout");
    }
}
