//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot lifecycle orchestration and read models."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// How a deletion request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    NotFound,
    PartialCleanup,
    DependencyFailure,
}

impl DeletionOutcome {
    fn label(self) -> &'static str {
        match self {
            DeletionOutcome::Deleted => "deleted",
            DeletionOutcome::NotFound => "not_found",
            DeletionOutcome::PartialCleanup => "partial_cleanup",
            DeletionOutcome::DependencyFailure => "dependency_failure",
        }
    }
}

/// Result of the certificate revocation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationResult {
    Revoked,
    AlreadyRevoked,
    Failed,
}

impl RevocationResult {
    fn label(self) -> &'static str {
        match self {
            RevocationResult::Revoked => "revoked",
            RevocationResult::AlreadyRevoked => "already_revoked",
            RevocationResult::Failed => "failed",
        }
    }
}

/// Robot lifecycle metrics exported via Prometheus.
#[derive(Clone)]
pub struct LifecycleMetrics {
    registry: Arc<Registry>,
    robot_deletions_total: IntCounterVec,
    key_teardown_failures_total: IntCounter,
    certificate_revocations_total: IntCounterVec,
}

impl LifecycleMetrics {
    /// Register metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> anyhow::Result<Self> {
        let robot_deletions_total = IntCounterVec::new(
            Opts::new(
                "robofleet_robot_deletions_total",
                "Robot deletion requests by outcome",
            ),
            &["outcome"],
        )?;
        let key_teardown_failures_total = IntCounter::new(
            "robofleet_key_teardown_failures_total",
            "ECU key pairs that could not be deleted after their robot was removed",
        )?;
        let certificate_revocations_total = IntCounterVec::new(
            Opts::new(
                "robofleet_certificate_revocations_total",
                "Certificate revocations attempted during robot deletion",
            ),
            &["result"],
        )?;

        registry.register(Box::new(robot_deletions_total.clone()))?;
        registry.register(Box::new(key_teardown_failures_total.clone()))?;
        registry.register(Box::new(certificate_revocations_total.clone()))?;

        Ok(Self {
            registry,
            robot_deletions_total,
            key_teardown_failures_total,
            certificate_revocations_total,
        })
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn observe_deletion(&self, outcome: DeletionOutcome) {
        self.robot_deletions_total
            .with_label_values(&[outcome.label()])
            .inc();
    }

    pub fn inc_key_teardown_failures(&self, count: u64) {
        self.key_teardown_failures_total.inc_by(count);
    }

    pub fn observe_revocation(&self, result: RevocationResult) {
        self.certificate_revocations_total
            .with_label_values(&[result.label()])
            .inc();
    }
}
