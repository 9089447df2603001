//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot lifecycle orchestration and read models."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
//! Robot deletion across the entity store, key store, certificate authority and audit bus.
//!
//! The four systems share no transaction. The robot row goes first because it is the
//! authoritative existence record; once it is gone the ECU keys and the active
//! certificate are garbage and are torn down from the snapshot the delete returned.
//! The relational delete runs to completion even past the caller's deadline; the
//! store rejects an expired request before committing. The audit event is published
//! last and only when every cleanup step held, so a failure midway never produces a
//! "deleted" event. Cleanup failures are not rolled
//! back: they surface as [`PartialCleanupFailure`] for an operator to reconcile.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use robofleet_audit::{AuditBus, AuditEvent};
use robofleet_common::{EcuId, LifecycleConfig, RequestContext, RobotId, TeamId};
use robofleet_security::{CertificateAuthority, KeyId, KeyStore, RevocationReason};
use robofleet_store::{DeletedRobot, EntityStore};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{CleanupFailure, CleanupStep, LifecycleError, PartialCleanupFailure, Result};
use crate::metrics::{DeletionOutcome, LifecycleMetrics, RevocationResult};

/// What happened to the robot's active certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RevocationOutcome {
    /// The robot owned no certificate.
    Skipped,
    Revoked {
        serial: String,
    },
    /// The authority had already revoked the serial.
    AlreadyRevoked {
        serial: String,
    },
}

/// Successful, fully cleaned-up deletion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletionReport {
    pub robot_id: RobotId,
    pub team_id: TeamId,
    pub request_id: Uuid,
    /// Key pairs removed, sorted.
    pub keys_deleted: Vec<KeyId>,
    pub revocation: RevocationOutcome,
    pub audit_event_id: Uuid,
}

/// Sole writer allowed to destroy a robot.
pub struct DeletionOrchestrator {
    store: Arc<dyn EntityStore>,
    keys: Arc<dyn KeyStore>,
    authority: Arc<dyn CertificateAuthority>,
    audit: Arc<dyn AuditBus>,
    teardown_concurrency: usize,
    metrics: Option<LifecycleMetrics>,
}

impl DeletionOrchestrator {
    pub fn new(
        store: Arc<dyn EntityStore>,
        keys: Arc<dyn KeyStore>,
        authority: Arc<dyn CertificateAuthority>,
        audit: Arc<dyn AuditBus>,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            store,
            keys,
            authority,
            audit,
            teardown_concurrency: config.key_teardown_concurrency.max(1),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: LifecycleMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Delete `(ctx.team_id(), robot_id)` and tear down everything it owned.
    ///
    /// Returns [`LifecycleError::NotFound`] without touching any other system when the
    /// robot is absent. A retry after success therefore reports `NotFound` and has no
    /// side effects.
    #[instrument(
        name = "robot_delete",
        skip_all,
        fields(team_id = %ctx.team_id(), robot_id = %robot_id, request_id = %ctx.request_id())
    )]
    pub async fn delete_robot(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
    ) -> Result<DeletionReport> {
        let deleted = self.delete_row(ctx, robot_id).await?;
        info!(
            ecus = deleted.ecus.len(),
            certificates = deleted.certificates.len(),
            step = "relational_delete",
            "robot row deleted"
        );

        let mut failures = Vec::new();
        let keys_deleted = self.teardown_keys(ctx, &deleted, &mut failures).await;
        let revocation = self
            .revoke_active_certificate(ctx, &deleted, &mut failures)
            .await;

        if !failures.is_empty() {
            return Err(self.partial_cleanup(ctx, robot_id, failures));
        }

        let event = AuditEvent::robot_deleted(ctx, robot_id);
        let audit_event_id = event.event_id();
        let published = match ctx.bounded(self.audit.publish(event)).await {
            Ok(inner) => inner.map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        if let Err(reason) = published {
            failures.push(CleanupFailure {
                step: CleanupStep::AuditEmission,
                reason,
            });
            return Err(self.partial_cleanup(ctx, robot_id, failures));
        }

        self.observe(DeletionOutcome::Deleted);
        info!(
            keys_deleted = keys_deleted.len(),
            %audit_event_id,
            step = "audit_emission",
            "robot deleted"
        );
        Ok(DeletionReport {
            robot_id: robot_id.clone(),
            team_id: ctx.team_id().clone(),
            request_id: ctx.request_id(),
            keys_deleted,
            revocation,
            audit_event_id,
        })
    }

    /// Step one is never cancelled here: dropping the future after the store committed
    /// would lose the snapshot the cleanup steps need. The store enforces `ctx`'s
    /// deadline before it commits.
    async fn delete_row(&self, ctx: &RequestContext, robot_id: &RobotId) -> Result<DeletedRobot> {
        let result = self
            .store
            .delete_robot(ctx, robot_id)
            .await
            .map_err(LifecycleError::from);
        result.map_err(|err| {
            if err.is_not_found() {
                self.observe(DeletionOutcome::NotFound);
                warn!(
                    step = "relational_delete",
                    "robot not found; nothing deleted"
                );
            } else {
                self.observe(DeletionOutcome::DependencyFailure);
                error!(step = "relational_delete", error = %err, "robot delete failed");
            }
            err
        })
    }

    /// Delete every ECU key pair. All ECUs are attempted and the call returns only
    /// once every attempt has finished.
    async fn teardown_keys(
        &self,
        ctx: &RequestContext,
        deleted: &DeletedRobot,
        failures: &mut Vec<CleanupFailure>,
    ) -> Vec<KeyId> {
        let team_id = ctx.team_id();
        let pending: Vec<_> = deleted
            .ecus
            .iter()
            .map(|ecu| {
                let key_id = KeyId::for_ecu(team_id, &ecu.id);
                async move {
                    let result = match ctx.bounded(self.keys.delete_key_pair(ctx, &key_id)).await {
                        Ok(inner) => inner.map_err(|err| err.to_string()),
                        Err(err) => Err(err.to_string()),
                    };
                    (ecu.id.clone(), key_id, result)
                }
            })
            .collect();
        let attempts: Vec<(EcuId, KeyId, std::result::Result<(), String>)> = stream::iter(pending)
            .buffer_unordered(self.teardown_concurrency)
            .collect()
            .await;

        let mut removed = Vec::with_capacity(attempts.len());
        let mut failed = 0u64;
        for (ecu_id, key_id, result) in attempts {
            match result {
                Ok(()) => {
                    debug!(%ecu_id, %key_id, step = "key_teardown", "key pair deleted");
                    removed.push(key_id);
                }
                Err(reason) => {
                    warn!(%ecu_id, %key_id, step = "key_teardown", %reason, "key pair delete failed");
                    failed += 1;
                    failures.push(CleanupFailure {
                        step: CleanupStep::KeyTeardown { ecu_id, key_id },
                        reason,
                    });
                }
            }
        }
        if failed > 0 {
            if let Some(metrics) = &self.metrics {
                metrics.inc_key_teardown_failures(failed);
            }
        }
        removed.sort();
        removed
    }

    async fn revoke_active_certificate(
        &self,
        ctx: &RequestContext,
        deleted: &DeletedRobot,
        failures: &mut Vec<CleanupFailure>,
    ) -> RevocationOutcome {
        let Some(certificate) = deleted.latest_certificate() else {
            debug!(
                step = "certificate_revocation",
                "robot owned no certificate"
            );
            return RevocationOutcome::Skipped;
        };
        let serial = certificate.serial.clone();
        let revoked = ctx
            .bounded(
                self.authority
                    .revoke(ctx, &serial, RevocationReason::PrivilegeWithdrawn),
            )
            .await;
        match revoked {
            Ok(Ok(())) => {
                self.observe_revocation(RevocationResult::Revoked);
                info!(%serial, step = "certificate_revocation", "certificate revoked");
                RevocationOutcome::Revoked { serial }
            }
            Ok(Err(err)) if err.is_already_revoked() => {
                self.observe_revocation(RevocationResult::AlreadyRevoked);
                warn!(%serial, step = "certificate_revocation", "certificate was already revoked");
                RevocationOutcome::AlreadyRevoked { serial }
            }
            Ok(Err(err)) => {
                self.record_revocation_failure(serial.clone(), err.to_string(), failures);
                RevocationOutcome::Skipped
            }
            Err(err) => {
                self.record_revocation_failure(serial.clone(), err.to_string(), failures);
                RevocationOutcome::Skipped
            }
        }
    }

    fn record_revocation_failure(
        &self,
        serial: String,
        reason: String,
        failures: &mut Vec<CleanupFailure>,
    ) {
        self.observe_revocation(RevocationResult::Failed);
        warn!(%serial, step = "certificate_revocation", %reason, "certificate revocation failed");
        failures.push(CleanupFailure {
            step: CleanupStep::CertificateRevocation { serial },
            reason,
        });
    }

    fn partial_cleanup(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
        failures: Vec<CleanupFailure>,
    ) -> LifecycleError {
        self.observe(DeletionOutcome::PartialCleanup);
        let failed_steps = failures
            .iter()
            .map(|failure| format!("{}: {}", failure.step, failure.reason))
            .collect::<Vec<_>>()
            .join("; ");
        error!(
            failed = failures.len(),
            failed_steps = %failed_steps,
            "robot deleted but cleanup incomplete; manual reconciliation required"
        );
        LifecycleError::PartialCleanup(PartialCleanupFailure {
            robot_id: robot_id.clone(),
            team_id: ctx.team_id().clone(),
            request_id: ctx.request_id(),
            failures,
        })
    }

    fn observe(&self, outcome: DeletionOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_deletion(outcome);
        }
    }

    fn observe_revocation(&self, result: RevocationResult) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_revocation(result);
        }
    }
}
