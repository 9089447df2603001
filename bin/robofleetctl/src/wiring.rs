//! ---
//! fleet_section: "05-networking-external-interfaces"
//! fleet_subsection: "binary"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Control CLI for administrators managing robot lifecycles."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::Registry;
use robofleet_audit::{AuditBus, BroadcastAuditBus, FanoutAuditBus, JournalAuditBus};
use robofleet_common::AppConfig;
use robofleet_core::{DeletionOrchestrator, DetailAggregator, LifecycleMetrics, RobotListings};
use robofleet_security::{InMemoryCertificateAuthority, InMemoryKeyStore, KeyId};
use robofleet_store::{CertificateStatus, InMemoryEntityStore, StoreState};
use tracing::{debug, info};

/// Snapshot-backed store plus in-process adapters, wired into the lifecycle services.
pub struct Services {
    pub store: Arc<InMemoryEntityStore>,
    pub registry: Arc<Registry>,
    pub events: BroadcastAuditBus,
    pub details: DetailAggregator,
    pub listings: RobotListings,
    pub orchestrator: DeletionOrchestrator,
}

impl Services {
    pub fn open(config: &AppConfig) -> Result<Self> {
        let snapshot_path = &config.store.snapshot_path;
        let store = if snapshot_path.exists() {
            InMemoryEntityStore::load(snapshot_path).with_context(|| {
                format!("unable to load store snapshot {}", snapshot_path.display())
            })?
        } else {
            info!(path = %snapshot_path.display(), "no store snapshot yet; starting empty");
            InMemoryEntityStore::new()
        };
        let store = Arc::new(store);

        let state = store.state();
        let keys = Arc::new(seed_key_store(&state));
        let authority = Arc::new(seed_authority(&state));

        let events = BroadcastAuditBus::new(config.audit.broadcast_capacity);
        let mut audit = FanoutAuditBus::new().with_bus(Arc::new(events.clone()));
        if let Some(journal_path) = &config.audit.journal_path {
            let journal = JournalAuditBus::open(journal_path).with_context(|| {
                format!("unable to open audit journal {}", journal_path.display())
            })?;
            audit = audit.with_bus(Arc::new(journal));
        }
        let audit: Arc<dyn AuditBus> = Arc::new(audit);

        let registry = Arc::new(Registry::new());
        let metrics = LifecycleMetrics::new(registry.clone())?;

        let details = DetailAggregator::new(store.clone(), &config.lifecycle);
        let listings = RobotListings::new(store.clone());
        let orchestrator =
            DeletionOrchestrator::new(store.clone(), keys, authority, audit, &config.lifecycle)
                .with_metrics(metrics);

        Ok(Self {
            store,
            registry,
            events,
            details,
            listings,
            orchestrator,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.store
            .save(path)
            .with_context(|| format!("unable to save store snapshot {}", path.display()))
    }
}

/// Every ECU in the snapshot owns a key pair.
fn seed_key_store(state: &StoreState) -> InMemoryKeyStore {
    let keys = InMemoryKeyStore::new();
    for rows in &state.robots {
        for ecu in &rows.ecus {
            keys.create_key_pair(KeyId::for_ecu(&ecu.team_id, &ecu.id));
        }
    }
    debug!(keys = keys.len(), "key store seeded from snapshot");
    keys
}

/// Every certificate serial in the snapshot was issued; revoked ones stay revoked.
fn seed_authority(state: &StoreState) -> InMemoryCertificateAuthority {
    let authority = InMemoryCertificateAuthority::new();
    for cert in state.robots.iter().flat_map(|rows| rows.certificates.iter()) {
        if cert.status == CertificateStatus::Revoked || cert.revoked_at.is_some() {
            authority.register_revoked_serial(&cert.serial);
        } else {
            authority.register_serial(&cert.serial);
        }
    }
    authority
}

#[cfg(test)]
mod tests {
    use super::*;
    use robofleet_security::CertificateState;
    use robofleet_common::{EcuId, RobotId, TeamId};
    use robofleet_store::{Certificate, Ecu, Robot, RobotRows};

    #[test]
    fn adapters_mirror_snapshot() {
        let now = chrono::Utc::now();
        let team = TeamId::parse("t1").unwrap();
        let robot = RobotId::parse("r1").unwrap();
        let mut rows = RobotRows::new(Robot {
            team_id: team.clone(),
            id: robot.clone(),
            agent_version: None,
            ecus_registered: true,
            created_at: now,
            updated_at: now,
        });
        rows.ecus.push(Ecu {
            team_id: team.clone(),
            robot_id: robot.clone(),
            id: EcuId::parse("e1").unwrap(),
            hwid: "hw".into(),
            primary: true,
            installed_image_id: None,
            created_at: now,
            updated_at: now,
        });
        for (serial, revoked) in [("live", false), ("dead", true)] {
            rows.certificates.push(Certificate {
                team_id: team.clone(),
                robot_id: robot.clone(),
                id: serial.into(),
                serial: serial.into(),
                status: if revoked {
                    CertificateStatus::Revoked
                } else {
                    CertificateStatus::Issued
                },
                created_at: now,
                expires_at: now,
                revoked_at: revoked.then_some(now),
            });
        }
        let state = StoreState {
            robots: vec![rows],
            ..StoreState::default()
        };

        let keys = seed_key_store(&state);
        assert!(keys.contains(&KeyId::for_ecu(&team, &EcuId::parse("e1").unwrap())));
        let authority = seed_authority(&state);
        assert_eq!(authority.state_of("live"), Some(CertificateState::Valid));
        assert_eq!(authority.state_of("dead"), Some(CertificateState::Revoked));
    }
}
