//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot lifecycle orchestration and read models."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
//! Recording collaborators and fixtures shared by the core integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use robofleet_audit::{AuditBus, AuditError, AuditEvent};
use robofleet_common::{Actor, ActorId, EcuId, LifecycleConfig, RequestContext, RobotId, TeamId};
use robofleet_core::DeletionOrchestrator;
use robofleet_security::{
    CertificateAuthority, CertificateAuthorityError, KeyId, KeyStore, KeyStoreError,
    RevocationReason,
};
use robofleet_store::{
    Certificate, CertificateStatus, DeletedRobot, Ecu, EntityStore, InMemoryEntityStore, Page,
    RelationQuery, Robot, RobotGraph, RolloutAssociationRecord, StoreError,
};

/// Side effect observed by one of the recording collaborators.
#[derive(Debug, Clone)]
pub enum Call {
    DeleteKey(KeyId),
    Revoke(String, RevocationReason),
    Publish(AuditEvent),
}

/// Ordered log shared by every recording collaborator of one test.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn push(&self, call: Call) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    pub fn deleted_keys(&self) -> Vec<KeyId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::DeleteKey(key_id) => Some(key_id),
                _ => None,
            })
            .collect()
    }

    pub fn revocations(&self) -> Vec<(String, RevocationReason)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Revoke(serial, reason) => Some((serial, reason)),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Publish(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Position of every call, tagged by kind: `k` key, `r` revoke, `a` audit.
    pub fn sequence(&self) -> String {
        self.calls()
            .iter()
            .map(|call| match call {
                Call::DeleteKey(_) => 'k',
                Call::Revoke(..) => 'r',
                Call::Publish(_) => 'a',
            })
            .collect()
    }
}

/// Key store recording deletions once they complete.
#[derive(Default)]
pub struct RecordingKeyStore {
    log: CallLog,
    failing: HashSet<KeyId>,
    delay: Option<Duration>,
}

impl RecordingKeyStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, key_id: KeyId) -> Self {
        self.failing.insert(key_id);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl KeyStore for RecordingKeyStore {
    async fn delete_key_pair(
        &self,
        _ctx: &RequestContext,
        key_id: &KeyId,
    ) -> Result<(), KeyStoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log.push(Call::DeleteKey(key_id.clone()));
        if self.failing.contains(key_id) {
            return Err(KeyStoreError::Unavailable("vault sealed".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorityMode {
    #[default]
    Accept,
    AlreadyRevoked,
    Unavailable,
}

pub struct RecordingAuthority {
    log: CallLog,
    mode: AuthorityMode,
}

impl RecordingAuthority {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            mode: AuthorityMode::Accept,
        }
    }

    pub fn with_mode(mut self, mode: AuthorityMode) -> Self {
        self.mode = mode;
        self
    }
}

#[async_trait]
impl CertificateAuthority for RecordingAuthority {
    async fn revoke(
        &self,
        _ctx: &RequestContext,
        serial: &str,
        reason: RevocationReason,
    ) -> Result<(), CertificateAuthorityError> {
        self.log.push(Call::Revoke(serial.to_owned(), reason));
        match self.mode {
            AuthorityMode::Accept => Ok(()),
            AuthorityMode::AlreadyRevoked => Err(CertificateAuthorityError::AlreadyRevoked {
                serial: serial.to_owned(),
            }),
            AuthorityMode::Unavailable => {
                Err(CertificateAuthorityError::Unavailable("ca offline".into()))
            }
        }
    }
}

pub struct RecordingBus {
    log: CallLog,
    fail: bool,
}

impl RecordingBus {
    pub fn new(log: CallLog) -> Self {
        Self { log, fail: false }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl AuditBus for RecordingBus {
    async fn publish(&self, event: AuditEvent) -> robofleet_audit::Result<()> {
        if self.fail {
            return Err(AuditError::Unavailable("bus offline".into()));
        }
        self.log.push(Call::Publish(event));
        Ok(())
    }
}

/// Entity store that can refuse deletes or acknowledge them late.
pub struct ScriptedStore {
    inner: Arc<InMemoryEntityStore>,
    offline: bool,
    ack_delay: Option<Duration>,
}

impl ScriptedStore {
    pub fn new(inner: Arc<InMemoryEntityStore>) -> Self {
        Self {
            inner,
            offline: false,
            ack_delay: None,
        }
    }

    /// Every delete fails before anything is committed.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Commit the delete, then wait `delay` before replying.
    pub fn with_ack_delay(mut self, delay: Duration) -> Self {
        self.ack_delay = Some(delay);
        self
    }
}

#[async_trait]
impl EntityStore for ScriptedStore {
    async fn load_robot(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
        query: &RelationQuery,
    ) -> robofleet_store::Result<RobotGraph> {
        self.inner.load_robot(ctx, robot_id, query).await
    }

    async fn list_robots(
        &self,
        ctx: &RequestContext,
        query: &RelationQuery,
    ) -> robofleet_store::Result<Vec<RobotGraph>> {
        self.inner.list_robots(ctx, query).await
    }

    async fn robot_rollouts(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
        page: Page,
    ) -> robofleet_store::Result<Vec<RolloutAssociationRecord>> {
        self.inner.robot_rollouts(ctx, robot_id, page).await
    }

    async fn delete_robot(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
    ) -> robofleet_store::Result<DeletedRobot> {
        if self.offline {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        let deleted = self.inner.delete_robot(ctx, robot_id).await?;
        if let Some(delay) = self.ack_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(deleted)
    }
}

/// Orchestrator over `store` with recording collaborators writing into `log`.
pub struct Harness {
    pub store: Arc<InMemoryEntityStore>,
    pub log: CallLog,
    pub orchestrator: DeletionOrchestrator,
}

impl Harness {
    pub fn new(store: Arc<InMemoryEntityStore>) -> Self {
        let log = CallLog::default();
        Self::with_collaborators(
            store,
            log.clone(),
            RecordingKeyStore::new(log.clone()),
            RecordingAuthority::new(log.clone()),
            RecordingBus::new(log),
        )
    }

    pub fn with_collaborators(
        store: Arc<InMemoryEntityStore>,
        log: CallLog,
        keys: RecordingKeyStore,
        authority: RecordingAuthority,
        bus: RecordingBus,
    ) -> Self {
        let orchestrator = DeletionOrchestrator::new(
            store.clone(),
            Arc::new(keys),
            Arc::new(authority),
            Arc::new(bus),
            &LifecycleConfig::default(),
        );
        Self {
            store,
            log,
            orchestrator,
        }
    }
}

pub fn ts(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

pub fn team(id: &str) -> TeamId {
    TeamId::parse(id).unwrap()
}

pub fn robot_id(id: &str) -> RobotId {
    RobotId::parse(id).unwrap()
}

pub fn ecu_id(id: &str) -> EcuId {
    EcuId::parse(id).unwrap()
}

pub fn ctx(team_id: &str) -> RequestContext {
    RequestContext::new(Actor::user(ActorId::parse("operator-7").unwrap()), team(team_id))
}

pub fn robot(team_id: &str, id: &str, minutes: i64) -> Robot {
    Robot {
        team_id: team(team_id),
        id: robot_id(id),
        agent_version: Some("1.4.0".into()),
        ecus_registered: true,
        created_at: ts(minutes),
        updated_at: ts(minutes),
    }
}

pub fn ecu(team_id: &str, robot: &str, id: &str, minutes: i64) -> Ecu {
    Ecu {
        team_id: team(team_id),
        robot_id: robot_id(robot),
        id: ecu_id(id),
        hwid: format!("hw-{id}"),
        primary: minutes == 0,
        installed_image_id: None,
        created_at: ts(minutes),
        updated_at: ts(minutes),
    }
}

pub fn certificate(team_id: &str, robot: &str, serial: &str, minutes: i64) -> Certificate {
    Certificate {
        team_id: team(team_id),
        robot_id: robot_id(robot),
        id: format!("cert-{serial}"),
        serial: serial.into(),
        status: CertificateStatus::Issued,
        created_at: ts(minutes),
        expires_at: ts(minutes) + chrono::Duration::days(365),
        revoked_at: None,
    }
}

/// Seed a robot with the given ECUs and `(serial, minutes)` certificates.
pub fn seed_robot(
    store: &InMemoryEntityStore,
    team_id: &str,
    id: &str,
    ecus: &[&str],
    certificates: &[(&str, i64)],
) {
    store.insert_robot(robot(team_id, id, 0)).unwrap();
    for (index, ecu_name) in ecus.iter().enumerate() {
        store
            .insert_ecu(ecu(team_id, id, ecu_name, index as i64))
            .unwrap();
    }
    for (serial, minutes) in certificates {
        store
            .insert_certificate(certificate(team_id, id, serial, *minutes))
            .unwrap();
    }
}
