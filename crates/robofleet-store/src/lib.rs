//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot entity store abstractions and bindings."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
#![warn(missing_docs)]

use async_trait::async_trait;
use robofleet_common::{RequestContext, RobotId, TeamId};

/// Result alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for the entity store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No robot matches `(team_id, id)`. Wrong team and never-existed are indistinguishable.
    #[error("robot {robot_id} not found in team {team_id}")]
    NotFound {
        /// Team scope of the lookup.
        team_id: TeamId,
        /// Robot that was looked up.
        robot_id: RobotId,
    },
    /// A record with the same composite key already exists.
    #[error("{entity} {id} already exists in team {team_id}")]
    Conflict {
        /// Entity kind.
        entity: &'static str,
        /// Team scope.
        team_id: TeamId,
        /// Conflicting identifier.
        id: String,
    },
    /// A child record references an owner that does not exist in the same team.
    #[error("{entity} references missing {missing} in team {team_id}")]
    DanglingReference {
        /// Entity being inserted.
        entity: &'static str,
        /// Referenced entity that could not be resolved.
        missing: String,
        /// Team scope.
        team_id: TeamId,
    },
    /// Backend could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Wrapper for IO errors encountered while reading/writing snapshots.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Reported when a snapshot fails integrity verification.
    #[error("snapshot hash mismatch")]
    HashMismatch,
}

impl StoreError {
    /// True for the distinguishable absent-robot signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub mod memory;
pub mod model;
pub mod query;
pub mod snapshot;

pub use memory::InMemoryEntityStore;
pub use model::{
    Certificate, CertificateStatus, Ecu, EcuTelemetry, Group, GroupMembership, Image, ImageFormat,
    Manifest, NetworkReport, Robot, Rollout, RolloutAssociation, RolloutRobotStatus, RolloutStatus,
};
pub use query::{
    DeletedRobot, EcuRecord, GroupLink, Page, RelationQuery, RobotGraph, RolloutAssociationRecord,
    Take,
};
pub use snapshot::{
    load_snapshot, save_snapshot, verify_snapshot, RobotRows, StoreState, SNAPSHOT_VERSION,
};

/// Team-scoped access to robots and their owned records.
///
/// Every method resolves the team from the [`RequestContext`]; no method accepts a
/// team id of its own, so a caller cannot read across tenants by accident.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Load one robot by `(team_id, robot_id)` together with the relations selected by `query`.
    ///
    /// The graph is read as one consistent snapshot. Absence yields [`StoreError::NotFound`]
    /// and no relation is read.
    async fn load_robot(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
        query: &RelationQuery,
    ) -> Result<RobotGraph>;

    /// List every robot of the team, newest first.
    async fn list_robots(
        &self,
        ctx: &RequestContext,
        query: &RelationQuery,
    ) -> Result<Vec<RobotGraph>>;

    /// Page through a robot's rollout associations, newest first.
    async fn robot_rollouts(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
        page: Page,
    ) -> Result<Vec<RolloutAssociationRecord>>;

    /// Atomically check existence of and delete `(team_id, robot_id)`, cascading to every
    /// owned record, and return the pre-deletion ECU and certificate snapshot.
    ///
    /// Of several concurrent callers exactly one observes `Ok`; the rest see `NotFound`.
    /// Implementations check `ctx`'s deadline before committing and must not fail after
    /// the delete has committed.
    async fn delete_robot(&self, ctx: &RequestContext, robot_id: &RobotId)
        -> Result<DeletedRobot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguishable() {
        let err = StoreError::NotFound {
            team_id: TeamId::parse("t1").unwrap(),
            robot_id: RobotId::parse("r1").unwrap(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "robot r1 not found in team t1");
        assert!(!StoreError::Unavailable("down".into()).is_not_found());
    }
}
