//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot entity store abstractions and bindings."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use robofleet_common::{RequestContext, RobotId, TeamId};
use tracing::debug;

use crate::model::{
    Certificate, Ecu, EcuTelemetry, Group, GroupMembership, Image, Manifest, NetworkReport, Robot,
    Rollout, RolloutAssociation,
};
use crate::query::{
    DeletedRobot, EcuRecord, GroupLink, Page, RelationQuery, RobotGraph, RolloutAssociationRecord,
};
use crate::snapshot::{load_snapshot, save_snapshot, RobotRows, StoreState};
use crate::{EntityStore, Result, StoreError};

/// Entity store held in process memory behind a single reader/writer lock.
///
/// Reads take the shared lock for the whole graph so a detail read never observes a
/// half-applied delete; deletes take the exclusive lock for the existence check and the
/// removal together.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    state: RwLock<StoreState>,
}

impl InMemoryEntityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from previously captured state.
    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Load a store from a hash-verified snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::from_state(load_snapshot(path)?))
    }

    /// Persist the current contents to a snapshot file.
    pub fn save(&self, path: &Path) -> Result<()> {
        save_snapshot(&self.state.read(), path)
    }

    /// Clone the current contents.
    pub fn state(&self) -> StoreState {
        self.state.read().clone()
    }

    /// Whether `(team_id, robot_id)` exists.
    pub fn contains_robot(&self, team_id: &TeamId, robot_id: &RobotId) -> bool {
        find_rows(&self.state.read(), team_id, robot_id).is_some()
    }

    /// Insert a robot, rejecting a duplicate `(team_id, id)`.
    pub fn insert_robot(&self, robot: Robot) -> Result<()> {
        let mut state = self.state.write();
        if find_rows(&state, &robot.team_id, &robot.id).is_some() {
            return Err(StoreError::Conflict {
                entity: "robot",
                team_id: robot.team_id.clone(),
                id: robot.id.to_string(),
            });
        }
        state.robots.push(RobotRows::new(robot));
        Ok(())
    }

    /// Insert an ECU under its robot. ECU ids are unique within a team.
    pub fn insert_ecu(&self, ecu: Ecu) -> Result<()> {
        let mut state = self.state.write();
        let duplicate = state
            .robots
            .iter()
            .filter(|rows| rows.robot.team_id == ecu.team_id)
            .flat_map(|rows| rows.ecus.iter())
            .any(|existing| existing.id == ecu.id);
        if duplicate {
            return Err(StoreError::Conflict {
                entity: "ecu",
                team_id: ecu.team_id.clone(),
                id: ecu.id.to_string(),
            });
        }
        if let Some(image_id) = &ecu.installed_image_id {
            if !state
                .images
                .iter()
                .any(|image| image.team_id == ecu.team_id && &image.id == image_id)
            {
                return Err(StoreError::DanglingReference {
                    entity: "ecu",
                    missing: format!("image {image_id}"),
                    team_id: ecu.team_id.clone(),
                });
            }
        }
        let rows = owner_rows(&mut state, &ecu.team_id, &ecu.robot_id, "ecu")?;
        rows.ecus.push(ecu);
        Ok(())
    }

    /// Insert a certificate under its robot.
    pub fn insert_certificate(&self, certificate: Certificate) -> Result<()> {
        let mut state = self.state.write();
        let rows = owner_rows(
            &mut state,
            &certificate.team_id,
            &certificate.robot_id,
            "certificate",
        )?;
        if rows.certificates.iter().any(|c| c.id == certificate.id) {
            return Err(StoreError::Conflict {
                entity: "certificate",
                team_id: certificate.team_id.clone(),
                id: certificate.id.clone(),
            });
        }
        rows.certificates.push(certificate);
        Ok(())
    }

    /// Insert a team-level image.
    pub fn insert_image(&self, image: Image) -> Result<()> {
        let mut state = self.state.write();
        if state
            .images
            .iter()
            .any(|existing| existing.team_id == image.team_id && existing.id == image.id)
        {
            return Err(StoreError::Conflict {
                entity: "image",
                team_id: image.team_id.clone(),
                id: image.id.clone(),
            });
        }
        state.images.push(image);
        Ok(())
    }

    /// Insert a team-level group.
    pub fn insert_group(&self, group: Group) -> Result<()> {
        let mut state = self.state.write();
        if state
            .groups
            .iter()
            .any(|existing| existing.team_id == group.team_id && existing.id == group.id)
        {
            return Err(StoreError::Conflict {
                entity: "group",
                team_id: group.team_id.clone(),
                id: group.id.clone(),
            });
        }
        state.groups.push(group);
        Ok(())
    }

    /// Link a robot to a group of the same team.
    pub fn add_group_membership(&self, membership: GroupMembership) -> Result<()> {
        let mut state = self.state.write();
        if !state
            .groups
            .iter()
            .any(|g| g.team_id == membership.team_id && g.id == membership.group_id)
        {
            return Err(StoreError::DanglingReference {
                entity: "group membership",
                missing: format!("group {}", membership.group_id),
                team_id: membership.team_id.clone(),
            });
        }
        let rows = owner_rows(
            &mut state,
            &membership.team_id,
            &membership.robot_id,
            "group membership",
        )?;
        if rows
            .memberships
            .iter()
            .any(|m| m.group_id == membership.group_id)
        {
            return Err(StoreError::Conflict {
                entity: "group membership",
                team_id: membership.team_id.clone(),
                id: format!("{}/{}", membership.group_id, membership.robot_id),
            });
        }
        rows.memberships.push(membership);
        Ok(())
    }

    /// Insert a team-level rollout.
    pub fn insert_rollout(&self, rollout: Rollout) -> Result<()> {
        let mut state = self.state.write();
        if state
            .rollouts
            .iter()
            .any(|existing| existing.team_id == rollout.team_id && existing.id == rollout.id)
        {
            return Err(StoreError::Conflict {
                entity: "rollout",
                team_id: rollout.team_id.clone(),
                id: rollout.id.clone(),
            });
        }
        state.rollouts.push(rollout);
        Ok(())
    }

    /// Record a robot's participation in a rollout of the same team.
    pub fn insert_rollout_association(&self, association: RolloutAssociation) -> Result<()> {
        let mut state = self.state.write();
        if !state
            .rollouts
            .iter()
            .any(|r| r.team_id == association.team_id && r.id == association.rollout_id)
        {
            return Err(StoreError::DanglingReference {
                entity: "rollout association",
                missing: format!("rollout {}", association.rollout_id),
                team_id: association.team_id.clone(),
            });
        }
        let rows = owner_rows(
            &mut state,
            &association.team_id,
            &association.robot_id,
            "rollout association",
        )?;
        rows.rollout_associations.push(association);
        Ok(())
    }

    /// Insert a manifest under its robot.
    pub fn insert_manifest(&self, manifest: Manifest) -> Result<()> {
        let mut state = self.state.write();
        let rows = owner_rows(&mut state, &manifest.team_id, &manifest.robot_id, "manifest")?;
        rows.manifests.push(manifest);
        Ok(())
    }

    /// Insert a network report under its robot.
    pub fn insert_network_report(&self, report: NetworkReport) -> Result<()> {
        let mut state = self.state.write();
        let rows = owner_rows(
            &mut state,
            &report.team_id,
            &report.robot_id,
            "network report",
        )?;
        rows.network_reports.push(report);
        Ok(())
    }

    /// Insert telemetry under the robot owning the ECU.
    pub fn insert_ecu_telemetry(&self, telemetry: EcuTelemetry) -> Result<()> {
        let mut state = self.state.write();
        let rows = state
            .robots
            .iter_mut()
            .filter(|rows| rows.robot.team_id == telemetry.team_id)
            .find(|rows| rows.ecus.iter().any(|ecu| ecu.id == telemetry.ecu_id))
            .ok_or_else(|| StoreError::DanglingReference {
                entity: "ecu telemetry",
                missing: format!("ecu {}", telemetry.ecu_id),
                team_id: telemetry.team_id.clone(),
            })?;
        rows.telemetry.push(telemetry);
        Ok(())
    }
}

fn find_rows<'a>(
    state: &'a StoreState,
    team_id: &TeamId,
    robot_id: &RobotId,
) -> Option<&'a RobotRows> {
    state
        .robots
        .iter()
        .find(|rows| &rows.robot.team_id == team_id && &rows.robot.id == robot_id)
}

fn owner_rows<'a>(
    state: &'a mut StoreState,
    team_id: &TeamId,
    robot_id: &RobotId,
    entity: &'static str,
) -> Result<&'a mut RobotRows> {
    state
        .robots
        .iter_mut()
        .find(|rows| &rows.robot.team_id == team_id && &rows.robot.id == robot_id)
        .ok_or_else(|| StoreError::DanglingReference {
            entity,
            missing: format!("robot {robot_id}"),
            team_id: team_id.clone(),
        })
}

fn not_found(ctx: &RequestContext, robot_id: &RobotId) -> StoreError {
    StoreError::NotFound {
        team_id: ctx.team_id().clone(),
        robot_id: robot_id.clone(),
    }
}

fn newest_first<T: Clone>(records: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    sorted
}

fn build_graph(state: &StoreState, rows: &RobotRows, query: &RelationQuery) -> RobotGraph {
    let team_id = &rows.robot.team_id;

    let ecus = if query.ecus.is_loaded() {
        let ordered = query
            .ecus
            .apply(newest_first(&rows.ecus, |ecu| ecu.created_at));
        ordered
            .into_iter()
            .map(|ecu| {
                let installed_image = ecu.installed_image_id.as_ref().and_then(|image_id| {
                    state
                        .images
                        .iter()
                        .find(|image| &image.team_id == team_id && &image.id == image_id)
                        .cloned()
                });
                EcuRecord {
                    ecu,
                    installed_image,
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    let groups = if query.groups.is_loaded() {
        let ordered = query
            .groups
            .apply(newest_first(&rows.memberships, |m| m.created_at));
        ordered
            .into_iter()
            .filter_map(|membership| {
                state
                    .groups
                    .iter()
                    .find(|group| &group.team_id == team_id && group.id == membership.group_id)
                    .map(|group| GroupLink {
                        group: group.clone(),
                        joined_at: membership.created_at,
                    })
            })
            .collect()
    } else {
        Vec::new()
    };

    RobotGraph {
        robot: rows.robot.clone(),
        group_count: rows.memberships.len(),
        ecus,
        groups,
        rollouts: query
            .rollouts
            .apply(newest_first(&rows.rollout_associations, |a| a.created_at)),
        manifests: query
            .manifests
            .apply(newest_first(&rows.manifests, |m| m.created_at)),
        certificates: query
            .certificates
            .apply(newest_first(&rows.certificates, |c| c.created_at)),
        network_reports: query
            .network_reports
            .apply(newest_first(&rows.network_reports, |r| r.created_at)),
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn load_robot(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
        query: &RelationQuery,
    ) -> Result<RobotGraph> {
        let state = self.state.read();
        let rows =
            find_rows(&state, ctx.team_id(), robot_id).ok_or_else(|| not_found(ctx, robot_id))?;
        Ok(build_graph(&state, rows, query))
    }

    async fn list_robots(
        &self,
        ctx: &RequestContext,
        query: &RelationQuery,
    ) -> Result<Vec<RobotGraph>> {
        let state = self.state.read();
        let mut rows: Vec<&RobotRows> = state
            .robots
            .iter()
            .filter(|rows| &rows.robot.team_id == ctx.team_id())
            .collect();
        rows.sort_by(|a, b| b.robot.created_at.cmp(&a.robot.created_at));
        Ok(rows
            .into_iter()
            .map(|rows| build_graph(&state, rows, query))
            .collect())
    }

    async fn robot_rollouts(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
        page: Page,
    ) -> Result<Vec<RolloutAssociationRecord>> {
        let state = self.state.read();
        let rows =
            find_rows(&state, ctx.team_id(), robot_id).ok_or_else(|| not_found(ctx, robot_id))?;
        let ordered = newest_first(&rows.rollout_associations, |a| a.created_at);
        Ok(page
            .slice(ordered)
            .into_iter()
            .filter_map(|association| {
                state
                    .rollouts
                    .iter()
                    .find(|r| &r.team_id == ctx.team_id() && r.id == association.rollout_id)
                    .map(|rollout| RolloutAssociationRecord {
                        association,
                        rollout: rollout.clone(),
                    })
            })
            .collect())
    }

    async fn delete_robot(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
    ) -> Result<DeletedRobot> {
        // An expired request never commits; a committed delete always returns its snapshot.
        if ctx.is_expired() {
            return Err(StoreError::Unavailable("request deadline exceeded".into()));
        }
        let mut state = self.state.write();
        let position = state
            .robots
            .iter()
            .position(|rows| &rows.robot.team_id == ctx.team_id() && &rows.robot.id == robot_id)
            .ok_or_else(|| not_found(ctx, robot_id))?;
        let rows = state.robots.remove(position);
        debug!(
            team_id = %ctx.team_id(),
            robot_id = %robot_id,
            ecus = rows.ecus.len(),
            certificates = rows.certificates.len(),
            telemetry = rows.telemetry.len(),
            "robot row and owned records removed"
        );
        let certificates = newest_first(&rows.certificates, |c| c.created_at);
        Ok(DeletedRobot {
            robot: rows.robot,
            ecus: rows.ecus,
            certificates,
        })
    }
}
