//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot lifecycle orchestration and read models."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
//! Bounded, single-lookup detail view of one robot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use robofleet_common::{EcuId, LifecycleConfig, RequestContext, RobotId, MANIFEST_HISTORY_CAP};
use robofleet_store::{
    CertificateStatus, EntityStore, ImageFormat, RelationQuery, RobotGraph, RolloutRobotStatus,
    Take,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{LifecycleError, Result};
use crate::status::derive_status;

/// Installed image as shown on an ECU.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSummary {
    pub id: String,
    pub name: String,
    pub format: ImageFormat,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EcuDetail {
    pub id: EcuId,
    pub primary: bool,
    pub hw_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed_image: Option<ImageSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestSummary {
    pub id: String,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateSummary {
    pub id: String,
    pub serial: String,
    pub status: CertificateStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkReportSummary {
    pub hostname: Option<String>,
    pub local_ipv4: Option<String>,
    pub mac: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything a detail view shows about one robot, read as one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotDetail {
    pub id: RobotId,
    /// Robots carry no separate display name; this mirrors `id`.
    pub name: String,
    pub status: RolloutRobotStatus,
    pub agent_version: Option<String>,
    pub ecus_registered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Newest first.
    pub ecus: Vec<EcuDetail>,
    pub groups: Vec<GroupSummary>,
    /// Newest first, never longer than [`MANIFEST_HISTORY_CAP`].
    pub robot_manifests: Vec<ManifestSummary>,
    /// Newest first.
    pub certificates: Vec<CertificateSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_network_report: Option<NetworkReportSummary>,
}

impl RobotDetail {
    fn from_graph(graph: RobotGraph) -> Self {
        let status = derive_status(&graph.rollouts);
        let robot = graph.robot;
        Self {
            name: robot.id.to_string(),
            id: robot.id,
            status,
            agent_version: robot.agent_version,
            ecus_registered: robot.ecus_registered,
            created_at: robot.created_at,
            updated_at: robot.updated_at,
            ecus: graph
                .ecus
                .into_iter()
                .map(|record| EcuDetail {
                    id: record.ecu.id,
                    primary: record.ecu.primary,
                    hw_id: record.ecu.hwid,
                    installed_image: record.installed_image.map(|image| ImageSummary {
                        id: image.id,
                        name: image.name,
                        format: image.format,
                        size: image.size,
                    }),
                    created_at: record.ecu.created_at,
                    updated_at: record.ecu.updated_at,
                })
                .collect(),
            groups: graph
                .groups
                .into_iter()
                .map(|link| GroupSummary {
                    id: link.group.id,
                    name: link.group.name,
                })
                .collect(),
            robot_manifests: graph
                .manifests
                .into_iter()
                .take(MANIFEST_HISTORY_CAP)
                .map(|manifest| ManifestSummary {
                    id: manifest.id,
                    valid: manifest.valid,
                    created_at: manifest.created_at,
                })
                .collect(),
            certificates: graph
                .certificates
                .into_iter()
                .map(|cert| CertificateSummary {
                    id: cert.id,
                    serial: cert.serial,
                    status: cert.status,
                    created_at: cert.created_at,
                    expires_at: cert.expires_at,
                    revoked_at: cert.revoked_at,
                })
                .collect(),
            latest_network_report: graph.network_reports.into_iter().next().map(|report| {
                NetworkReportSummary {
                    hostname: report.hostname,
                    local_ipv4: report.local_ipv4,
                    mac: report.mac,
                    created_at: report.created_at,
                }
            }),
        }
    }
}

/// Read path for a single robot: detail snapshot and derived status.
#[derive(Clone)]
pub struct DetailAggregator {
    store: Arc<dyn EntityStore>,
    manifest_limit: usize,
}

impl DetailAggregator {
    pub fn new(store: Arc<dyn EntityStore>, config: &LifecycleConfig) -> Self {
        Self {
            store,
            manifest_limit: config.manifest_history_limit.clamp(1, MANIFEST_HISTORY_CAP),
        }
    }

    fn detail_query(&self) -> RelationQuery {
        RelationQuery::robot_only()
            .ecus(Take::All)
            .groups(Take::All)
            .rollouts(Take::Latest(1))
            .manifests(Take::Latest(self.manifest_limit))
            .certificates(Take::All)
            .network_reports(Take::Latest(1))
    }

    /// Join the robot's relations through one `(team_id, robot_id)` lookup.
    pub async fn robot_detail(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
    ) -> Result<RobotDetail> {
        let query = self.detail_query();
        let graph = match ctx.bounded(self.store.load_robot(ctx, robot_id, &query)).await? {
            Ok(graph) => graph,
            Err(err) => {
                let err = LifecycleError::from(err);
                if err.is_not_found() {
                    warn!(
                        team_id = %ctx.team_id(),
                        robot_id = %robot_id,
                        request_id = %ctx.request_id(),
                        "robot detail requested for unknown robot"
                    );
                }
                return Err(err);
            }
        };
        let detail = RobotDetail::from_graph(graph);
        info!(
            team_id = %ctx.team_id(),
            robot_id = %robot_id,
            request_id = %ctx.request_id(),
            ecus = detail.ecus.len(),
            certificates = detail.certificates.len(),
            "robot detail read"
        );
        Ok(detail)
    }

    /// Current lifecycle status without loading any other relation.
    pub async fn robot_status(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
    ) -> Result<RolloutRobotStatus> {
        let query = RelationQuery::robot_only().rollouts(Take::Latest(1));
        let graph = ctx
            .bounded(self.store.load_robot(ctx, robot_id, &query))
            .await??;
        Ok(derive_status(&graph.rollouts))
    }
}
