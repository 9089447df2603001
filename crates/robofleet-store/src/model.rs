//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot entity store abstractions and bindings."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
//! Persistent records. Every record carries its `team_id`; child records also carry
//! the id of their single owning robot (or ECU, for telemetry).

use chrono::{DateTime, Utc};
use robofleet_common::{EcuId, RobotId, TeamId};
use serde::{Deserialize, Serialize};

/// A managed device. Identity is `(team_id, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Robot {
    /// Owning team.
    pub team_id: TeamId,
    /// Identifier, unique within the team.
    pub id: RobotId,
    /// Version string reported by the on-device agent.
    #[serde(default)]
    pub agent_version: Option<String>,
    /// Whether the robot has completed ECU registration.
    #[serde(default)]
    pub ecus_registered: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Addressable sub-component of a robot with its own key pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ecu {
    /// Owning team.
    pub team_id: TeamId,
    /// Owning robot.
    pub robot_id: RobotId,
    /// Identifier, unique within the team.
    pub id: EcuId,
    /// Hardware identifier.
    pub hwid: String,
    /// Whether this is the robot's primary ECU.
    #[serde(default)]
    pub primary: bool,
    /// Image currently installed on the ECU.
    #[serde(default)]
    pub installed_image_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Encoding of an image payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    /// Raw binary blob.
    Binary,
    /// OSTree commit.
    Ostree,
}

/// Software image that can be installed on an ECU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Owning team.
    pub team_id: TeamId,
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Payload format.
    pub format: ImageFormat,
    /// Payload size in bytes.
    pub size: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of a robot certificate as recorded by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    /// Issued and not yet revoked.
    Issued,
    /// Revoked by the certificate authority.
    Revoked,
    /// Past its validity window.
    Expired,
}

/// Revocable credential bound to a robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    /// Owning team.
    pub team_id: TeamId,
    /// Owning robot.
    pub robot_id: RobotId,
    /// Record identifier.
    pub id: String,
    /// Serial number known to the certificate authority.
    pub serial: String,
    /// Recorded status.
    pub status: CertificateStatus,
    /// Issue timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Revocation timestamp, absent until revoked.
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

/// State of an update campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutStatus {
    /// Created but not launched.
    Prepared,
    /// Robots are being updated.
    Launched,
    /// Every robot has reported.
    Completed,
    /// Abandoned by an operator.
    Cancelled,
}

/// Update campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rollout {
    /// Owning team.
    pub team_id: TeamId,
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Campaign state.
    pub status: RolloutStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A robot's status within one rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutRobotStatus {
    /// Waiting to be scheduled.
    Pending,
    /// Excluded from the rollout.
    Skipped,
    /// Update metadata has been generated.
    Scheduled,
    /// The robot has acknowledged the update.
    Accepted,
    /// The robot reported a successful install.
    Successful,
    /// The robot reported a failed install.
    Failed,
    /// The rollout was cancelled before the robot finished.
    Cancelled,
}

/// Per-campaign participation record of one robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutAssociation {
    /// Owning team.
    pub team_id: TeamId,
    /// Record identifier.
    pub id: String,
    /// Owning robot.
    pub robot_id: RobotId,
    /// Rollout this record belongs to.
    pub rollout_id: String,
    /// Robot status within the rollout.
    pub status: RolloutRobotStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Named collection of robots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Owning team.
    pub team_id: TeamId,
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Link between a robot and a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMembership {
    /// Owning team.
    pub team_id: TeamId,
    /// Group side of the link.
    pub group_id: String,
    /// Robot side of the link.
    pub robot_id: RobotId,
    /// When the robot joined the group.
    pub created_at: DateTime<Utc>,
}

/// Manifest reported by a robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Owning team.
    pub team_id: TeamId,
    /// Owning robot.
    pub robot_id: RobotId,
    /// Record identifier.
    pub id: String,
    /// Whether the manifest passed verification.
    pub valid: bool,
    /// Receipt timestamp.
    pub created_at: DateTime<Utc>,
}

/// Network details reported by a robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkReport {
    /// Owning team.
    pub team_id: TeamId,
    /// Owning robot.
    pub robot_id: RobotId,
    /// Record identifier.
    pub id: String,
    /// Reported hostname.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Reported local IPv4 address.
    #[serde(default)]
    pub local_ipv4: Option<String>,
    /// Reported MAC address.
    #[serde(default)]
    pub mac: Option<String>,
    /// Receipt timestamp.
    pub created_at: DateTime<Utc>,
}

/// Telemetry event emitted by an ECU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcuTelemetry {
    /// Owning team, carried redundantly.
    pub team_id: TeamId,
    /// Owning ECU.
    pub ecu_id: EcuId,
    /// Record identifier.
    pub id: String,
    /// Device-side timestamp.
    pub device_time: DateTime<Utc>,
    /// Event kind reported by the device.
    pub event_type: String,
    /// Whether the reported operation succeeded.
    pub success: bool,
}
