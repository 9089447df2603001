//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot entity store abstractions and bindings."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{
    Certificate, Ecu, EcuTelemetry, Group, GroupMembership, Image, Manifest, NetworkReport, Robot,
    Rollout, RolloutAssociation,
};
use crate::{Result, StoreError};

/// Current snapshot envelope version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// A robot together with every record it owns.
///
/// Owned records live inside their robot so that removing the robot removes them too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotRows {
    /// Robot row.
    pub robot: Robot,
    /// Owned ECUs.
    #[serde(default)]
    pub ecus: Vec<Ecu>,
    /// Owned certificates.
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    /// Owned rollout associations.
    #[serde(default)]
    pub rollout_associations: Vec<RolloutAssociation>,
    /// Owned group memberships.
    #[serde(default)]
    pub memberships: Vec<GroupMembership>,
    /// Owned manifests.
    #[serde(default)]
    pub manifests: Vec<Manifest>,
    /// Owned network reports.
    #[serde(default)]
    pub network_reports: Vec<NetworkReport>,
    /// Telemetry of the owned ECUs.
    #[serde(default)]
    pub telemetry: Vec<EcuTelemetry>,
}

impl RobotRows {
    /// Wrap a robot with no owned records.
    pub fn new(robot: Robot) -> Self {
        Self {
            robot,
            ecus: Vec::new(),
            certificates: Vec::new(),
            rollout_associations: Vec::new(),
            memberships: Vec::new(),
            manifests: Vec::new(),
            network_reports: Vec::new(),
            telemetry: Vec::new(),
        }
    }
}

/// Complete contents of the in-memory store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    /// Robots and everything they own.
    #[serde(default)]
    pub robots: Vec<RobotRows>,
    /// Team-level images.
    #[serde(default)]
    pub images: Vec<Image>,
    /// Team-level groups.
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Team-level rollouts.
    #[serde(default)]
    pub rollouts: Vec<Rollout>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: u16,
    created_at: DateTime<Utc>,
    hash: String,
    state: StoreState,
}

/// Persist store state to `path` as a hash-sealed JSON envelope.
pub fn save_snapshot(state: &StoreState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let envelope = SnapshotEnvelope {
        version: SNAPSHOT_VERSION,
        created_at: Utc::now(),
        hash: compute_hash(state)?,
        state: state.clone(),
    };

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&serde_json::to_vec_pretty(&envelope)?)?;
    writer.flush()?;
    Ok(())
}

/// Load store state from disk, rejecting envelopes whose hash does not match.
pub fn load_snapshot(path: &Path) -> Result<StoreState> {
    let envelope = load_envelope(path)?;
    let expected = compute_hash(&envelope.state)?;
    if envelope.hash != expected {
        return Err(StoreError::HashMismatch);
    }
    Ok(envelope.state)
}

/// Verify the integrity of a snapshot without keeping the payload.
pub fn verify_snapshot(path: &Path) -> bool {
    match load_envelope(path) {
        Ok(envelope) => compute_hash(&envelope.state)
            .map(|hash| hash == envelope.hash)
            .unwrap_or(false),
        Err(_) => false,
    }
}

fn load_envelope(path: &Path) -> Result<SnapshotEnvelope> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn compute_hash(state: &StoreState) -> Result<String> {
    let serialized = serde_json::to_vec(state)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use robofleet_common::{RobotId, TeamId};
    use tempfile::tempdir;

    fn state() -> StoreState {
        let now = Utc::now();
        StoreState {
            robots: vec![RobotRows::new(Robot {
                team_id: TeamId::parse("team-a").unwrap(),
                id: RobotId::parse("robot-1").unwrap(),
                agent_version: Some("1.2.0".into()),
                ecus_registered: true,
                created_at: now,
                updated_at: now,
            })],
            ..StoreState::default()
        }
    }

    #[test]
    fn save_and_load_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let state = state();

        save_snapshot(&state, &path).unwrap();
        assert!(verify_snapshot(&path));
        assert_eq!(load_snapshot(&path).unwrap(), state);
    }

    #[test]
    fn verify_rejects_tampered_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        save_snapshot(&state(), &path).unwrap();

        let mut envelope: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        envelope["state"]["robots"][0]["robot"]["team_id"] = serde_json::json!("team-b");
        fs::write(&path, serde_json::to_vec_pretty(&envelope).unwrap()).unwrap();

        assert!(!verify_snapshot(&path));
        assert!(matches!(
            load_snapshot(&path),
            Err(StoreError::HashMismatch)
        ));
    }
}
