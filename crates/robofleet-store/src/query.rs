//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot entity store abstractions and bindings."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::model::{
    Certificate, Ecu, Group, Image, Manifest, NetworkReport, Robot, Rollout, RolloutAssociation,
};

/// How many records of a relation to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Take {
    /// Do not load the relation.
    #[default]
    Skip,
    /// Load the `n` most recent records.
    Latest(usize),
    /// Load every record, most recent first.
    All,
}

impl Take {
    /// Truncate a newest-first list according to this selection.
    pub fn apply<T>(self, mut records: Vec<T>) -> Vec<T> {
        match self {
            Take::Skip => Vec::new(),
            Take::Latest(n) => {
                records.truncate(n);
                records
            }
            Take::All => records,
        }
    }

    /// True unless the relation is skipped.
    pub fn is_loaded(self) -> bool {
        !matches!(self, Take::Skip)
    }
}

/// Relations to load alongside a robot. Every relation is ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelationQuery {
    /// ECUs with their installed image.
    pub ecus: Take,
    /// Group memberships with group name.
    pub groups: Take,
    /// Rollout associations.
    pub rollouts: Take,
    /// Manifests.
    pub manifests: Take,
    /// Certificates.
    pub certificates: Take,
    /// Network reports.
    pub network_reports: Take,
}

impl RelationQuery {
    /// Load the robot row only (plus the group count).
    pub fn robot_only() -> Self {
        Self::default()
    }

    /// Select ECUs.
    pub fn ecus(mut self, take: Take) -> Self {
        self.ecus = take;
        self
    }

    /// Select group memberships.
    pub fn groups(mut self, take: Take) -> Self {
        self.groups = take;
        self
    }

    /// Select rollout associations.
    pub fn rollouts(mut self, take: Take) -> Self {
        self.rollouts = take;
        self
    }

    /// Select manifests.
    pub fn manifests(mut self, take: Take) -> Self {
        self.manifests = take;
        self
    }

    /// Select certificates.
    pub fn certificates(mut self, take: Take) -> Self {
        self.certificates = take;
        self
    }

    /// Select network reports.
    pub fn network_reports(mut self, take: Take) -> Self {
        self.network_reports = take;
        self
    }
}

/// Offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Page {
    /// Records to skip.
    #[serde(default)]
    pub skip: usize,
    /// Records to return; `None` means unbounded.
    #[serde(default)]
    pub take: Option<usize>,
}

impl Page {
    /// Apply the page to an iterator.
    pub fn slice<T>(self, records: impl IntoIterator<Item = T>) -> Vec<T> {
        let iter = records.into_iter().skip(self.skip);
        match self.take {
            Some(take) => iter.take(take).collect(),
            None => iter.collect(),
        }
    }
}

/// ECU joined with its installed image, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct EcuRecord {
    /// ECU row.
    pub ecu: Ecu,
    /// Installed image resolved within the same team.
    pub installed_image: Option<Image>,
}

/// Group membership joined with its group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupLink {
    /// Group row.
    pub group: Group,
    /// When the robot joined.
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

/// A robot and the relations selected by a [`RelationQuery`], read as one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotGraph {
    /// Robot row.
    pub robot: Robot,
    /// Total group memberships, always populated.
    pub group_count: usize,
    /// Selected ECUs.
    pub ecus: Vec<EcuRecord>,
    /// Selected group memberships.
    pub groups: Vec<GroupLink>,
    /// Selected rollout associations.
    pub rollouts: Vec<RolloutAssociation>,
    /// Selected manifests.
    pub manifests: Vec<Manifest>,
    /// Selected certificates.
    pub certificates: Vec<Certificate>,
    /// Selected network reports.
    pub network_reports: Vec<NetworkReport>,
}

/// Rollout association joined with its rollout.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutAssociationRecord {
    /// Association row.
    pub association: RolloutAssociation,
    /// Owning rollout.
    pub rollout: Rollout,
}

/// Rows captured by a delete before they ceased to exist.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedRobot {
    /// Deleted robot row.
    pub robot: Robot,
    /// Every ECU the robot owned.
    pub ecus: Vec<Ecu>,
    /// Every certificate the robot owned, newest first.
    pub certificates: Vec<Certificate>,
}

impl DeletedRobot {
    /// Most recently created certificate, treated as the active one.
    ///
    /// Nothing prevents several unrevoked certificates from existing; only the
    /// newest is considered active.
    pub fn latest_certificate(&self) -> Option<&Certificate> {
        self.certificates.iter().max_by_key(|cert| cert.created_at)
    }
}
