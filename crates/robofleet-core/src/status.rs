//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot lifecycle orchestration and read models."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
//! Current lifecycle status of a robot.

use robofleet_store::{RolloutAssociation, RolloutRobotStatus};

/// Status of a robot that has never taken part in a rollout: up to date.
pub const DEFAULT_STATUS: RolloutRobotStatus = RolloutRobotStatus::Successful;

/// Status of the most recently created association, or [`DEFAULT_STATUS`].
///
/// Input order does not matter; ties on `created_at` resolve to the later element.
pub fn derive_status<'a, I>(associations: I) -> RolloutRobotStatus
where
    I: IntoIterator<Item = &'a RolloutAssociation>,
{
    associations
        .into_iter()
        .max_by_key(|association| association.created_at)
        .map(|association| association.status)
        .unwrap_or(DEFAULT_STATUS)
}
