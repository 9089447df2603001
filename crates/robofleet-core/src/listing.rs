//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot lifecycle orchestration and read models."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use robofleet_common::{RequestContext, RobotId};
use robofleet_store::{
    EntityStore, Page, RelationQuery, RolloutRobotStatus, RolloutStatus, Take,
};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::status::derive_status;

/// Upper bound on one page of a robot's rollouts.
pub const MAX_ROLLOUT_PAGE: usize = 100;

/// Row of the team's robot list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotSummary {
    pub id: RobotId,
    pub name: String,
    pub status: RolloutRobotStatus,
    pub group_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Group a robot belongs to; `created_at` is when the robot joined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotGroupEntry {
    pub group_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RolloutSummary {
    pub id: String,
    pub name: String,
    pub status: RolloutStatus,
}

/// A robot's participation in one rollout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotRolloutEntry {
    pub id: String,
    pub status: RolloutRobotStatus,
    pub created_at: DateTime<Utc>,
    pub rollout: RolloutSummary,
}

/// Team-scoped list reads over robots.
#[derive(Clone)]
pub struct RobotListings {
    store: Arc<dyn EntityStore>,
}

impl RobotListings {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Every robot of the caller's team, newest first.
    pub async fn list_robots(&self, ctx: &RequestContext) -> Result<Vec<RobotSummary>> {
        let query = RelationQuery::robot_only().rollouts(Take::Latest(1));
        let graphs = ctx.bounded(self.store.list_robots(ctx, &query)).await??;
        let robots: Vec<RobotSummary> = graphs
            .into_iter()
            .map(|graph| RobotSummary {
                name: graph.robot.id.to_string(),
                status: derive_status(&graph.rollouts),
                id: graph.robot.id,
                group_count: graph.group_count,
                created_at: graph.robot.created_at,
            })
            .collect();
        info!(
            team_id = %ctx.team_id(),
            request_id = %ctx.request_id(),
            robots = robots.len(),
            "robot list read"
        );
        Ok(robots)
    }

    /// Groups the robot is a member of, newest membership first.
    pub async fn list_robot_groups(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
    ) -> Result<Vec<RobotGroupEntry>> {
        let query = RelationQuery::robot_only().groups(Take::All);
        let graph = ctx
            .bounded(self.store.load_robot(ctx, robot_id, &query))
            .await??;
        Ok(graph
            .groups
            .into_iter()
            .map(|link| RobotGroupEntry {
                group_id: link.group.id,
                name: link.group.name,
                created_at: link.joined_at,
            })
            .collect())
    }

    /// One page of the robot's rollout participations, newest first.
    ///
    /// `take` is clamped to [`MAX_ROLLOUT_PAGE`]; an absent `take` means a full page.
    pub async fn list_robot_rollouts(
        &self,
        ctx: &RequestContext,
        robot_id: &RobotId,
        page: Page,
    ) -> Result<Vec<RobotRolloutEntry>> {
        let page = Page {
            skip: page.skip,
            take: Some(page.take.map_or(MAX_ROLLOUT_PAGE, |take| take.min(MAX_ROLLOUT_PAGE))),
        };
        let records = ctx
            .bounded(self.store.robot_rollouts(ctx, robot_id, page))
            .await??;
        Ok(records
            .into_iter()
            .map(|record| RobotRolloutEntry {
                id: record.association.id,
                status: record.association.status,
                created_at: record.association.created_at,
                rollout: RolloutSummary {
                    id: record.rollout.id,
                    name: record.rollout.name,
                    status: record.rollout.status,
                },
            })
            .collect())
    }
}
