//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Audit events and one-way publishers."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use robofleet_common::{ActorId, ActorKind, RequestContext, RobotId, TeamId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of resource an audit event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventResource {
    /// A managed robot.
    Robot,
    /// A robot group.
    Group,
    /// An update rollout.
    Rollout,
    /// A software image.
    Image,
}

/// Action performed on the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Resource created.
    Created,
    /// Resource modified.
    Updated,
    /// Resource removed.
    Deleted,
}

/// Immutable record of a privileged action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    event_id: Uuid,
    resource: EventResource,
    action: EventAction,
    actor_type: ActorKind,
    actor_id: ActorId,
    team_id: TeamId,
    metadata: serde_json::Value,
    occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Build an event attributed to the caller of `ctx`.
    pub fn new(
        ctx: &RequestContext,
        resource: EventResource,
        action: EventAction,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            resource,
            action,
            actor_type: ctx.actor().kind,
            actor_id: ctx.actor().id.clone(),
            team_id: ctx.team_id().clone(),
            metadata,
            occurred_at: Utc::now(),
        }
    }

    /// Event recorded once a robot has been deleted and its secrets torn down.
    pub fn robot_deleted(ctx: &RequestContext, robot_id: &RobotId) -> Self {
        Self::new(
            ctx,
            EventResource::Robot,
            EventAction::Deleted,
            serde_json::json!({ "id": robot_id }),
        )
    }

    /// Unique event id.
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Resource kind.
    pub fn resource(&self) -> EventResource {
        self.resource
    }

    /// Action kind.
    pub fn action(&self) -> EventAction {
        self.action
    }

    /// Principal category of the actor.
    pub fn actor_type(&self) -> ActorKind {
        self.actor_type
    }

    /// Actor identifier.
    pub fn actor_id(&self) -> &ActorId {
        &self.actor_id
    }

    /// Team the action happened in.
    pub fn team_id(&self) -> &TeamId {
        &self.team_id
    }

    /// Structured event metadata.
    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    /// When the event was created.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robofleet_common::Actor;

    #[test]
    fn robot_deleted_carries_context() {
        let ctx = RequestContext::new(
            Actor::user(ActorId::parse("user-9").unwrap()),
            TeamId::parse("team-1").unwrap(),
        );
        let event = AuditEvent::robot_deleted(&ctx, &RobotId::parse("robot-3").unwrap());
        assert_eq!(event.resource(), EventResource::Robot);
        assert_eq!(event.action(), EventAction::Deleted);
        assert_eq!(event.actor_type(), ActorKind::User);
        assert_eq!(event.actor_id().as_str(), "user-9");
        assert_eq!(event.team_id().as_str(), "team-1");
        assert_eq!(event.metadata(), &serde_json::json!({ "id": "robot-3" }));

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["resource"], "robot");
        assert_eq!(wire["action"], "deleted");
        assert_eq!(wire["actor_type"], "user");
    }
}
