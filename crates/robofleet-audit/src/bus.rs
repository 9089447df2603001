//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Audit events and one-way publishers."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::event::AuditEvent;
use crate::Result;

/// One-way publisher of audit events. Delivery beyond the bus is the bus's concern.
#[async_trait]
pub trait AuditBus: Send + Sync {
    /// Hand the event to the bus.
    async fn publish(&self, event: AuditEvent) -> Result<()>;
}

/// In-process bus fanning events out to tokio broadcast subscribers.
///
/// Publishing with no subscriber attached is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastAuditBus {
    sender: broadcast::Sender<Arc<AuditEvent>>,
}

impl BroadcastAuditBus {
    /// Create a bus buffering up to `capacity` events per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Attach a subscriber that receives every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AuditEvent>> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl AuditBus for BroadcastAuditBus {
    async fn publish(&self, event: AuditEvent) -> Result<()> {
        let event_id = event.event_id();
        match self.sender.send(Arc::new(event)) {
            Ok(receivers) => debug!(%event_id, receivers, "audit event broadcast"),
            Err(_) => debug!(%event_id, "audit event broadcast without subscribers"),
        }
        Ok(())
    }
}

/// Publishes every event to each inner bus in order.
#[derive(Clone, Default)]
pub struct FanoutAuditBus {
    buses: Vec<Arc<dyn AuditBus>>,
}

impl FanoutAuditBus {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a downstream bus.
    pub fn with_bus(mut self, bus: Arc<dyn AuditBus>) -> Self {
        self.buses.push(bus);
        self
    }
}

#[async_trait]
impl AuditBus for FanoutAuditBus {
    /// Every bus is attempted; the first failure is returned after all attempts.
    async fn publish(&self, event: AuditEvent) -> Result<()> {
        let mut first_error = None;
        for bus in &self.buses {
            if let Err(err) = bus.publish(event.clone()).await {
                warn!(event_id = %event.event_id(), error = %err, "audit fan-out target failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventAction, EventResource};
    use crate::AuditError;
    use robofleet_common::{Actor, ActorId, RequestContext, RobotId, TeamId};

    struct FailingBus;

    #[async_trait]
    impl AuditBus for FailingBus {
        async fn publish(&self, _event: AuditEvent) -> Result<()> {
            Err(AuditError::Unavailable("offline".into()))
        }
    }

    fn event() -> AuditEvent {
        let ctx = RequestContext::new(
            Actor::user(ActorId::parse("u1").unwrap()),
            TeamId::parse("t1").unwrap(),
        );
        AuditEvent::robot_deleted(&ctx, &RobotId::parse("r1").unwrap())
    }

    #[tokio::test]
    async fn broadcast_delivers_to_subscribers() {
        let bus = BroadcastAuditBus::new(8);
        bus.publish(event()).await.unwrap();

        let mut rx = bus.subscribe();
        bus.publish(event()).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.resource(), EventResource::Robot);
        assert_eq!(received.action(), EventAction::Deleted);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn fanout_attempts_every_bus() {
        let broadcast = BroadcastAuditBus::new(8);
        let mut rx = broadcast.subscribe();
        let fanout = FanoutAuditBus::new()
            .with_bus(Arc::new(FailingBus))
            .with_bus(Arc::new(broadcast.clone()));

        let result = fanout.publish(event()).await;
        assert!(matches!(result, Err(AuditError::Unavailable(_))));
        assert!(rx.try_recv().is_ok());
    }
}
