//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared primitives and utilities for the robot lifecycle runtime."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
//! Shared primitives for the robofleet workspace.
//! This crate exposes identifiers, the explicit request context threaded
//! through every adapter call, configuration loading, and tracing setup.

pub mod config;
pub mod context;
pub mod logging;

pub use config::{
    AppConfig, AuditConfig, LifecycleConfig, LoggingConfig, StoreConfig, MANIFEST_HISTORY_CAP,
};
pub use context::{
    Actor, ActorId, ActorKind, ContextError, EcuId, RequestContext, RobotId, TeamId,
};
pub use logging::{init_tracing, LogFormat};
