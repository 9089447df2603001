//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Robot lifecycle orchestration and read models."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
//! Robot lifecycle core: status derivation, detail and list reads, and deletion
//! orchestration across the entity store, key store, certificate authority and audit bus.

pub mod deletion;
pub mod detail;
pub mod error;
pub mod listing;
pub mod metrics;
pub mod status;

pub use deletion::{DeletionOrchestrator, DeletionReport, RevocationOutcome};
pub use detail::{
    CertificateSummary, DetailAggregator, EcuDetail, GroupSummary, ImageSummary,
    ManifestSummary, NetworkReportSummary, RobotDetail,
};
pub use error::{
    CleanupFailure, CleanupStep, FaultClass, LifecycleError, PartialCleanupFailure, Result,
};
pub use listing::{
    RobotGroupEntry, RobotListings, RobotRolloutEntry, RobotSummary, RolloutSummary,
    MAX_ROLLOUT_PAGE,
};
pub use metrics::{DeletionOutcome, LifecycleMetrics, RevocationResult};
pub use status::{derive_status, DEFAULT_STATUS};
