//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Audit events and one-way publishers."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
#![warn(missing_docs)]

/// Result alias used throughout the audit crate.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Error type for audit publication.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The bus refused or could not accept the event.
    #[error("audit bus unavailable: {0}")]
    Unavailable(String),
    /// Wrapper for IO errors while appending to a journal.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub mod bus;
pub mod event;
pub mod journal;

pub use bus::{AuditBus, BroadcastAuditBus, FanoutAuditBus};
pub use event::{AuditEvent, EventAction, EventResource};
pub use journal::{JournalAuditBus, JournalEntry};
