//! ---
//! fleet_section: "06-security-access-control"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Key material and certificate revocation adapters."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use robofleet_common::RequestContext;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Reason recorded against a revoked certificate (RFC 5280 CRL reason codes).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationReason {
    /// No reason given.
    Unspecified,
    /// The subject's private key was compromised.
    KeyCompromise,
    /// The issuing authority was compromised.
    CertificateAuthorityCompromise,
    /// The subject's affiliation changed.
    AffiliationChanged,
    /// A newer certificate replaced this one.
    Superseded,
    /// The subject no longer operates.
    CessationOfOperation,
    /// The subject's privileges were withdrawn.
    PrivilegeWithdrawn,
    /// The attribute authority was compromised.
    AaCompromise,
}

/// Errors reported by a certificate authority.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertificateAuthorityError {
    /// The serial had already been revoked. Callers treat this as non-fatal.
    #[error("certificate {serial} is already revoked")]
    AlreadyRevoked {
        /// Serial that was targeted.
        serial: String,
    },
    /// The authority never issued this serial.
    #[error("certificate {serial} is unknown to the authority")]
    UnknownSerial {
        /// Serial that was targeted.
        serial: String,
    },
    /// The authority could not be reached or failed internally.
    #[error("certificate authority unavailable: {0}")]
    Unavailable(String),
}

impl CertificateAuthorityError {
    /// True when the error only says the work was already done.
    pub fn is_already_revoked(&self) -> bool {
        matches!(self, CertificateAuthorityError::AlreadyRevoked { .. })
    }
}

/// Authority issuing and revoking robot certificates.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Revoke `serial` for `reason`.
    async fn revoke(
        &self,
        ctx: &RequestContext,
        serial: &str,
        reason: RevocationReason,
    ) -> Result<(), CertificateAuthorityError>;
}

/// Status result when checking a serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateState {
    /// Certificate trusted (not revoked).
    Valid,
    /// Certificate has been revoked.
    Revoked,
}

/// Revocation bookkeeping entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevocationRecord {
    /// Revoked serial.
    pub serial: String,
    /// Recorded reason.
    pub reason: RevocationReason,
    /// When the revocation was recorded.
    pub revoked_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct AuthorityState {
    issued: HashMap<String, CertificateState>,
    revocations: Vec<RevocationRecord>,
}

/// Certificate authority held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCertificateAuthority {
    state: Mutex<AuthorityState>,
}

impl InMemoryCertificateAuthority {
    /// Create an authority that has issued nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a serial issued elsewhere (e.g. restored from a snapshot).
    pub fn register_serial(&self, serial: &str) {
        self.state
            .lock()
            .issued
            .entry(serial.to_owned())
            .or_insert(CertificateState::Valid);
    }

    /// Record a serial that is already revoked.
    pub fn register_revoked_serial(&self, serial: &str) {
        self.state
            .lock()
            .issued
            .insert(serial.to_owned(), CertificateState::Revoked);
    }

    /// Current state of `serial`, `None` when never issued.
    pub fn state_of(&self, serial: &str) -> Option<CertificateState> {
        self.state.lock().issued.get(serial).copied()
    }

    /// Every revocation recorded by this authority, oldest first.
    pub fn revocations(&self) -> Vec<RevocationRecord> {
        self.state.lock().revocations.clone()
    }
}

#[async_trait]
impl CertificateAuthority for InMemoryCertificateAuthority {
    async fn revoke(
        &self,
        ctx: &RequestContext,
        serial: &str,
        reason: RevocationReason,
    ) -> Result<(), CertificateAuthorityError> {
        let mut state = self.state.lock();
        match state.issued.get(serial).copied() {
            None => Err(CertificateAuthorityError::UnknownSerial {
                serial: serial.to_owned(),
            }),
            Some(CertificateState::Revoked) => {
                debug!(request_id = %ctx.request_id(), serial, "serial already revoked");
                Err(CertificateAuthorityError::AlreadyRevoked {
                    serial: serial.to_owned(),
                })
            }
            Some(CertificateState::Valid) => {
                state
                    .issued
                    .insert(serial.to_owned(), CertificateState::Revoked);
                state.revocations.push(RevocationRecord {
                    serial: serial.to_owned(),
                    reason,
                    revoked_at: Utc::now(),
                });
                info!(request_id = %ctx.request_id(), serial, %reason, "certificate revoked");
                Ok(())
            }
        }
    }
}
