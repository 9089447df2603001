//! ---
//! fleet_section: "06-security-access-control"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Key material and certificate revocation adapters."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod certificates;
pub mod keystore;

pub use certificates::{
    CertificateAuthority, CertificateAuthorityError, CertificateState,
    InMemoryCertificateAuthority, RevocationReason, RevocationRecord,
};
pub use keystore::{InMemoryKeyStore, KeyId, KeyStore, KeyStoreError};
