//! ---
//! fleet_section: "06-security-access-control"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Key material and certificate revocation adapters."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use parking_lot::Mutex;
use rand::RngCore;
use robofleet_common::{EcuId, RequestContext, TeamId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifier of a key pair held by the key-management store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Deterministic key id of an ECU's key pair.
    pub fn for_ecu(team_id: &TeamId, ecu_id: &EcuId) -> Self {
        Self(format!("{team_id}-{ecu_id}"))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors reported by a key-management store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyStoreError {
    /// The store could not be reached or failed internally.
    #[error("key store unavailable: {0}")]
    Unavailable(String),
    /// The store refused the operation for this key.
    #[error("key store rejected {key_id}: {reason}")]
    Rejected {
        /// Key the operation targeted.
        key_id: KeyId,
        /// Reason given by the store.
        reason: String,
    },
}

/// Secret store holding per-ECU key pairs.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Remove a key pair. Removing a key that does not exist succeeds.
    async fn delete_key_pair(
        &self,
        ctx: &RequestContext,
        key_id: &KeyId,
    ) -> Result<(), KeyStoreError>;
}

/// Key store held in process memory, generating ed25519 key pairs.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: Mutex<BTreeMap<KeyId, [u8; 32]>>,
}

impl InMemoryKeyStore {
    /// Create an empty key store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate and store a key pair, returning the hex-encoded public key.
    /// An existing pair under the same id is replaced.
    pub fn create_key_pair(&self, key_id: KeyId) -> String {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        let signing_key = SigningKey::from_bytes(&seed);
        let public_key = signing_key.verifying_key().to_bytes();
        self.keys.lock().insert(key_id, public_key);
        hex::encode(public_key)
    }

    /// Hex-encoded public key for `key_id`, if present.
    pub fn public_key(&self, key_id: &KeyId) -> Option<String> {
        self.keys
            .lock()
            .get(key_id)
            .map(hex::encode)
    }

    /// Whether a key pair exists.
    pub fn contains(&self, key_id: &KeyId) -> bool {
        self.keys.lock().contains_key(key_id)
    }

    /// Number of stored key pairs.
    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    /// True when no key pair is stored.
    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn delete_key_pair(
        &self,
        ctx: &RequestContext,
        key_id: &KeyId,
    ) -> Result<(), KeyStoreError> {
        let removed = self.keys.lock().remove(key_id).is_some();
        debug!(
            request_id = %ctx.request_id(),
            key_id = %key_id,
            removed,
            "key pair delete"
        );
        Ok(())
    }
}
