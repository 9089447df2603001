//! ---
//! fleet_section: "03-persistence-logging"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Audit events and one-way publishers."
//! fleet_version: "v0.0.0-prealpha"
//! fleet_owner: "tbd"
//! ---
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::bus::AuditBus;
use crate::event::AuditEvent;
use crate::Result;

const GENESIS_HASH_LEN: usize = 64;

/// Line stored in the journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    /// Published event.
    pub event: AuditEvent,
    /// SHA-256 over the event and the previous hash.
    pub hash: String,
    /// Hash of the previous entry (zero string for the first entry).
    pub previous_hash: String,
}

impl JournalEntry {
    fn compute_hash(event: &AuditEvent, previous_hash: &str) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(event)?);
        hasher.update(previous_hash.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

/// Audit bus appending events to a newline-delimited JSON file with a hash chain.
#[derive(Debug)]
pub struct JournalAuditBus {
    path: PathBuf,
    last_hash: Mutex<String>,
}

impl JournalAuditBus {
    /// Open a journal at `path`. Existing entries are read to find the chain head.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut last_hash = "0".repeat(GENESIS_HASH_LEN);
        if path.exists() {
            for entry in read_entries(&path)? {
                last_hash = entry.hash;
            }
        }
        Ok(Self {
            path,
            last_hash: Mutex::new(last_hash),
        })
    }

    /// Location of the journal on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every entry in append order.
    pub fn entries(&self) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        read_entries(&self.path)
    }

    /// Verify the hash chain (detect tampering).
    pub fn verify(&self) -> Result<bool> {
        let mut previous = "0".repeat(GENESIS_HASH_LEN);
        for entry in self.entries()? {
            if entry.previous_hash != previous {
                return Ok(false);
            }
            if JournalEntry::compute_hash(&entry.event, &previous)? != entry.hash {
                return Ok(false);
            }
            previous = entry.hash;
        }
        Ok(true)
    }

    fn append(&self, event: AuditEvent) -> Result<JournalEntry> {
        let mut last_hash = self.last_hash.lock();
        let hash = JournalEntry::compute_hash(&event, &last_hash)?;
        let entry = JournalEntry {
            event,
            hash: hash.clone(),
            previous_hash: last_hash.clone(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.flush()?;
        *last_hash = hash;
        Ok(entry)
    }
}

fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
    let mut entries = Vec::new();
    for line in BufReader::new(fs::File::open(path)?).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

#[async_trait]
impl AuditBus for JournalAuditBus {
    async fn publish(&self, event: AuditEvent) -> Result<()> {
        let entry = self.append(event)?;
        debug!(event_id = %entry.event.event_id(), hash = %entry.hash, "audit event journaled");
        Ok(())
    }
}
