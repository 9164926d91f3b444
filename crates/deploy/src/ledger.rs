//! Durable record of what has been deployed per network.
//!
//! One JSON file per network id, holding an append-only list of records.
//! Lookups are most-recent-wins, so a forced redeploy supersedes the old
//! record without erasing history. Each write replaces the file atomically
//! (temp file + rename) under an exclusive file lock, so a crash mid-write
//! never yields a record with a missing address or hash.

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use alloy_core::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::context::NetworkId;
use crate::error::LedgerError;

/// Persisted evidence that a step was deployed. Never mutated after write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub step_id: String,
    pub network: NetworkId,
    pub address: Address,
    pub tx_hash: B256,
    pub deployed_at: DateTime<Utc>,
}

/// File-backed deployment record store.
///
/// Reads may run concurrently; writes are serialized behind a single lock.
#[derive(Debug)]
pub struct StateLedger {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl StateLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn ledger_path(&self, network: &NetworkId) -> PathBuf {
        self.dir.join(format!("{network}.json"))
    }

    fn read_records(&self, network: &NetworkId) -> Result<Vec<DeploymentRecord>, LedgerError> {
        let path = self.ledger_path(network);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| LedgerError::Corrupt { path, source })
    }

    /// Most recent record for a step on a network, if any.
    pub fn get(
        &self,
        network: &NetworkId,
        step_id: &str,
    ) -> Result<Option<DeploymentRecord>, LedgerError> {
        Ok(self
            .read_records(network)?
            .into_iter()
            .rev()
            .find(|r| r.step_id == step_id))
    }

    /// All records for a network, oldest first. Superseded records are
    /// included; callers wanting current state take the last per step id.
    pub fn all(&self, network: &NetworkId) -> Result<Vec<DeploymentRecord>, LedgerError> {
        self.read_records(network)
    }

    /// Append a record. Atomic per record: the ledger file is fully written
    /// to a temp path and renamed into place.
    pub fn put(&self, record: DeploymentRecord) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        fs::create_dir_all(&self.dir).map_err(|source| LedgerError::Io {
            path: self.dir.clone(),
            source,
        })?;

        // Cross-process exclusion; released when the handle drops.
        let lock_path = self.dir.join(format!("{}.lock", record.network));
        let lock_file = File::create(&lock_path).map_err(|source| LedgerError::Io {
            path: lock_path.clone(),
            source,
        })?;
        lock_file
            .lock_exclusive()
            .map_err(|source| LedgerError::Io {
                path: lock_path,
                source,
            })?;

        let path = self.ledger_path(&record.network);
        let mut records = self.read_records(&record.network)?;
        records.push(record);

        let json = serde_json::to_string_pretty(&records)
            .map_err(|source| LedgerError::Corrupt {
                path: path.clone(),
                source,
            })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| LedgerError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| LedgerError::Io { path, source })?;

        let _ = fs2::FileExt::unlock(&lock_file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn record(step_id: &str, network: &str, last_byte: u8) -> DeploymentRecord {
        DeploymentRecord {
            step_id: step_id.to_string(),
            network: NetworkId::from(network),
            address: Address::with_last_byte(last_byte),
            tx_hash: B256::with_last_byte(last_byte),
            deployed_at: Utc::now(),
        }
    }

    #[test]
    fn test_get_absent() {
        let dir = TempDir::new("strudel-ledger").expect("tempdir");
        let ledger = StateLedger::new(dir.path());
        let network = NetworkId::from("sepolia");
        assert!(ledger.get(&network, "token").expect("get").is_none());
        assert!(ledger.all(&network).expect("all").is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let dir = TempDir::new("strudel-ledger").expect("tempdir");
        let ledger = StateLedger::new(dir.path());
        let network = NetworkId::from("sepolia");

        let rec = record("token", "sepolia", 1);
        ledger.put(rec.clone()).expect("put");

        let loaded = ledger.get(&network, "token").expect("get");
        assert_eq!(loaded, Some(rec));
    }

    #[test]
    fn test_most_recent_wins() {
        let dir = TempDir::new("strudel-ledger").expect("tempdir");
        let ledger = StateLedger::new(dir.path());
        let network = NetworkId::from("sepolia");

        ledger.put(record("token", "sepolia", 1)).expect("put");
        ledger.put(record("token", "sepolia", 2)).expect("put");

        let current = ledger
            .get(&network, "token")
            .expect("get")
            .expect("record should exist");
        assert_eq!(current.address, Address::with_last_byte(2));

        // History is preserved.
        assert_eq!(ledger.all(&network).expect("all").len(), 2);
    }

    #[test]
    fn test_networks_are_isolated() {
        let dir = TempDir::new("strudel-ledger").expect("tempdir");
        let ledger = StateLedger::new(dir.path());

        ledger.put(record("token", "sepolia", 1)).expect("put");

        let mainnet = NetworkId::from("mainnet");
        assert!(ledger.get(&mainnet, "token").expect("get").is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = TempDir::new("strudel-ledger").expect("tempdir");
        let network = NetworkId::from("local");
        {
            let ledger = StateLedger::new(dir.path());
            ledger.put(record("token", "local", 7)).expect("put");
        }
        let reopened = StateLedger::new(dir.path());
        let loaded = reopened.get(&network, "token").expect("get");
        assert_eq!(
            loaded.map(|r| r.address),
            Some(Address::with_last_byte(7))
        );
    }

    #[test]
    fn test_corrupt_file_reported() {
        let dir = TempDir::new("strudel-ledger").expect("tempdir");
        std::fs::write(dir.path().join("sepolia.json"), "{ not json").expect("write");
        let ledger = StateLedger::new(dir.path());
        let result = ledger.get(&NetworkId::from("sepolia"), "token");
        assert!(matches!(result, Err(LedgerError::Corrupt { .. })));
    }

    #[test]
    fn test_no_partial_write_visible() {
        let dir = TempDir::new("strudel-ledger").expect("tempdir");
        let ledger = StateLedger::new(dir.path());
        ledger.put(record("token", "sepolia", 1)).expect("put");

        // The temp file never survives a completed write.
        assert!(!dir.path().join("sepolia.json.tmp").exists());
    }
}
