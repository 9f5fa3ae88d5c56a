//! Durable attempt history and discovery results
//!
//! Both collections are JSON-lines append files, flushed and synced per
//! record: a discovery must be on disk before anyone hears about it.
//! The dashboard only ever reads the most recent attempts, so those are
//! additionally kept in a bounded in-memory ring.

use std::collections::{HashSet, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

pub const ATTEMPTS_FILE: &str = "attempts.jsonl";
pub const RESULTS_FILE: &str = "results.jsonl";

/// One checked passphrase, immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub passphrase: String,
    pub bitcoin_address: String,
    /// Confirmed balance in BTC (zero included; unknown outcomes are
    /// never recorded here)
    pub balance: f64,
    pub checked_at: DateTime<Utc>,
}

/// A non-zero balance hit, with full recoverable key material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub passphrase: String,
    pub private_key_hex: String,
    pub private_key_wif: String,
    pub bitcoin_address: String,
    pub balance: f64,
    pub discovered_at: DateTime<Utc>,
}

struct Inner {
    attempts_file: File,
    results_file: File,
    recent: VecDeque<AttemptRecord>,
    recent_cap: usize,
    results: Vec<DiscoveryResult>,
    discovered: HashSet<String>,
}

pub struct ResultStore {
    attempts_path: PathBuf,
    results_path: PathBuf,
    inner: Mutex<Inner>,
}

fn load_jsonl<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let mut out = Vec::new();
    if !path.exists() {
        return Ok(out);
    }
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(rec) => out.push(rec),
            // Torn tail write; the record behind it was never acknowledged
            Err(e) => warn!("{}: skipping unreadable line: {}", what, e),
        }
    }
    Ok(out)
}

fn append_jsonl<T: Serialize>(file: &mut File, record: &T) -> Result<()> {
    let line = serde_json::to_string(record)?;
    writeln!(file, "{}", line)?;
    file.flush()?;
    file.sync_data()?;
    Ok(())
}

impl ResultStore {
    /// Open the store under `dir`, replaying prior results and the tail
    /// of the attempt history.
    pub fn open(dir: &Path, recent_cap: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let attempts_path = dir.join(ATTEMPTS_FILE);
        let results_path = dir.join(RESULTS_FILE);

        let mut recent: VecDeque<AttemptRecord> = VecDeque::with_capacity(recent_cap);
        for rec in load_jsonl::<AttemptRecord>(&attempts_path, "attempts")? {
            if recent.len() == recent_cap {
                recent.pop_front();
            }
            recent.push_back(rec);
        }

        let results: Vec<DiscoveryResult> = load_jsonl(&results_path, "results")?;
        let discovered = results.iter().map(|r| r.passphrase.clone()).collect();

        let attempts_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&attempts_path)?;
        let results_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&results_path)?;

        Ok(Self {
            attempts_path,
            results_path,
            inner: Mutex::new(Inner {
                attempts_file,
                results_file,
                recent,
                recent_cap,
                results,
                discovered,
            }),
        })
    }

    /// Durably append one attempt record.
    pub fn record_attempt(&self, record: AttemptRecord) -> Result<()> {
        let mut inner = self.inner.lock();
        append_jsonl(&mut inner.attempts_file, &record)?;
        if inner.recent.len() == inner.recent_cap {
            inner.recent.pop_front();
        }
        inner.recent.push_back(record);
        Ok(())
    }

    /// Durably append a discovery. Idempotent per passphrase: a replayed
    /// crash window cannot double-append. Returns false when the
    /// passphrase was already recorded.
    pub fn record_discovery(&self, result: DiscoveryResult) -> Result<bool> {
        let mut inner = self.inner.lock();
        if inner.discovered.contains(&result.passphrase) {
            return Ok(false);
        }
        append_jsonl(&mut inner.results_file, &result)?;
        inner.discovered.insert(result.passphrase.clone());
        inner.results.push(result);
        Ok(true)
    }

    /// Most recent attempts, newest first.
    pub fn recent_attempts(&self, limit: usize) -> Vec<AttemptRecord> {
        let inner = self.inner.lock();
        inner.recent.iter().rev().take(limit).cloned().collect()
    }

    /// All discoveries, oldest first.
    pub fn results(&self) -> Vec<DiscoveryResult> {
        self.inner.lock().results.clone()
    }

    pub fn discovery_count(&self) -> u64 {
        self.inner.lock().results.len() as u64
    }

    /// Empty both collections. The dedup ledger is deliberately not
    /// touched here; clearing history never re-opens tested candidates.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.attempts_file.set_len(0)?;
        inner.attempts_file.seek(SeekFrom::Start(0))?;
        inner.attempts_file.sync_data()?;
        inner.results_file.set_len(0)?;
        inner.results_file.seek(SeekFrom::Start(0))?;
        inner.results_file.sync_data()?;
        inner.recent.clear();
        inner.results.clear();
        inner.discovered.clear();
        Ok(())
    }

    pub fn attempts_path(&self) -> &Path {
        &self.attempts_path
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn attempt(passphrase: &str, balance: f64) -> AttemptRecord {
        AttemptRecord {
            passphrase: passphrase.to_string(),
            bitcoin_address: "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string(),
            balance,
            checked_at: Utc::now(),
        }
    }

    fn discovery(passphrase: &str) -> DiscoveryResult {
        DiscoveryResult {
            passphrase: passphrase.to_string(),
            private_key_hex: "ab".repeat(32),
            private_key_wif: "5K...".to_string(),
            bitcoin_address: "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa".to_string(),
            balance: 1.5,
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn test_attempts_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = ResultStore::open(dir.path(), 100).unwrap();
            store.record_attempt(attempt("password", 0.0)).unwrap();
            store.record_attempt(attempt("satoshi", 0.0)).unwrap();
        }
        let store = ResultStore::open(dir.path(), 100).unwrap();
        let recent = store.recent_attempts(10);
        assert_eq!(recent.len(), 2);
        // Newest first
        assert_eq!(recent[0].passphrase, "satoshi");
    }

    #[test]
    fn test_recent_ring_is_bounded() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path(), 3).unwrap();
        for i in 0..10 {
            store.record_attempt(attempt(&format!("p{}", i), 0.0)).unwrap();
        }
        let recent = store.recent_attempts(100);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].passphrase, "p9");
        assert_eq!(recent[2].passphrase, "p7");
    }

    #[test]
    fn test_discovery_idempotent_per_passphrase() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path(), 100).unwrap();
        assert!(store.record_discovery(discovery("winner")).unwrap());
        assert!(!store.record_discovery(discovery("winner")).unwrap());
        assert_eq!(store.discovery_count(), 1);

        // And across a reopen
        drop(store);
        let store = ResultStore::open(dir.path(), 100).unwrap();
        assert!(!store.record_discovery(discovery("winner")).unwrap());
        assert_eq!(store.discovery_count(), 1);
    }

    #[test]
    fn test_clear_empties_everything() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::open(dir.path(), 100).unwrap();
        store.record_attempt(attempt("password", 0.0)).unwrap();
        store.record_discovery(discovery("winner")).unwrap();

        store.clear().unwrap();
        assert!(store.recent_attempts(10).is_empty());
        assert!(store.results().is_empty());
        assert_eq!(store.discovery_count(), 0);

        // Cleared on disk too
        drop(store);
        let store = ResultStore::open(dir.path(), 100).unwrap();
        assert!(store.recent_attempts(10).is_empty());
        assert_eq!(store.discovery_count(), 0);
    }
}
