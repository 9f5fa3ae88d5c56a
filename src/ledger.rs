//! Dedup ledger — the durable "never test twice" set
//!
//! One JSON-encoded passphrase per line in `tested.log`, mirrored by an
//! in-memory set. Reservation is the single exclusivity point of the
//! whole pipeline: exactly one concurrent caller wins a passphrase.
//!
//! A reservation only becomes durable at `commit`, once the lookup
//! outcome is confirmed and before the attempt record is appended. A
//! crash between reserve and commit leaves no trace, so the candidate is
//! simply retried after restart; a crash after commit can lose one
//! history line but never duplicate one.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::Result;

pub const LEDGER_FILE: &str = "tested.log";

/// Outcome of a reservation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// Caller owns this candidate and must commit or release it
    Reserved,
    /// Someone already tested (or is testing) this candidate
    AlreadyTested,
}

struct Inner {
    tested: HashSet<String>,
    file: File,
}

pub struct DedupLedger {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl DedupLedger {
    /// Open (or create) the ledger and replay every committed entry.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(LEDGER_FILE);

        let mut tested = HashSet::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<String>(&line) {
                    Ok(p) => {
                        tested.insert(p);
                    }
                    Err(e) => {
                        // Torn tail write from a crash; everything before it
                        // is intact, the candidate behind it was never
                        // committed and will be retried.
                        warn!("ledger: skipping unreadable line: {}", e);
                    }
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            inner: Mutex::new(Inner { tested, file }),
        })
    }

    /// Atomically claim a candidate. At most one `Reserved` per passphrase
    /// per ledger lifetime, restarts included.
    pub fn reserve(&self, passphrase: &str) -> Reservation {
        let mut inner = self.inner.lock();
        if inner.tested.insert(passphrase.to_string()) {
            Reservation::Reserved
        } else {
            Reservation::AlreadyTested
        }
    }

    /// Make a reservation durable. Call only once the lookup outcome is
    /// confirmed, before the attempt record is appended.
    pub fn commit(&self, passphrase: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let line = serde_json::to_string(passphrase)?;
        writeln!(inner.file, "{}", line)?;
        inner.file.flush()?;
        inner.file.sync_data()?;
        Ok(())
    }

    /// Undo an uncommitted reservation (oracle unknown, shutdown, storage
    /// failure). The candidate becomes claimable again.
    pub fn release(&self, passphrase: &str) {
        self.inner.lock().tested.remove(passphrase);
    }

    /// Distinct passphrases reserved or committed
    pub fn len(&self) -> usize {
        self.inner.lock().tested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_tested(&self, passphrase: &str) -> bool {
        self.inner.lock().tested.contains(passphrase)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reserve_then_duplicate() {
        let dir = TempDir::new().unwrap();
        let ledger = DedupLedger::open(dir.path()).unwrap();

        assert_eq!(ledger.reserve("password"), Reservation::Reserved);
        assert_eq!(ledger.reserve("password"), Reservation::AlreadyTested);
        assert_eq!(ledger.reserve("hunter2"), Reservation::Reserved);
    }

    #[test]
    fn test_commit_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let ledger = DedupLedger::open(dir.path()).unwrap();
            assert_eq!(ledger.reserve("password"), Reservation::Reserved);
            ledger.commit("password").unwrap();
        }
        let ledger = DedupLedger::open(dir.path()).unwrap();
        assert_eq!(ledger.reserve("password"), Reservation::AlreadyTested);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_uncommitted_reservation_not_durable() {
        let dir = TempDir::new().unwrap();
        {
            let ledger = DedupLedger::open(dir.path()).unwrap();
            assert_eq!(ledger.reserve("transient"), Reservation::Reserved);
            // crash: no commit
        }
        let ledger = DedupLedger::open(dir.path()).unwrap();
        assert_eq!(ledger.reserve("transient"), Reservation::Reserved);
    }

    #[test]
    fn test_release_reopens_candidate() {
        let dir = TempDir::new().unwrap();
        let ledger = DedupLedger::open(dir.path()).unwrap();

        assert_eq!(ledger.reserve("requeue-me"), Reservation::Reserved);
        ledger.release("requeue-me");
        assert_eq!(ledger.reserve("requeue-me"), Reservation::Reserved);
    }

    #[test]
    fn test_concurrent_reserve_single_winner() {
        use std::sync::Arc;

        let dir = TempDir::new().unwrap();
        let ledger = Arc::new(DedupLedger::open(dir.path()).unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || ledger.reserve("test")));
        }

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| *r == Reservation::Reserved)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_passphrase_with_newline_roundtrips() {
        let dir = TempDir::new().unwrap();
        let tricky = "line one\nline two";
        {
            let ledger = DedupLedger::open(dir.path()).unwrap();
            assert_eq!(ledger.reserve(tricky), Reservation::Reserved);
            ledger.commit(tricky).unwrap();
        }
        let ledger = DedupLedger::open(dir.path()).unwrap();
        assert_eq!(ledger.reserve(tricky), Reservation::AlreadyTested);
    }
}
