//! Cumulative statistics
//!
//! Counters live for the lifetime of the ledger and survive restarts:
//! `stats.json` is rewritten through a temp file + atomic rename on every
//! update, so a crash can lose at most the latest increment (which the
//! retried candidate re-applies anyway).

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const STATS_FILE: &str = "stats.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub total_checked_passphrases: u64,
    pub total_attempts: u64,
    pub total_successful_cracks: u64,
    /// Candidates whose derivation failed; kept apart from zero-balance checks
    #[serde(default)]
    pub derivation_faults: u64,
    /// Lookups that exhausted retries and were requeued
    #[serde(default)]
    pub lookup_failures: u64,
}

/// The dashboard-facing view
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_checked_passphrases: u64,
    pub total_attempts: u64,
    pub total_successful_cracks: u64,
    pub success_rate_percentage: f64,
}

pub struct StatsAggregator {
    path: PathBuf,
    counters: Mutex<Counters>,
}

impl StatsAggregator {
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STATS_FILE);
        let counters = if path.exists() {
            serde_json::from_str(&std::fs::read_to_string(&path)?)?
        } else {
            Counters::default()
        };
        Ok(Self {
            path,
            counters: Mutex::new(counters),
        })
    }

    fn persist(&self, counters: &Counters) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(counters)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// One confirmed check (zero balance included). `success` marks a
    /// non-zero balance discovery.
    pub fn record_check(&self, success: bool) -> Result<()> {
        let mut counters = self.counters.lock();
        counters.total_checked_passphrases += 1;
        counters.total_attempts += 1;
        if success {
            counters.total_successful_cracks += 1;
        }
        self.persist(&counters)
    }

    pub fn record_derivation_fault(&self) -> Result<()> {
        let mut counters = self.counters.lock();
        counters.derivation_faults += 1;
        self.persist(&counters)
    }

    pub fn record_lookup_failure(&self) -> Result<()> {
        let mut counters = self.counters.lock();
        counters.lookup_failures += 1;
        self.persist(&counters)
    }

    /// Zero everything (clear-data path only).
    pub fn reset(&self) -> Result<()> {
        let mut counters = self.counters.lock();
        *counters = Counters::default();
        self.persist(&counters)
    }

    pub fn counters(&self) -> Counters {
        self.counters.lock().clone()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = self.counters.lock();
        let rate = if c.total_checked_passphrases == 0 {
            0.0
        } else {
            c.total_successful_cracks as f64 / c.total_checked_passphrases as f64 * 100.0
        };
        StatsSnapshot {
            total_checked_passphrases: c.total_checked_passphrases,
            total_attempts: c.total_attempts,
            total_successful_cracks: c.total_successful_cracks,
            success_rate_percentage: rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_success_rate_zero_denominator() {
        let dir = TempDir::new().unwrap();
        let stats = StatsAggregator::open(dir.path()).unwrap();
        assert_eq!(stats.snapshot().success_rate_percentage, 0.0);
    }

    #[test]
    fn test_success_rate_math() {
        let dir = TempDir::new().unwrap();
        let stats = StatsAggregator::open(dir.path()).unwrap();
        stats.record_check(true).unwrap();
        stats.record_check(false).unwrap();
        stats.record_check(false).unwrap();
        stats.record_check(false).unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.total_checked_passphrases, 4);
        assert_eq!(snap.total_successful_cracks, 1);
        assert!((snap.success_rate_percentage - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_counters_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let stats = StatsAggregator::open(dir.path()).unwrap();
            stats.record_check(false).unwrap();
            stats.record_check(false).unwrap();
            stats.record_lookup_failure().unwrap();
        }
        let stats = StatsAggregator::open(dir.path()).unwrap();
        let c = stats.counters();
        assert_eq!(c.total_checked_passphrases, 2);
        assert_eq!(c.lookup_failures, 1);
    }

    #[test]
    fn test_reset_zeroes_all() {
        let dir = TempDir::new().unwrap();
        let stats = StatsAggregator::open(dir.path()).unwrap();
        stats.record_check(true).unwrap();
        stats.record_derivation_fault().unwrap();
        stats.reset().unwrap();

        let c = stats.counters();
        assert_eq!(c.total_checked_passphrases, 0);
        assert_eq!(c.total_successful_cracks, 0);
        assert_eq!(c.derivation_faults, 0);
    }
}
