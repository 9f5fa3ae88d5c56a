//! Worker pool and run lifecycle
//!
//! The engine drives N concurrent pipelines over one shared candidate
//! stream and one rate-limited oracle handle:
//!
//! ```text
//! source ──▶ reserve ──▶ derive ──▶ rate limit ──▶ lookup ──▶ record
//!              │                                      │
//!              └──────── release + requeue ◀──────────┘ (unknown)
//! ```
//!
//! Per candidate the stages are strictly ordered; across candidates
//! nothing is. Stop is cooperative: in-flight candidates drain to a
//! durable record (or a clean release) within a bounded grace period.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{HuntError, Result};
use crate::keys::{self, DerivedKey};
use crate::ledger::{DedupLedger, Reservation};
use crate::oracle::{BalanceOracle, BalanceOutcome, BlockchainInfoOracle, RateLimiter};
use crate::source::PassphraseStream;
use crate::stats::{StatsAggregator, StatsSnapshot};
use crate::store::{AttemptRecord, DiscoveryResult, ResultStore};

/// Transient per-run telemetry; replaced wholesale on every Start
struct RunSession {
    started_at: DateTime<Utc>,
    started_mono: Instant,
    attempts: AtomicU64,
    /// Most recently started candidate. Advisory only, last writer wins.
    current: Mutex<String>,
}

/// Live view for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub is_running: bool,
    pub current_passphrase: String,
    pub total_attempts: u64,
    pub found_keys: u64,
    pub start_time: Option<DateTime<Utc>>,
    /// Session attempts per hour
    pub progress: f64,
    pub session_attempts: u64,
}

struct Shared {
    config: Config,
    ledger: DedupLedger,
    store: ResultStore,
    stats: StatsAggregator,
    oracle: Box<dyn BalanceOracle>,
    limiter: RateLimiter,
    running: AtomicBool,
    source: Mutex<PassphraseStream>,
    session: Mutex<Option<Arc<RunSession>>>,
    retry_tx: Sender<String>,
    retry_rx: Receiver<String>,
}

struct WorkerSet {
    handles: Vec<JoinHandle<()>>,
    done_rx: Receiver<()>,
    /// Owned by this spawn generation. A later Start never resets it, so
    /// a worker abandoned past the grace period can only ever exit.
    stop_flag: Arc<AtomicBool>,
}

pub struct Engine {
    shared: Arc<Shared>,
    // Also serializes Start/Stop/Clear transitions
    workers: Mutex<Option<WorkerSet>>,
}

impl Engine {
    pub fn new(config: Config, oracle: Box<dyn BalanceOracle>) -> Result<Self> {
        let ledger = DedupLedger::open(&config.data_dir)?;
        let store = ResultStore::open(&config.data_dir, config.recent_attempts)?;
        let stats = StatsAggregator::open(&config.data_dir)?;
        let limiter = RateLimiter::new(config.requests_per_sec, config.rate_burst);
        let (retry_tx, retry_rx) = unbounded();

        info!(
            tested = ledger.len(),
            found = store.discovery_count(),
            "state loaded"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                ledger,
                store,
                stats,
                oracle,
                limiter,
                running: AtomicBool::new(false),
                source: Mutex::new(PassphraseStream::new()),
                session: Mutex::new(None),
                retry_tx,
                retry_rx,
            }),
            workers: Mutex::new(None),
        })
    }

    pub fn with_default_oracle(config: Config) -> Result<Self> {
        let oracle = BlockchainInfoOracle::new(&config)?;
        Self::new(config, Box::new(oracle))
    }

    /// Stopped → Running. Rejected while already running; the live
    /// session is left untouched in that case.
    pub fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if self.shared.running.load(Ordering::SeqCst) {
            return Err(HuntError::AlreadyRunning);
        }

        let session = Arc::new(RunSession {
            started_at: Utc::now(),
            started_mono: Instant::now(),
            attempts: AtomicU64::new(0),
            current: Mutex::new(String::new()),
        });
        *self.shared.session.lock() = Some(Arc::clone(&session));

        let count = self.shared.config.workers.max(1);
        let (done_tx, done_rx) = unbounded();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let shared = Arc::clone(&self.shared);
            let session = Arc::clone(&session);
            let stop_flag = Arc::clone(&stop_flag);
            let done_tx = done_tx.clone();
            handles.push(
                std::thread::Builder::new()
                    .name(format!("hunt-worker-{}", i))
                    .spawn(move || worker_loop(shared, session, stop_flag, done_tx))?,
            );
        }
        *workers = Some(WorkerSet {
            handles,
            done_rx,
            stop_flag,
        });
        self.shared.running.store(true, Ordering::SeqCst);
        info!(workers = count, "cracking started");
        Ok(())
    }

    /// Running → Stopped. In-flight candidates drain to completion; a
    /// worker stuck past the grace period is abandoned with an error
    /// log (it can only be waiting on the oracle, whose retries also
    /// observe the stop flag). Stop while Stopped is a no-op.
    pub fn stop(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if !self.shared.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(set) = workers.take() {
            set.stop_flag.store(true, Ordering::SeqCst);
            let deadline = Instant::now() + self.shared.config.shutdown_grace;
            let mut remaining = set.handles.len();
            while remaining > 0 {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break;
                }
                match set.done_rx.recv_timeout(left) {
                    Ok(()) => remaining -= 1,
                    Err(_) => break,
                }
            }
            if remaining > 0 {
                error!(remaining, "workers did not drain within grace period");
            } else {
                for handle in set.handles {
                    let _ = handle.join();
                }
            }
        }

        self.shared.running.store(false, Ordering::SeqCst);
        info!("cracking stopped");
        Ok(())
    }

    /// Empty results, attempt history and stats. Rejected while running.
    /// The dedup ledger survives: clearing history never re-opens
    /// already-tested passphrases.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.workers.lock();
        if self.shared.running.load(Ordering::SeqCst) {
            return Err(HuntError::StillRunning);
        }
        self.shared.store.clear()?;
        self.shared.stats.reset()?;
        info!("history, results and stats cleared; dedup ledger kept");
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        let is_running = self.shared.running.load(Ordering::SeqCst);
        let session = self.shared.session.lock().clone();
        let (current, session_attempts, start_time, rate) = match session {
            Some(s) => {
                let attempts = s.attempts.load(Ordering::Relaxed);
                let hours = s.started_mono.elapsed().as_secs_f64() / 3600.0;
                let rate = if hours > 0.0 {
                    attempts as f64 / hours
                } else {
                    0.0
                };
                (s.current.lock().clone(), attempts, Some(s.started_at), rate)
            }
            None => (String::new(), 0, None, 0.0),
        };
        EngineStatus {
            is_running,
            current_passphrase: current,
            total_attempts: self.shared.stats.counters().total_attempts,
            found_keys: self.shared.store.discovery_count(),
            start_time,
            progress: rate,
            session_attempts,
        }
    }

    /// Side-effect-free diagnostic path: derive plus one rate-limited
    /// lookup. Touches no ledger, store or stats.
    pub fn probe(&self, passphrase: &str) -> Result<(DerivedKey, f64)> {
        let derived = keys::derive(passphrase)?;
        let never_stop = AtomicBool::new(false);
        self.shared.limiter.acquire(&never_stop);
        match self.shared.oracle.lookup(&derived.address, &never_stop)? {
            BalanceOutcome::Confirmed(balance) => Ok((derived, balance)),
            BalanceOutcome::Unknown => Err(HuntError::BalanceUnavailable(derived.address)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn results(&self) -> Vec<DiscoveryResult> {
        self.shared.store.results()
    }

    pub fn recent_attempts(&self, limit: usize) -> Vec<AttemptRecord> {
        self.shared.store.recent_attempts(limit)
    }

    pub fn ledger(&self) -> &DedupLedger {
        &self.shared.ledger
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn worker_loop(
    shared: Arc<Shared>,
    session: Arc<RunSession>,
    stop_flag: Arc<AtomicBool>,
    done_tx: Sender<()>,
) {
    while !stop_flag.load(Ordering::Relaxed) {
        // Requeued candidates (oracle-unknown) take priority over fresh ones
        let candidate = match shared.retry_rx.try_recv() {
            Ok(p) => p,
            Err(_) => shared.source.lock().next_candidate(),
        };

        if shared.ledger.reserve(&candidate) == Reservation::AlreadyTested {
            continue;
        }
        *session.current.lock() = candidate.clone();

        let derived = match keys::derive(&candidate) {
            Ok(d) => d,
            Err(e) => {
                warn!("derivation fault, skipping candidate: {}", e);
                let _ = shared.stats.record_derivation_fault();
                shared.ledger.release(&candidate);
                continue;
            }
        };

        // Admission is the throughput governor; a denied acquire means
        // we are stopping and nothing durable happened for this candidate.
        // Hand it back so the next session picks it up first.
        if !shared.limiter.acquire(&stop_flag) {
            shared.ledger.release(&candidate);
            let _ = shared.retry_tx.send(candidate);
            break;
        }

        let outcome = match shared.oracle.lookup(&derived.address, &stop_flag) {
            Ok(o) => o,
            Err(e) => {
                warn!(address = %derived.address, "oracle error: {}", e);
                BalanceOutcome::Unknown
            }
        };

        match outcome {
            BalanceOutcome::Confirmed(balance) => {
                if let Err(e) = record_confirmed(&shared, &candidate, &derived, balance) {
                    // Never mark progress that could not be persisted
                    error!("storage failure, worker stopping: {}", e);
                    shared.ledger.release(&candidate);
                    break;
                }
                session.attempts.fetch_add(1, Ordering::Relaxed);
            }
            BalanceOutcome::Unknown => {
                let _ = shared.stats.record_lookup_failure();
                shared.ledger.release(&candidate);
                let _ = shared.retry_tx.send(candidate);
            }
        }
    }
    let _ = done_tx.send(());
}

/// Durable ordering per candidate: discovery first (the payload must
/// never be lost), then the ledger commit, then the attempt record,
/// then counters. A crash before the commit re-runs the candidate after
/// restart (the discovery append is idempotent); a crash after it can
/// lose one history line but never duplicates one.
fn record_confirmed(
    shared: &Shared,
    passphrase: &str,
    derived: &DerivedKey,
    balance: f64,
) -> Result<()> {
    let success = balance > 0.0;
    if success {
        let fresh = shared.store.record_discovery(DiscoveryResult {
            passphrase: passphrase.to_string(),
            private_key_hex: derived.private_key_hex.clone(),
            private_key_wif: derived.private_key_wif.clone(),
            bitcoin_address: derived.address.clone(),
            balance,
            discovered_at: Utc::now(),
        })?;
        if fresh {
            info!(
                passphrase,
                address = %derived.address,
                balance,
                "DISCOVERY: non-zero balance"
            );
        }
    }
    shared.ledger.commit(passphrase)?;
    shared.store.record_attempt(AttemptRecord {
        passphrase: passphrase.to_string(),
        bitcoin_address: derived.address.clone(),
        balance,
        checked_at: Utc::now(),
    })?;
    shared.stats.record_check(success)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct ZeroOracle;

    impl BalanceOracle for ZeroOracle {
        fn lookup(&self, _address: &str, _stop: &AtomicBool) -> Result<BalanceOutcome> {
            Ok(BalanceOutcome::Confirmed(0.0))
        }
    }

    fn test_engine(dir: &TempDir) -> Engine {
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            workers: 2,
            requests_per_sec: 10_000.0,
            rate_burst: 100,
            ..Config::default()
        };
        Engine::new(config, Box::new(ZeroOracle)).unwrap()
    }

    #[test]
    fn test_idle_status() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);
        let status = engine.status();
        assert!(!status.is_running);
        assert!(status.start_time.is_none());
        assert_eq!(status.session_attempts, 0);
    }

    #[test]
    fn test_stop_while_stopped_is_noop() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);
        engine.stop().unwrap();
        engine.stop().unwrap();
    }

    #[test]
    fn test_clear_while_stopped_succeeds() {
        let dir = TempDir::new().unwrap();
        let engine = test_engine(&dir);
        engine.clear().unwrap();
        assert_eq!(engine.stats_snapshot().total_checked_passphrases, 0);
    }
}
