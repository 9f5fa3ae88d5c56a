//! Runtime configuration
//!
//! Plain struct with sane defaults; the CLI overrides individual fields.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the ledger, attempt log, results and stats
    pub data_dir: PathBuf,
    /// Number of concurrent pipeline workers
    pub workers: usize,
    /// Balance provider base URL
    pub oracle_url: String,
    /// Per-request timeout for balance lookups
    pub request_timeout: Duration,
    /// Retries per lookup before the outcome is reported unknown
    pub max_retries: u32,
    /// First backoff delay; doubles per retry
    pub retry_base_delay: Duration,
    /// Oracle admission rate shared by all workers
    pub requests_per_sec: f64,
    /// Token bucket burst size
    pub rate_burst: u32,
    /// How many recent attempts to keep in memory for the dashboard
    pub recent_attempts: usize,
    /// How long Stop waits for in-flight candidates to drain
    pub shutdown_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            workers: 4,
            oracle_url: "https://blockchain.info".to_string(),
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            // blockchain.info tolerates ~2 req/s sustained
            requests_per_sec: 2.0,
            rate_burst: 2,
            recent_attempts: 1000,
            shutdown_grace: Duration::from_secs(15),
        }
    }
}
