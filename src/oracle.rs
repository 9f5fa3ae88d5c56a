//! Balance oracle — the external, rate-limited dependency
//!
//! The provider is substituted behind the `BalanceOracle` capability
//! trait so the scheduler and ledger never see a wire format. The stock
//! implementation queries blockchain.info's batch balance endpoint the
//! same way the surrounding ecosystem of scanners does.
//!
//! A lookup that cannot be confirmed after bounded retries comes back as
//! `Unknown`, never as a guessed zero: a false zero would durably skip a
//! funded address.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;

const SATS_PER_BTC: f64 = 100_000_000.0;
const STOP_POLL: Duration = Duration::from_millis(50);

/// Result of one balance lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BalanceOutcome {
    /// The provider answered; balance in BTC (zero is a real answer)
    Confirmed(f64),
    /// Retries exhausted or the answer was unusable
    Unknown,
}

/// Capability interface for any balance provider
pub trait BalanceOracle: Send + Sync {
    /// Look up the confirmed balance of `address`. `stop` aborts retry
    /// waits early during shutdown; the outcome is then `Unknown`.
    fn lookup(&self, address: &str, stop: &AtomicBool) -> Result<BalanceOutcome>;
}

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

struct BucketState {
    tokens: f64,
    refilled_at: Instant,
}

/// Token bucket shared by every worker; the throughput governor of the
/// whole pipeline.
pub struct RateLimiter {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(requests_per_sec: f64, burst: u32) -> Self {
        let rate = requests_per_sec.max(0.001);
        let capacity = (burst.max(1)) as f64;
        Self {
            rate,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Block until a token is available. Returns false if `stop` was
    /// raised while waiting; the caller must not proceed to the lookup.
    pub fn acquire(&self, stop: &AtomicBool) -> bool {
        loop {
            if stop.load(Ordering::Relaxed) {
                return false;
            }
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                let elapsed = now.duration_since(state.refilled_at).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
                state.refilled_at = now;
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return true;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate)
            };
            std::thread::sleep(wait.min(STOP_POLL));
        }
    }
}

// ---------------------------------------------------------------------------
// blockchain.info provider
// ---------------------------------------------------------------------------

enum FetchError {
    /// Timeout, connect failure, 429, 5xx — worth retrying
    Transient(String),
    /// Anything retrying will not fix
    Permanent(String),
}

pub struct BlockchainInfoOracle {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl BlockchainInfoOracle {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.oracle_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay,
        })
    }

    fn fetch(&self, address: &str) -> std::result::Result<f64, FetchError> {
        let url = format!("{}/balance?active={}", self.base_url, address);
        let response = self.client.get(&url).send().map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                FetchError::Transient(e.to_string())
            } else {
                FetchError::Permanent(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(FetchError::Transient(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(FetchError::Permanent(format!("HTTP {}", status)));
        }

        let body: serde_json::Value = response
            .json()
            .map_err(|e| FetchError::Permanent(e.to_string()))?;
        parse_balance(address, &body)
            .ok_or_else(|| FetchError::Permanent("address missing in response".into()))
    }
}

/// Extract `final_balance` (satoshis) for `address` and convert to BTC
fn parse_balance(address: &str, body: &serde_json::Value) -> Option<f64> {
    let sats = body.get(address)?.get("final_balance")?.as_u64()?;
    Some(sats as f64 / SATS_PER_BTC)
}

impl BalanceOracle for BlockchainInfoOracle {
    fn lookup(&self, address: &str, stop: &AtomicBool) -> Result<BalanceOutcome> {
        let mut delay = self.base_delay;
        for attempt in 0..=self.max_retries {
            if stop.load(Ordering::Relaxed) {
                return Ok(BalanceOutcome::Unknown);
            }
            match self.fetch(address) {
                Ok(btc) => return Ok(BalanceOutcome::Confirmed(btc)),
                Err(FetchError::Transient(msg)) => {
                    if attempt == self.max_retries {
                        warn!(address, "lookup retries exhausted: {}", msg);
                        return Ok(BalanceOutcome::Unknown);
                    }
                    debug!(address, attempt, "transient lookup failure, backing off: {}", msg);
                    sleep_cancellable(delay, stop);
                    delay *= 2;
                }
                Err(FetchError::Permanent(msg)) => {
                    warn!(address, "lookup failed: {}", msg);
                    return Ok(BalanceOutcome::Unknown);
                }
            }
        }
        Ok(BalanceOutcome::Unknown)
    }
}

fn sleep_cancellable(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return;
        }
        std::thread::sleep(STOP_POLL.min(left));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_balance_satoshi_conversion() {
        let body: serde_json::Value = serde_json::from_str(
            r#"{"1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa":{"final_balance":150000000,"n_tx":4,"total_received":150000000}}"#,
        )
        .unwrap();
        let btc = parse_balance("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", &body).unwrap();
        assert!((btc - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_balance_missing_address() {
        let body: serde_json::Value = serde_json::from_str(r#"{"other":{}}"#).unwrap();
        assert!(parse_balance("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", &body).is_none());
    }

    #[test]
    fn test_limiter_allows_burst_then_throttles() {
        let limiter = RateLimiter::new(1000.0, 2);
        let stop = AtomicBool::new(false);
        assert!(limiter.acquire(&stop));
        assert!(limiter.acquire(&stop));
        // Third token needs a refill; at 1000/s this returns quickly
        assert!(limiter.acquire(&stop));
    }

    #[test]
    fn test_limiter_aborts_on_stop() {
        let limiter = RateLimiter::new(0.001, 1);
        let stop = AtomicBool::new(false);
        assert!(limiter.acquire(&stop)); // burst token
        stop.store(true, Ordering::SeqCst);
        // Next admission would take ~1000s; stop must break the wait
        assert!(!limiter.acquire(&stop));
    }

    // -----------------------------------------------------------------
    // Retry loop against a scripted local listener
    // -----------------------------------------------------------------

    use std::io::{Read as _, Write as _};
    use std::net::TcpListener;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    const ADDR: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    /// Serve one canned response per connection, then exit.
    fn serve_script(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        std::thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = match listener.accept() {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                // Drain the request head before answering
                let mut buf = [0u8; 1024];
                let mut head = Vec::new();
                loop {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            head.extend_from_slice(&buf[..n]);
                            if head.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }
                seen.fetch_add(1, Ordering::SeqCst);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (url, hits)
    }

    fn http_error(status: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            status
        )
    }

    fn http_ok(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn stub_oracle(url: &str) -> BlockchainInfoOracle {
        let config = Config {
            oracle_url: url.to_string(),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(10),
            request_timeout: Duration::from_secs(5),
            ..Config::default()
        };
        BlockchainInfoOracle::new(&config).unwrap()
    }

    #[test]
    fn test_lookup_retries_transient_then_confirms() {
        let body = format!(r#"{{"{}":{{"final_balance":150000000,"n_tx":4,"total_received":150000000}}}}"#, ADDR);
        let (url, hits) = serve_script(vec![
            http_error("500 Internal Server Error"),
            http_error("429 Too Many Requests"),
            http_ok(&body),
        ]);
        let oracle = stub_oracle(&url);
        let stop = AtomicBool::new(false);

        let outcome = oracle.lookup(ADDR, &stop).unwrap();
        assert_eq!(outcome, BalanceOutcome::Confirmed(1.5));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_lookup_permanent_failure_does_not_retry() {
        let (url, hits) = serve_script(vec![http_error("404 Not Found")]);
        let oracle = stub_oracle(&url);
        let stop = AtomicBool::new(false);

        let outcome = oracle.lookup(ADDR, &stop).unwrap();
        assert_eq!(outcome, BalanceOutcome::Unknown);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lookup_exhausts_retry_cap() {
        // max_retries = 3 means four tries total
        let (url, hits) = serve_script(vec![
            http_error("500 Internal Server Error"),
            http_error("503 Service Unavailable"),
            http_error("500 Internal Server Error"),
            http_error("502 Bad Gateway"),
        ]);
        let oracle = stub_oracle(&url);
        let stop = AtomicBool::new(false);

        let outcome = oracle.lookup(ADDR, &stop).unwrap();
        assert_eq!(outcome, BalanceOutcome::Unknown);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }
}
