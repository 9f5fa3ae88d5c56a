//! External interface boundary
//!
//! Transport-agnostic handlers matching the dashboard contract. An HTTP
//! layer is a thin collaborator around this: each method corresponds to
//! one route and returns exactly the JSON shape the dashboard marshals.
//! Rejections carry a `detail` string, the error body the dashboard
//! expects.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::Engine;
use crate::error::HuntError;
use crate::stats::StatsSnapshot;
use crate::store::DiscoveryResult;

/// GET /status
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub is_running: bool,
    pub current_passphrase: String,
    pub total_attempts: u64,
    pub found_keys: u64,
    pub start_time: Option<DateTime<Utc>>,
    /// Attempts per hour for the current session
    pub progress: f64,
}

/// One entry of GET /results
#[derive(Debug, Clone, Serialize)]
pub struct ResultEntry {
    pub passphrase: String,
    pub private_key: String,
    pub private_key_wif: String,
    pub bitcoin_address: String,
    pub balance: f64,
    pub discovered_at: DateTime<Utc>,
}

impl From<DiscoveryResult> for ResultEntry {
    fn from(r: DiscoveryResult) -> Self {
        Self {
            passphrase: r.passphrase,
            private_key: r.private_key_hex,
            private_key_wif: r.private_key_wif,
            bitcoin_address: r.bitcoin_address,
            balance: r.balance,
            discovered_at: r.discovered_at,
        }
    }
}

/// One entry of GET /attempts
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSummary {
    pub passphrase: String,
    pub bitcoin_address: String,
    pub balance: f64,
}

/// POST /test-crypto
#[derive(Debug, Clone, Serialize)]
pub struct TestCryptoResponse {
    pub passphrase: String,
    pub private_key: String,
    pub private_key_wif: String,
    pub bitcoin_address: String,
    pub balance: f64,
}

/// Body of a successful control action
#[derive(Debug, Clone, Serialize)]
pub struct ActionReply {
    pub message: String,
    pub status: String,
}

/// Error body for rejected requests
#[derive(Debug, Clone, Serialize)]
pub struct ApiRejection {
    pub detail: String,
}

impl From<HuntError> for ApiRejection {
    fn from(e: HuntError) -> Self {
        Self {
            detail: e.to_string(),
        }
    }
}

pub struct Api {
    engine: Arc<Engine>,
}

impl Api {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn status(&self) -> StatusResponse {
        let s = self.engine.status();
        StatusResponse {
            is_running: s.is_running,
            current_passphrase: s.current_passphrase,
            total_attempts: s.total_attempts,
            found_keys: s.found_keys,
            start_time: s.start_time,
            progress: s.progress,
        }
    }

    pub fn results(&self) -> Vec<ResultEntry> {
        self.engine.results().into_iter().map(Into::into).collect()
    }

    pub fn attempts(&self, limit: usize) -> Vec<AttemptSummary> {
        self.engine
            .recent_attempts(limit)
            .into_iter()
            .map(|a| AttemptSummary {
                passphrase: a.passphrase,
                bitcoin_address: a.bitcoin_address,
                balance: a.balance,
            })
            .collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.engine.stats_snapshot()
    }

    pub fn start_cracking(&self) -> Result<ActionReply, ApiRejection> {
        self.engine.start()?;
        Ok(ActionReply {
            message: "Cracking started".to_string(),
            status: "running".to_string(),
        })
    }

    pub fn stop_cracking(&self) -> Result<ActionReply, ApiRejection> {
        self.engine.stop()?;
        Ok(ActionReply {
            message: "Cracking stopped".to_string(),
            status: "stopped".to_string(),
        })
    }

    pub fn clear_data(&self) -> Result<ActionReply, ApiRejection> {
        self.engine.clear()?;
        Ok(ActionReply {
            message: "All data cleared".to_string(),
            status: "cleared".to_string(),
        })
    }

    /// Pure diagnostic path: derive + one lookup, no ledger, no store,
    /// no stats.
    pub fn test_crypto(&self, passphrase: &str) -> Result<TestCryptoResponse, ApiRejection> {
        let (derived, balance) = self.engine.probe(passphrase)?;
        Ok(TestCryptoResponse {
            passphrase: passphrase.to_string(),
            private_key: derived.private_key_hex,
            private_key_wif: derived.private_key_wif,
            bitcoin_address: derived.address,
            balance,
        })
    }
}
