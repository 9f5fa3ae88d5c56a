//! brainhunt: Continuous Brain-Wallet Passphrase Auditor
//!
//! Architecture:
//! - `source`: deterministic, infinite candidate passphrase stream
//! - `keys`: pure passphrase → (private key, WIF, address) derivation
//! - `ledger`: durable dedup set — the "never test twice" guarantee
//! - `oracle`: rate-limited, retrying balance provider interface
//! - `store` / `stats`: durable attempt history, discoveries, counters
//! - `engine`: worker pool and run/stop/clear lifecycle
//! - `api`: transport-agnostic handlers for the dashboard contract

pub mod address;
pub mod api;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod oracle;
pub mod source;
pub mod stats;
pub mod store;

pub use api::Api;
pub use config::Config;
pub use engine::{Engine, EngineStatus};
pub use error::{HuntError, Result};
pub use keys::{derive, DerivedKey};
pub use ledger::{DedupLedger, Reservation};
pub use oracle::{BalanceOracle, BalanceOutcome};
pub use source::PassphraseStream;
pub use stats::StatsSnapshot;
pub use store::{AttemptRecord, DiscoveryResult};
