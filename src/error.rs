use thiserror::Error;

#[derive(Error, Debug)]
pub enum HuntError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid passphrase: {0}")]
    InvalidPassphrase(String),

    #[error("Balance unavailable for {0}")]
    BalanceUnavailable(String),

    #[error("Cracking is already running")]
    AlreadyRunning,

    #[error("Cannot clear data while cracking is running")]
    StillRunning,
}

pub type Result<T> = std::result::Result<T, HuntError>;
