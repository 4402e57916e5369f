//! dagda-ledger: balances, daily limits, identity and play history
//!
//! Every store sits on a [`KeyValueStore`] holding JSON documents, so the
//! same code runs against memory (tests, throwaway sessions) or a JSON file
//! on disk.

mod balance;
mod config;
mod history;
mod identity;
mod limits;
mod storage;

pub use balance::*;
pub use config::*;
pub use history::*;
pub use identity::*;
pub use limits::*;
pub use storage::*;

use thiserror::Error;

/// Ledger error
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Insufficient balance: {balance} PIE, change of {delta}")]
    InsufficientBalance { balance: u64, delta: i64 },

    #[error("Balance overflow for {0}")]
    BalanceOverflow(String),

    #[error("No wallet address or social profile to identify the player")]
    Unidentified,

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
