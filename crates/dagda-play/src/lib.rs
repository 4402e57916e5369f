//! dagda-play: Dagda's Cauldron table
//!
//! Wires one [`GameEngine`](dagda_cauldron::GameEngine) per player to the
//! ledger: daily limits gate a play, the bet is debited and payouts
//! credited, nudges are charged and rewarded, and each finished session is
//! written to history.

mod config;
mod simulate;
mod table;

pub use config::*;
pub use simulate::*;
pub use table::*;

use dagda_cauldron::{ConfigError, EngineError};
use dagda_ledger::LedgerError;
use thiserror::Error;

/// Table error
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Daily limit reached! Resets in: {resets_in}")]
    DailyLimitReached { resets_in: String },

    #[error("Insufficient PIE balance: have {balance}, need {needed}")]
    InsufficientFunds { balance: u64, needed: u64 },

    #[error("No active game for {0}")]
    NoActiveSession(String),

    #[error("Config file error: {0}")]
    ConfigFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, TableError>;
