//! # dagda-cauldron: outcome and payout engine for Dagda's Cauldron
//!
//! Three reels, five Celtic symbols, a bet multiplier and up to three paid
//! nudges per play, plus the hub's quick coin and wheel games. Everything
//! here is pure computation: balances and daily limits are applied by the
//! caller (see `dagda-ledger`).
//!
//! ## Architecture
//!
//! ```text
//! GameEngine
//!     │
//!     ├── SymbolManager (catalog, weighted draw, outcome generation, nudges)
//!     ├── paytable      (classification, payout math)
//!     ├── nudge         (reward policy)
//!     └── GameStats     (plays, wins, streaks, ROI)
//!           │
//!           v
//!     GameResult / NudgeOutcome / SessionSettlement
//!
//! QuickGames (coinflip, emerald flip + double-or-nothing, randomizer)
//! ```

pub mod config;
pub mod engine;
pub mod nudge;
pub mod paytable;
pub mod quick;
pub mod symbols;

pub use config::*;
pub use engine::*;
pub use nudge::*;
pub use paytable::*;
pub use quick::*;
pub use symbols::*;

use thiserror::Error;

/// Fatal configuration problems, raised when a catalog or engine is built
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Symbol catalog has zero total weight")]
    ZeroTotalWeight,

    #[error("Symbol catalog needs at least {required} distinct symbols, found {found}")]
    TooFewSymbols { required: usize, found: usize },

    #[error("Symbol {0} appears more than once in the catalog")]
    DuplicateSymbol(Symbol),

    #[error("Symbol {symbol} has invalid {field}: must be positive")]
    InvalidSymbol { symbol: Symbol, field: &'static str },

    #[error("Invalid win probabilities: {0}")]
    InvalidProbabilities(String),

    #[error("Invalid bet multiplier {0}: allowed values are 1, 2 and 5")]
    InvalidBetMultiplier(u32),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Config parse error: {0}")]
    Parse(String),
}

/// Errors from engine operations the caller can get wrong
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Forced nudge must change the {position} reel, which already shows {symbol}")]
    NudgeUnchanged { position: Position, symbol: Symbol },

    #[error("Symbol {0} is not in the configured catalog")]
    SymbolNotInCatalog(Symbol),

    #[error("No winning flip to double")]
    NoDoubleOrNothing,

    #[error("Randomizer has no prize at index {0}")]
    NoSuchPrize(usize),
}
