//! Win classification and payout math

use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::config::BetMultiplier;
use crate::symbols::Symbol;

/// Symbol value multiplier for three of a kind
pub const JACKPOT_MULTIPLIER: u64 = 5;
/// Symbol value multiplier for two of a kind
pub const TWO_MATCH_MULTIPLIER: u64 = 2;

/// Reel position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Middle,
    Right,
}

impl Position {
    pub const ALL: [Position; 3] = [Position::Left, Position::Middle, Position::Right];

    pub fn index(self) -> usize {
        match self {
            Position::Left => 0,
            Position::Middle => 1,
            Position::Right => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Position::Left => "left",
            Position::Middle => "middle",
            Position::Right => "right",
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Position {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Position::Left),
            "middle" | "m" | "centre" | "center" => Ok(Position::Middle),
            "right" | "r" => Ok(Position::Right),
            other => Err(ConfigError::InvalidValue(format!("unknown position '{other}'"))),
        }
    }
}

/// Win tier of a three-symbol outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WinType {
    None,
    TwoMatch,
    Jackpot,
}

impl WinType {
    pub fn is_win(self) -> bool {
        self != WinType::None
    }

    /// Symbol value multiplier for this tier
    pub fn multiplier(self) -> u64 {
        match self {
            WinType::None => 0,
            WinType::TwoMatch => TWO_MATCH_MULTIPLIER,
            WinType::Jackpot => JACKPOT_MULTIPLIER,
        }
    }
}

impl std::fmt::Display for WinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WinType::None => "none",
            WinType::TwoMatch => "two-match",
            WinType::Jackpot => "jackpot",
        })
    }
}

/// Left, middle and right symbols of one play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcome([Symbol; 3]);

impl Outcome {
    pub fn new(symbols: [Symbol; 3]) -> Self {
        Self(symbols)
    }

    pub fn symbols(&self) -> [Symbol; 3] {
        self.0
    }

    pub fn symbol_at(&self, position: Position) -> Symbol {
        self.0[position.index()]
    }

    /// Copy with one reel replaced
    pub fn with_symbol(&self, position: Position, symbol: Symbol) -> Self {
        let mut symbols = self.0;
        symbols[position.index()] = symbol;
        Self(symbols)
    }

    pub fn win_type(&self) -> WinType {
        classify(self)
    }

    pub fn is_win(&self) -> bool {
        self.win_type().is_win()
    }

    /// The repeated symbol of a two-match or jackpot
    pub fn winning_symbol(&self) -> Option<Symbol> {
        let [a, b, c] = self.0;
        if a == b || a == c {
            Some(a)
        } else if b == c {
            Some(b)
        } else {
            None
        }
    }
}

impl From<[Symbol; 3]> for Outcome {
    fn from(symbols: [Symbol; 3]) -> Self {
        Self(symbols)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "[{a}, {b}, {c}]")
    }
}

/// Classify a triple: exactly one tier always applies
pub fn classify(outcome: &Outcome) -> WinType {
    let [a, b, c] = outcome.0;
    if a == b && b == c {
        WinType::Jackpot
    } else if a == b || b == c || a == c {
        WinType::TwoMatch
    } else {
        WinType::None
    }
}

/// Payout for an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub amount: u64,
    pub win_type: WinType,
}

/// `value × 5 × m` for a jackpot, `value × 2 × m` for a two-match, else 0
pub fn compute_payout(
    outcome: &Outcome,
    multiplier: BetMultiplier,
    symbol_value: impl Fn(Symbol) -> u32,
) -> Payout {
    let win_type = classify(outcome);
    let amount = outcome
        .winning_symbol()
        .map(|symbol| {
            u64::from(symbol_value(symbol))
                * win_type.multiplier()
                * u64::from(multiplier.factor())
        })
        .unwrap_or(0);

    Payout { amount, win_type }
}

/// Result of the current reels at the session's bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub symbols: Outcome,
    pub amount: u64,
    pub win_type: WinType,
    pub is_win: bool,
}

impl GameResult {
    pub fn new(symbols: Outcome, payout: Payout) -> Self {
        Self {
            symbols,
            amount: payout.amount,
            win_type: payout.win_type,
            is_win: payout.win_type.is_win(),
        }
    }

    pub fn winning_symbol(&self) -> Option<Symbol> {
        self.symbols.winning_symbol()
    }
}
