//! Symbol catalog, weighted draws and outcome generation

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::config::{BetMultiplier, WinProbabilities};
use crate::paytable::{self, Outcome, Payout, Position, WinType};

/// Draw attempts per reel before a losing outcome forces a distinct symbol
const MAX_LOSING_ATTEMPTS: u32 = 10;

/// A no-win triple needs three distinct symbols
const MIN_CATALOG_SIZE: usize = 3;

/// Cauldron symbols, from rare to common in the shipped catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbol {
    Harp,
    Club,
    Cauldron,
    Wolfhound,
    Shamrock,
}

impl Symbol {
    pub const ALL: [Symbol; 5] = [
        Symbol::Harp,
        Symbol::Club,
        Symbol::Cauldron,
        Symbol::Wolfhound,
        Symbol::Shamrock,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Symbol::Harp => "harp",
            Symbol::Club => "club",
            Symbol::Cauldron => "cauldron",
            Symbol::Wolfhound => "wolfhound",
            Symbol::Shamrock => "shamrock",
        }
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Symbol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::ALL
            .into_iter()
            .find(|symbol| symbol.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::InvalidValue(format!("unknown symbol '{s}'")))
    }
}

/// Catalog entry: payout value and draw weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub symbol: Symbol,
    /// Base points used in payout math
    pub value: u32,
    /// Relative draw likelihood
    pub weight: u32,
}

impl SymbolSpec {
    pub fn new(symbol: Symbol, value: u32, weight: u32) -> Self {
        Self {
            symbol,
            value,
            weight,
        }
    }
}

/// A validated, ordered symbol catalog
#[derive(Debug, Clone)]
pub struct SymbolCatalog {
    specs: Vec<SymbolSpec>,
    symbols: Vec<Symbol>,
    total_weight: u64,
}

impl SymbolCatalog {
    pub fn new(specs: Vec<SymbolSpec>) -> Result<Self, ConfigError> {
        if specs.len() < MIN_CATALOG_SIZE {
            return Err(ConfigError::TooFewSymbols {
                required: MIN_CATALOG_SIZE,
                found: specs.len(),
            });
        }

        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|s| s.symbol == spec.symbol) {
                return Err(ConfigError::DuplicateSymbol(spec.symbol));
            }
            if spec.value == 0 {
                return Err(ConfigError::InvalidSymbol {
                    symbol: spec.symbol,
                    field: "value",
                });
            }
            if spec.weight == 0 {
                return Err(ConfigError::InvalidSymbol {
                    symbol: spec.symbol,
                    field: "weight",
                });
            }
        }

        let total_weight: u64 = specs.iter().map(|s| u64::from(s.weight)).sum();
        if total_weight == 0 {
            return Err(ConfigError::ZeroTotalWeight);
        }

        let symbols = specs.iter().map(|s| s.symbol).collect();
        Ok(Self {
            specs,
            symbols,
            total_weight,
        })
    }

    pub fn get(&self, symbol: Symbol) -> Option<&SymbolSpec> {
        self.specs.iter().find(|s| s.symbol == symbol)
    }

    /// Symbols in catalog order
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn specs(&self) -> &[SymbolSpec] {
        &self.specs
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Share of draws expected for a symbol
    pub fn probability(&self, symbol: Symbol) -> f64 {
        self.get(symbol)
            .map(|s| f64::from(s.weight) / self.total_weight as f64)
            .unwrap_or(0.0)
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.symbols.contains(&symbol)
    }
}

/// Owns the catalog and the RNG; produces symbols and outcomes
///
/// Not shared between players: every `GameEngine` builds its own.
#[derive(Clone)]
pub struct SymbolManager {
    catalog: SymbolCatalog,
    probabilities: WinProbabilities,
    rng: StdRng,
}

impl SymbolManager {
    pub fn new(
        specs: Vec<SymbolSpec>,
        probabilities: WinProbabilities,
    ) -> Result<Self, ConfigError> {
        probabilities.validate()?;
        Ok(Self {
            catalog: SymbolCatalog::new(specs)?,
            probabilities,
            rng: StdRng::from_os_rng(),
        })
    }

    /// Seed RNG for reproducible results
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn catalog(&self) -> &SymbolCatalog {
        &self.catalog
    }

    pub fn probabilities(&self) -> &WinProbabilities {
        &self.probabilities
    }

    /// Base value of a symbol (0 if it is not in the catalog)
    pub fn symbol_value(&self, symbol: Symbol) -> u32 {
        self.catalog.get(symbol).map(|s| s.value).unwrap_or(0)
    }

    pub fn all_symbols(&self) -> &[Symbol] {
        self.catalog.symbols()
    }

    /// Weighted draw: `r` in `1..=total`, subtract weights in catalog
    /// order until `r` is no longer positive
    pub fn draw_symbol(&mut self) -> Symbol {
        let mut r = self.rng.random_range(1..=self.catalog.total_weight);
        for spec in self.catalog.specs() {
            let weight = u64::from(spec.weight);
            if r <= weight {
                return spec.symbol;
            }
            r -= weight;
        }
        // r never exceeds the total weight
        self.catalog.symbols()[self.catalog.symbols().len() - 1]
    }

    /// Three symbols shaped by the configured win rates
    pub fn generate_outcome(&mut self) -> Outcome {
        let should_win = self.rng.random_bool(self.probabilities.any_win);
        if !should_win {
            return self.generate_losing_outcome();
        }

        if self.rng.random_bool(self.probabilities.jackpot_share()) {
            self.generate_winning_outcome(WinType::Jackpot)
        } else {
            self.generate_winning_outcome(WinType::TwoMatch)
        }
    }

    /// Three pairwise distinct symbols
    pub fn generate_losing_outcome(&mut self) -> Outcome {
        let mut placed: Vec<Symbol> = Vec::with_capacity(3);

        for _ in 0..3 {
            let mut attempts = 0;
            let symbol = loop {
                let candidate = self.uniform_symbol();
                if !placed.contains(&candidate) {
                    break candidate;
                }
                attempts += 1;
                if attempts >= MAX_LOSING_ATTEMPTS {
                    break self.uniform_symbol_excluding(&placed);
                }
            };
            placed.push(symbol);
        }

        let outcome = Outcome::new([placed[0], placed[1], placed[2]]);
        debug_assert_eq!(outcome.win_type(), WinType::None);
        outcome
    }

    /// An outcome of the requested tier; `WinType::None` yields a losing one
    pub fn generate_winning_outcome(&mut self, win_type: WinType) -> Outcome {
        match win_type {
            WinType::None => self.generate_losing_outcome(),
            WinType::Jackpot => {
                let symbol = self.draw_symbol();
                Outcome::new([symbol; 3])
            }
            WinType::TwoMatch => {
                let matching = self.draw_symbol();
                let third = self.uniform_symbol_excluding(&[matching]);
                let odd = Position::ALL[self.rng.random_range(0..3)];
                let mut symbols = [matching; 3];
                symbols[odd.index()] = third;
                Outcome::new(symbols)
            }
        }
    }

    /// Win classification
    pub fn classify(&self, outcome: &Outcome) -> WinType {
        outcome.win_type()
    }

    /// Payout at a bet multiplier
    pub fn compute_payout(&self, outcome: &Outcome, multiplier: BetMultiplier) -> Payout {
        paytable::compute_payout(outcome, multiplier, |s| self.symbol_value(s))
    }

    /// Replace one reel with a different, uniformly chosen symbol
    pub fn apply_nudge(&mut self, outcome: &Outcome, position: Position) -> Outcome {
        let current = outcome.symbol_at(position);
        let replacement = self.uniform_symbol_excluding(&[current]);
        outcome.with_symbol(position, replacement)
    }

    fn uniform_symbol(&mut self) -> Symbol {
        let symbols = self.catalog.symbols();
        symbols[self.rng.random_range(0..symbols.len())]
    }

    fn uniform_symbol_excluding(&mut self, excluded: &[Symbol]) -> Symbol {
        let candidates: Vec<Symbol> = self
            .catalog
            .symbols()
            .iter()
            .copied()
            .filter(|s| !excluded.contains(s))
            .collect();
        // Callers exclude at most two symbols from a catalog of three or more
        candidates[self.rng.random_range(0..candidates.len())]
    }
}
