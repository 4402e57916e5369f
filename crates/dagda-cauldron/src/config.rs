//! Cauldron configuration

use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::symbols::{Symbol, SymbolCatalog, SymbolSpec};

/// Bet multiplier applied to the base bet and to payouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BetMultiplier {
    #[default]
    X1,
    X2,
    X5,
}

impl BetMultiplier {
    pub const ALL: [BetMultiplier; 3] = [BetMultiplier::X1, BetMultiplier::X2, BetMultiplier::X5];

    /// Numeric factor
    pub fn factor(self) -> u32 {
        match self {
            BetMultiplier::X1 => 1,
            BetMultiplier::X2 => 2,
            BetMultiplier::X5 => 5,
        }
    }
}

impl TryFrom<u32> for BetMultiplier {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(BetMultiplier::X1),
            2 => Ok(BetMultiplier::X2),
            5 => Ok(BetMultiplier::X5),
            other => Err(ConfigError::InvalidBetMultiplier(other)),
        }
    }
}

impl From<BetMultiplier> for u32 {
    fn from(multiplier: BetMultiplier) -> Self {
        multiplier.factor()
    }
}

impl std::fmt::Display for BetMultiplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x", self.factor())
    }
}

/// Target win rates used by outcome generation
///
/// `jackpot` is an absolute rate; the share of wins that are jackpots is
/// `jackpot / any_win`. Every other win is a two-match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WinProbabilities {
    /// Probability that a play wins anything
    pub any_win: f64,
    /// Probability that a play is a jackpot
    pub jackpot: f64,
}

impl Default for WinProbabilities {
    fn default() -> Self {
        Self {
            any_win: 0.25,
            jackpot: 0.01,
        }
    }
}

impl WinProbabilities {
    /// Share of wins that are jackpots
    pub fn jackpot_share(&self) -> f64 {
        if self.any_win > 0.0 {
            self.jackpot / self.any_win
        } else {
            0.0
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_unit = |p: f64| p.is_finite() && (0.0..=1.0).contains(&p);
        if !in_unit(self.any_win) || !in_unit(self.jackpot) {
            return Err(ConfigError::InvalidProbabilities(format!(
                "any_win={} jackpot={} must lie in [0, 1]",
                self.any_win, self.jackpot
            )));
        }
        if self.jackpot > self.any_win {
            return Err(ConfigError::InvalidProbabilities(format!(
                "jackpot={} exceeds any_win={}",
                self.jackpot, self.any_win
            )));
        }
        Ok(())
    }
}

/// Nudge budget and price per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    /// Nudges available after each start
    pub budget: u32,
    /// Points charged per nudge, constant for every use
    pub cost: u64,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self { budget: 3, cost: 1 }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CauldronConfig {
    /// Symbol catalog in draw order
    pub symbols: Vec<SymbolSpec>,
    /// Win-rate shaping
    pub probabilities: WinProbabilities,
    /// Nudge budget and cost
    pub nudges: NudgeConfig,
    /// Points staked at 1x
    pub base_bet: u64,
}

impl Default for CauldronConfig {
    fn default() -> Self {
        Self {
            symbols: default_catalog(),
            probabilities: WinProbabilities::default(),
            nudges: NudgeConfig::default(),
            base_bet: 5,
        }
    }
}

impl CauldronConfig {
    /// Check every invariant the engine relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        SymbolCatalog::new(self.symbols.clone())?;
        self.probabilities.validate()?;
        if self.nudges.budget == 0 {
            return Err(ConfigError::InvalidValue("nudge budget must be positive".into()));
        }
        if self.base_bet == 0 {
            return Err(ConfigError::InvalidValue("base bet must be positive".into()));
        }
        Ok(())
    }

    /// Export as pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse and validate from JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CauldronConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// The shipped catalog: rare harp down to common shamrock
pub fn default_catalog() -> Vec<SymbolSpec> {
    vec![
        SymbolSpec::new(Symbol::Harp, 5, 10),
        SymbolSpec::new(Symbol::Club, 3, 15),
        SymbolSpec::new(Symbol::Cauldron, 4, 12),
        SymbolSpec::new(Symbol::Wolfhound, 2, 18),
        SymbolSpec::new(Symbol::Shamrock, 1, 20),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CauldronConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bet_multiplier_parsing() {
        assert_eq!(BetMultiplier::try_from(2), Ok(BetMultiplier::X2));
        assert_eq!(
            BetMultiplier::try_from(3),
            Err(ConfigError::InvalidBetMultiplier(3))
        );
        assert_eq!(BetMultiplier::X5.to_string(), "5x");
    }

    #[test]
    fn test_bet_multiplier_serde() {
        let json = serde_json::to_string(&BetMultiplier::X5).unwrap();
        assert_eq!(json, "5");
        assert!(serde_json::from_str::<BetMultiplier>("4").is_err());
    }

    #[test]
    fn test_probabilities_rejected() {
        let probs = WinProbabilities {
            any_win: 0.05,
            jackpot: 0.10,
        };
        assert!(matches!(
            probs.validate(),
            Err(ConfigError::InvalidProbabilities(_))
        ));

        let probs = WinProbabilities {
            any_win: 1.5,
            jackpot: 0.0,
        };
        assert!(probs.validate().is_err());
    }

    #[test]
    fn test_jackpot_share() {
        let probs = WinProbabilities::default();
        assert!((probs.jackpot_share() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_json_roundtrip_keeps_validation() {
        let config = CauldronConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(CauldronConfig::from_json(&json).unwrap(), config);

        let broken = json.replace("\"base_bet\": 5", "\"base_bet\": 0");
        assert!(CauldronConfig::from_json(&broken).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CauldronConfig::from_json(r#"{ "nudges": { "budget": 5 } }"#).unwrap();
        assert_eq!(config.nudges.budget, 5);
        assert_eq!(config.nudges.cost, 1);
        assert_eq!(config.symbols.len(), 5);
    }
}
