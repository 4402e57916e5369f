//! Quick games of the hub: coinflip, emerald flip and the randomizer
//!
//! Like the cauldron these are pure computation. The caller checks funds,
//! consumes the daily play and applies [`FlipResult::delta`] or the prize
//! amount to the balance.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::BetMultiplier;
use crate::{ConfigError, EngineError};

/// Side of a coin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinFace {
    Heads,
    Tails,
}

impl CoinFace {
    pub const ALL: [CoinFace; 2] = [CoinFace::Heads, CoinFace::Tails];

    pub fn name(self) -> &'static str {
        match self {
            CoinFace::Heads => "heads",
            CoinFace::Tails => "tails",
        }
    }
}

impl std::fmt::Display for CoinFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CoinFace {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heads" | "h" => Ok(CoinFace::Heads),
            "tails" | "t" => Ok(CoinFace::Tails),
            other => Err(ConfigError::InvalidValue(format!("unknown coin face '{other}'"))),
        }
    }
}

/// One slot of the randomizer wheel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomizerPrize {
    pub label: String,
    /// Signed balance change
    pub amount: i64,
}

impl RandomizerPrize {
    pub fn new(label: impl Into<String>, amount: i64) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}

/// Stakes and prize table of the quick games
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickGameConfig {
    /// Won or lost on a coinflip
    pub coinflip_stake: u64,
    /// Emerald flip stake at 1x
    pub emerald_base_bet: u64,
    /// Randomizer outcomes, each equally likely
    pub randomizer_prizes: Vec<RandomizerPrize>,
}

impl Default for QuickGameConfig {
    fn default() -> Self {
        Self {
            coinflip_stake: 5,
            emerald_base_bet: 5,
            randomizer_prizes: vec![
                RandomizerPrize::new("jackpot", 10),
                RandomizerPrize::new("win", 5),
                RandomizerPrize::new("break even", 0),
                RandomizerPrize::new("loss", -5),
                RandomizerPrize::new("big loss", -10),
            ],
        }
    }
}

impl QuickGameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coinflip_stake == 0 {
            return Err(ConfigError::InvalidValue("coinflip stake must be positive".into()));
        }
        if self.emerald_base_bet == 0 {
            return Err(ConfigError::InvalidValue("emerald flip bet must be positive".into()));
        }
        if self.randomizer_prizes.is_empty() {
            return Err(ConfigError::InvalidValue("randomizer needs at least one prize".into()));
        }
        Ok(())
    }

    /// Balance a randomizer spin needs: the worst loss on the wheel
    pub fn randomizer_entry(&self) -> u64 {
        self.randomizer_prizes
            .iter()
            .map(|p| p.amount.min(0).unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    /// Emerald flip stake at a multiplier
    pub fn emerald_stake(&self, multiplier: BetMultiplier) -> u64 {
        self.emerald_base_bet * u64::from(multiplier.factor())
    }
}

/// A called coin and where it landed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipResult {
    pub call: CoinFace,
    pub landed: CoinFace,
    pub stake: u64,
}

impl FlipResult {
    pub fn won(&self) -> bool {
        self.call == self.landed
    }

    /// `+stake` on a win, `-stake` otherwise
    pub fn delta(&self) -> i64 {
        if self.won() {
            self.stake as i64
        } else {
            -(self.stake as i64)
        }
    }
}

/// Quick games for one player
///
/// Holds the RNG and the emerald flip awaiting double-or-nothing.
#[derive(Clone)]
pub struct QuickGames {
    config: QuickGameConfig,
    rng: StdRng,
    double_pending: Option<FlipResult>,
}

impl QuickGames {
    pub fn new(config: QuickGameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            rng: StdRng::from_os_rng(),
            double_pending: None,
        })
    }

    /// Seed RNG for reproducible results
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn config(&self) -> &QuickGameConfig {
        &self.config
    }

    /// Fair toss
    pub fn toss(&mut self) -> CoinFace {
        if self.rng.random_bool(0.5) {
            CoinFace::Heads
        } else {
            CoinFace::Tails
        }
    }

    // ============ Coinflip ============

    pub fn coinflip(&mut self, call: CoinFace) -> FlipResult {
        let landed = self.toss();
        self.coinflip_landing(call, landed)
    }

    pub fn coinflip_landing(&mut self, call: CoinFace, landed: CoinFace) -> FlipResult {
        FlipResult {
            call,
            landed,
            stake: self.config.coinflip_stake,
        }
    }

    // ============ Emerald flip ============

    /// Flip at a multiplier; a win opens a double-or-nothing
    pub fn emerald_flip(&mut self, call: CoinFace, multiplier: BetMultiplier) -> FlipResult {
        let landed = self.toss();
        self.emerald_flip_landing(call, multiplier, landed)
    }

    pub fn emerald_flip_landing(
        &mut self,
        call: CoinFace,
        multiplier: BetMultiplier,
        landed: CoinFace,
    ) -> FlipResult {
        let result = FlipResult {
            call,
            landed,
            stake: self.config.emerald_stake(multiplier),
        };
        self.double_pending = result.won().then_some(result);
        log::debug!("Emerald flip: called {call}, landed {landed}");
        result
    }

    /// The winning flip a double-or-nothing would replay
    pub fn pending_double(&self) -> Option<&FlipResult> {
        self.double_pending.as_ref()
    }

    /// Same call and stake once more; offered once per winning flip
    pub fn double_or_nothing(&mut self) -> Result<FlipResult, EngineError> {
        if self.double_pending.is_none() {
            return Err(EngineError::NoDoubleOrNothing);
        }
        let landed = self.toss();
        self.double_or_nothing_landing(landed)
    }

    pub fn double_or_nothing_landing(&mut self, landed: CoinFace) -> Result<FlipResult, EngineError> {
        let pending = self.double_pending.take().ok_or(EngineError::NoDoubleOrNothing)?;
        Ok(FlipResult { landed, ..pending })
    }

    // ============ Randomizer ============

    /// Uniform pick from the prize table
    pub fn randomize(&mut self) -> RandomizerPrize {
        let index = self.rng.random_range(0..self.config.randomizer_prizes.len());
        self.config.randomizer_prizes[index].clone()
    }

    pub fn randomize_pick(&mut self, index: usize) -> Result<RandomizerPrize, EngineError> {
        self.config
            .randomizer_prizes
            .get(index)
            .cloned()
            .ok_or(EngineError::NoSuchPrize(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn games() -> QuickGames {
        let mut games = QuickGames::new(QuickGameConfig::default()).unwrap();
        games.seed(99);
        games
    }

    #[test]
    fn test_coinflip_pays_even_money() {
        let mut games = games();
        let win = games.coinflip_landing(CoinFace::Heads, CoinFace::Heads);
        assert!(win.won());
        assert_eq!(win.delta(), 5);

        let loss = games.coinflip_landing(CoinFace::Heads, CoinFace::Tails);
        assert!(!loss.won());
        assert_eq!(loss.delta(), -5);
    }

    #[test]
    fn test_toss_is_roughly_fair() {
        let mut games = games();
        let heads = (0..10_000)
            .filter(|_| games.toss() == CoinFace::Heads)
            .count();
        assert!((4_500..5_500).contains(&heads), "heads: {heads}");
    }

    #[test]
    fn test_emerald_win_opens_one_double() {
        let mut games = games();
        let win = games.emerald_flip_landing(CoinFace::Tails, BetMultiplier::X2, CoinFace::Tails);
        assert_eq!(win.stake, 10);
        assert_eq!(games.pending_double(), Some(&win));

        let double = games.double_or_nothing_landing(CoinFace::Heads).unwrap();
        assert_eq!(double.call, CoinFace::Tails);
        assert_eq!(double.stake, 10);
        assert_eq!(double.delta(), -10);

        assert_eq!(games.double_or_nothing(), Err(EngineError::NoDoubleOrNothing));
    }

    #[test]
    fn test_emerald_loss_offers_no_double() {
        let mut games = games();
        games.emerald_flip_landing(CoinFace::Heads, BetMultiplier::X5, CoinFace::Heads);
        let loss = games.emerald_flip_landing(CoinFace::Heads, BetMultiplier::X5, CoinFace::Tails);
        assert_eq!(loss.delta(), -25);
        assert!(games.pending_double().is_none());
        assert_eq!(
            games.double_or_nothing_landing(CoinFace::Heads),
            Err(EngineError::NoDoubleOrNothing)
        );
    }

    #[test]
    fn test_randomizer_draws_every_prize() {
        let mut games = games();
        let prizes = games.config().randomizer_prizes.clone();
        let mut seen = vec![0u32; prizes.len()];
        for _ in 0..5_000 {
            let prize = games.randomize();
            let index = prizes.iter().position(|p| *p == prize).unwrap();
            seen[index] += 1;
        }
        assert!(seen.iter().all(|&n| n > 800), "{seen:?}");

        assert_eq!(games.randomize_pick(0).unwrap().amount, 10);
        assert_eq!(games.randomize_pick(9), Err(EngineError::NoSuchPrize(9)));
    }

    #[test]
    fn test_randomizer_entry_covers_worst_loss() {
        let mut config = QuickGameConfig::default();
        assert_eq!(config.randomizer_entry(), 10);

        config.randomizer_prizes = vec![RandomizerPrize::new("win", 3)];
        assert_eq!(config.randomizer_entry(), 0);

        config.randomizer_prizes.clear();
        assert!(QuickGames::new(config).is_err());
    }

    #[test]
    fn test_coin_face_parsing() {
        assert_eq!("Heads".parse::<CoinFace>().unwrap(), CoinFace::Heads);
        assert_eq!("t".parse::<CoinFace>().unwrap(), CoinFace::Tails);
        assert!("edge".parse::<CoinFace>().is_err());
    }
}
