//! Offline payout simulation

use std::collections::BTreeMap;

use dagda_cauldron::{BetMultiplier, CauldronConfig, GameEngine, GameStats, Symbol, WinType};
use serde::Serialize;

use crate::Result;

/// Aggregate figures of a simulated run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub spins: u64,
    pub bet_multiplier: BetMultiplier,
    pub stats: GameStats,
    pub two_matches: u64,
    pub jackpots: u64,
    /// Plays whose winning symbol was this one
    pub wins_by_symbol: BTreeMap<String, u64>,
}

impl SimulationReport {
    pub fn win_rate(&self) -> f64 {
        self.stats.win_rate()
    }

    pub fn roi(&self) -> f64 {
        self.stats.roi()
    }

    /// Return to player in percent
    pub fn rtp(&self) -> f64 {
        if self.stats.total_pie_bet > 0 {
            (self.stats.total_pie_won as f64 / self.stats.total_pie_bet as f64) * 100.0
        } else {
            0.0
        }
    }

    fn rate(&self, count: u64) -> f64 {
        if self.spins > 0 {
            (count as f64 / self.spins as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn two_match_rate(&self) -> f64 {
        self.rate(self.two_matches)
    }

    pub fn jackpot_rate(&self) -> f64 {
        self.rate(self.jackpots)
    }
}

/// Play `spins` un-nudged games on a fresh engine
pub fn simulate(
    config: CauldronConfig,
    spins: u64,
    multiplier: BetMultiplier,
    seed: Option<u64>,
) -> Result<SimulationReport> {
    let mut engine = GameEngine::with_config(config)?;
    if let Some(seed) = seed {
        engine.seed(seed);
    }

    let mut two_matches = 0;
    let mut jackpots = 0;
    let mut wins_by_symbol: BTreeMap<String, u64> = BTreeMap::new();

    for _ in 0..spins {
        let result = engine.start_game(multiplier);
        match result.win_type {
            WinType::TwoMatch => two_matches += 1,
            WinType::Jackpot => jackpots += 1,
            WinType::None => {}
        }
        if let Some(symbol) = result.winning_symbol() {
            *wins_by_symbol.entry(symbol.name().to_string()).or_default() += 1;
        }
    }
    engine.complete_game();

    log::info!("Simulated {spins} plays at {multiplier}");
    Ok(SimulationReport {
        spins,
        bet_multiplier: multiplier,
        stats: engine.stats().clone(),
        two_matches,
        jackpots,
        wins_by_symbol,
    })
}

/// Probability of each symbol in a weighted draw
pub fn draw_probabilities(config: &CauldronConfig) -> Vec<(Symbol, f64)> {
    let total: u64 = config.symbols.iter().map(|s| u64::from(s.weight)).sum();
    config
        .symbols
        .iter()
        .map(|s| {
            let p = if total > 0 {
                f64::from(s.weight) / total as f64
            } else {
                0.0
            };
            (s.symbol, p)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_tracks_target_rates() {
        let report = simulate(CauldronConfig::default(), 40_000, BetMultiplier::X1, Some(11)).unwrap();

        assert_eq!(report.stats.total_plays, 40_000);
        assert_eq!(report.stats.total_wins, report.two_matches + report.jackpots);
        assert!((report.win_rate() - 25.0).abs() < 1.5, "win rate {}", report.win_rate());
        assert!((report.jackpot_rate() - 1.0).abs() < 0.3, "jackpot rate {}", report.jackpot_rate());
        assert_eq!(report.wins_by_symbol.values().sum::<u64>(), report.stats.total_wins);
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let a = simulate(CauldronConfig::default(), 500, BetMultiplier::X2, Some(5)).unwrap();
        let b = simulate(CauldronConfig::default(), 500, BetMultiplier::X2, Some(5)).unwrap();
        assert_eq!(a.stats, b.stats);
        assert_eq!(a.stats.total_pie_bet, 500 * 10);
    }

    #[test]
    fn test_rtp_and_roi_agree() {
        let report = simulate(CauldronConfig::default(), 2_000, BetMultiplier::X5, Some(3)).unwrap();
        assert!((report.rtp() - 100.0 - report.roi()).abs() < 1e-9);
    }

    #[test]
    fn test_draw_probabilities() {
        let probs = draw_probabilities(&CauldronConfig::default());
        assert_eq!(probs.len(), 5);
        assert!((probs.iter().map(|(_, p)| p).sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(probs[0], (Symbol::Harp, 10.0 / 75.0));
    }
}
