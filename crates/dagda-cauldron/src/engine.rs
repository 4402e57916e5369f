//! Game engine: session lifecycle, nudges and running statistics

use serde::{Deserialize, Serialize};

use crate::config::{BetMultiplier, CauldronConfig, NudgeConfig};
use crate::nudge::{NudgeInfo, NudgeOutcome, nudge_reward};
use crate::paytable::{GameResult, Outcome, Position};
use crate::symbols::{Symbol, SymbolManager};
use crate::{ConfigError, EngineError};

/// Running statistics across plays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStats {
    pub total_plays: u64,
    pub total_wins: u64,
    pub total_pie_won: u64,
    pub total_pie_bet: u64,
    pub largest_win: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl GameStats {
    /// Win rate in percent
    pub fn win_rate(&self) -> f64 {
        if self.total_plays > 0 {
            (self.total_wins as f64 / self.total_plays as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Return on investment in percent
    pub fn roi(&self) -> f64 {
        if self.total_pie_bet > 0 {
            ((self.total_pie_won as f64 - self.total_pie_bet as f64)
                / self.total_pie_bet as f64)
                * 100.0
        } else {
            0.0
        }
    }

    fn record(&mut self, bet: u64, result: &GameResult) {
        self.total_plays += 1;
        self.total_pie_bet += bet;

        if result.is_win {
            self.total_wins += 1;
            self.total_pie_won += result.amount;
            self.current_streak += 1;
            self.largest_win = self.largest_win.max(result.amount);
            self.longest_streak = self.longest_streak.max(self.current_streak);
        } else {
            self.current_streak = 0;
        }
    }
}

/// Final accounting of a completed session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettlement {
    pub bet_multiplier: BetMultiplier,
    pub bet_amount: u64,
    pub initial_result: GameResult,
    pub final_result: GameResult,
    pub nudges_used: u32,
    pub nudge_costs: u64,
    pub additional_winnings: u64,
}

impl SessionSettlement {
    /// Everything paid out to the player
    pub fn total_winnings(&self) -> u64 {
        self.initial_result.amount + self.additional_winnings
    }

    /// Everything the player staked, nudges included
    pub fn total_spent(&self) -> u64 {
        self.bet_amount + self.nudge_costs
    }

    /// `initial - bet - nudge costs + additional winnings`
    pub fn net(&self) -> i64 {
        self.total_winnings() as i64 - self.total_spent() as i64
    }
}

/// One in-flight play
#[derive(Debug, Clone)]
struct GameSession {
    bet_multiplier: BetMultiplier,
    current_result: GameResult,
    initial_result: GameResult,
    nudges_remaining: u32,
    nudge_cost: u64,
    nudges_used: u32,
    nudge_costs: u64,
    additional_winnings: u64,
}

/// Dagda's Cauldron game engine
///
/// One instance serves one player: it holds the current session and the
/// player's running stats, and nothing in it is synchronized.
#[derive(Clone)]
pub struct GameEngine {
    symbols: SymbolManager,
    nudges: NudgeConfig,
    base_bet: u64,
    bet_multiplier: BetMultiplier,
    session: Option<GameSession>,
    stats: GameStats,
}

impl GameEngine {
    /// Create with the shipped catalog and rates
    pub fn new() -> Self {
        match Self::with_config(CauldronConfig::default()) {
            Ok(engine) => engine,
            Err(e) => unreachable!("shipped cauldron config is invalid: {e}"),
        }
    }

    /// Create with specific config
    pub fn with_config(config: CauldronConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let symbols = SymbolManager::new(config.symbols, config.probabilities)?;
        Ok(Self {
            symbols,
            nudges: config.nudges,
            base_bet: config.base_bet,
            bet_multiplier: BetMultiplier::default(),
            session: None,
            stats: GameStats::default(),
        })
    }

    /// Seed RNG for reproducible results
    pub fn seed(&mut self, seed: u64) {
        self.symbols.seed(seed);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SESSION LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start a new play, discarding any session in progress
    pub fn start_game(&mut self, multiplier: BetMultiplier) -> GameResult {
        let outcome = self.symbols.generate_outcome();
        self.begin(multiplier, outcome)
    }

    /// Start a new play on given reels
    ///
    /// Every reel must show a symbol from the configured catalog.
    pub fn start_game_with(
        &mut self,
        multiplier: BetMultiplier,
        outcome: Outcome,
    ) -> Result<GameResult, EngineError> {
        for symbol in outcome.symbols() {
            self.check_in_catalog(symbol)?;
        }
        Ok(self.begin(multiplier, outcome))
    }

    fn check_in_catalog(&self, symbol: Symbol) -> Result<(), EngineError> {
        if self.symbols.catalog().contains(symbol) {
            Ok(())
        } else {
            Err(EngineError::SymbolNotInCatalog(symbol))
        }
    }

    fn begin(&mut self, multiplier: BetMultiplier, outcome: Outcome) -> GameResult {
        if self.session.is_some() {
            log::debug!("Discarding unfinished session");
        }

        self.bet_multiplier = multiplier;
        let result = self.evaluate(outcome, multiplier);
        self.session = Some(GameSession {
            bet_multiplier: multiplier,
            current_result: result,
            initial_result: result,
            nudges_remaining: self.nudges.budget,
            nudge_cost: self.nudges.cost,
            nudges_used: 0,
            nudge_costs: 0,
            additional_winnings: 0,
        });

        let bet = self.bet_amount();
        self.stats.record(bet, &result);

        log::debug!(
            "Cauldron stirred at {multiplier}: {} → {} ({} PIE)",
            result.symbols,
            result.win_type,
            result.amount
        );
        result
    }

    /// Nudge one reel to a random different symbol
    pub fn apply_nudge(&mut self, position: Position) -> NudgeOutcome {
        let Some(current) = self.nudgeable_symbols() else {
            return NudgeOutcome::rejected(self.symbols());
        };
        let nudged = self.symbols.apply_nudge(&current, position);
        self.settle_nudge(position, nudged)
    }

    /// Nudge one reel onto a chosen symbol
    pub fn apply_nudge_to(
        &mut self,
        position: Position,
        symbol: Symbol,
    ) -> Result<NudgeOutcome, EngineError> {
        self.check_in_catalog(symbol)?;
        let Some(current) = self.nudgeable_symbols() else {
            return Ok(NudgeOutcome::rejected(self.symbols()));
        };
        if current.symbol_at(position) == symbol {
            return Err(EngineError::NudgeUnchanged { position, symbol });
        }
        Ok(self.settle_nudge(position, current.with_symbol(position, symbol)))
    }

    fn nudgeable_symbols(&self) -> Option<Outcome> {
        match &self.session {
            Some(session) if session.nudges_remaining > 0 => Some(session.current_result.symbols),
            Some(_) => {
                log::debug!("Nudge refused: budget spent");
                None
            }
            None => {
                log::debug!("Nudge refused: no active session");
                None
            }
        }
    }

    fn settle_nudge(&mut self, position: Position, nudged: Outcome) -> NudgeOutcome {
        let result = self.evaluate(nudged, self.bet_multiplier);
        let Some(session) = self.session.as_mut() else {
            return NudgeOutcome::rejected(None);
        };

        let previous = session.current_result;
        let additional_winnings = nudge_reward(&previous, &result);

        session.current_result = result;
        session.nudges_remaining -= 1;
        session.nudges_used += 1;
        session.nudge_costs += session.nudge_cost;
        session.additional_winnings += additional_winnings;

        log::debug!(
            "Nudged {position}: {} → {} ({}), +{additional_winnings} PIE, {} left",
            previous.symbols,
            result.symbols,
            result.win_type,
            session.nudges_remaining
        );

        NudgeOutcome {
            success: true,
            symbols: Some(result.symbols),
            cost: session.nudge_cost,
            additional_winnings,
        }
    }

    /// Close the session and report its settlement
    pub fn complete_game(&mut self) -> Option<SessionSettlement> {
        let session = self.session.take()?;
        Some(SessionSettlement {
            bet_multiplier: session.bet_multiplier,
            bet_amount: self.base_bet * u64::from(session.bet_multiplier.factor()),
            initial_result: session.initial_result,
            final_result: session.current_result,
            nudges_used: session.nudges_used,
            nudge_costs: session.nudge_costs,
            additional_winnings: session.additional_winnings,
        })
    }

    fn evaluate(&self, outcome: Outcome, multiplier: BetMultiplier) -> GameResult {
        GameResult::new(outcome, self.symbols.compute_payout(&outcome, multiplier))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.session.as_ref().map(|s| &s.current_result)
    }

    /// Result before any nudges
    pub fn initial_result(&self) -> Option<&GameResult> {
        self.session.as_ref().map(|s| &s.initial_result)
    }

    pub fn symbols(&self) -> Option<Outcome> {
        self.result().map(|r| r.symbols)
    }

    pub fn bet_multiplier(&self) -> BetMultiplier {
        self.bet_multiplier
    }

    /// Points staked at the current multiplier
    pub fn bet_amount(&self) -> u64 {
        self.base_bet * u64::from(self.bet_multiplier.factor())
    }

    pub fn nudge_info(&self) -> NudgeInfo {
        NudgeInfo {
            remaining: self.session.as_ref().map_or(0, |s| s.nudges_remaining),
            cost: self.nudges.cost,
        }
    }

    pub fn can_nudge(&self) -> bool {
        self.nudge_info().remaining > 0
    }

    /// Current payout minus the bet, ignoring nudges
    pub fn net_winnings(&self) -> i64 {
        match self.result() {
            Some(result) => result.amount as i64 - self.bet_amount() as i64,
            None => 0,
        }
    }

    pub fn stats(&self) -> &GameStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = GameStats::default();
    }

    pub fn win_rate(&self) -> f64 {
        self.stats.win_rate()
    }

    pub fn roi(&self) -> f64 {
        self.stats.roi()
    }

    pub fn symbol_value(&self, symbol: Symbol) -> u32 {
        self.symbols.symbol_value(symbol)
    }

    pub fn all_symbols(&self) -> &[Symbol] {
        self.symbols.all_symbols()
    }

    pub fn symbol_manager(&self) -> &SymbolManager {
        &self.symbols
    }
}

impl Default for GameEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paytable::WinType;
    use crate::symbols::Symbol::*;

    fn started(symbols: [Symbol; 3], multiplier: BetMultiplier) -> GameEngine {
        let mut engine = GameEngine::new();
        engine.seed(4242);
        engine
            .start_game_with(multiplier, Outcome::new(symbols))
            .unwrap();
        engine
    }

    #[test]
    fn test_engine_creation() {
        let engine = GameEngine::new();
        assert!(!engine.is_active());
        assert_eq!(engine.stats().total_plays, 0);
        assert_eq!(engine.nudge_info(), NudgeInfo { remaining: 0, cost: 1 });
        assert_eq!(engine.net_winnings(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = CauldronConfig::default();
        for spec in &mut config.symbols {
            spec.weight = 0;
        }
        assert!(GameEngine::with_config(config).is_err());
    }

    #[test]
    fn test_start_game_snapshots_initial_result() {
        let mut engine = GameEngine::new();
        engine.seed(1);
        let result = engine.start_game(BetMultiplier::X2);

        assert_eq!(engine.result(), Some(&result));
        assert_eq!(engine.initial_result(), Some(&result));
        assert_eq!(engine.bet_amount(), 10);
        assert_eq!(engine.nudge_info().remaining, 3);
        assert_eq!(engine.stats().total_plays, 1);
        assert_eq!(engine.stats().total_pie_bet, 10);
    }

    #[test]
    fn test_nudge_without_improvement() {
        let mut engine = started([Harp, Harp, Club], BetMultiplier::X1);
        assert_eq!(engine.result().unwrap().amount, 10);

        let nudge = engine.apply_nudge_to(Position::Right, Cauldron).unwrap();
        assert!(nudge.success);
        assert_eq!(nudge.symbols, Some(Outcome::new([Harp, Harp, Cauldron])));
        assert_eq!(nudge.cost, 1);
        assert_eq!(nudge.additional_winnings, 0);
    }

    #[test]
    fn test_nudge_with_tier_improvement() {
        let mut engine = started([Harp, Harp, Club], BetMultiplier::X1);

        let nudge = engine.apply_nudge_to(Position::Right, Harp).unwrap();
        assert_eq!(nudge.additional_winnings, 25);
        assert_eq!(engine.result().unwrap().win_type, WinType::Jackpot);
        assert_eq!(engine.initial_result().unwrap().amount, 10);
    }

    #[test]
    fn test_repeated_same_win_never_paid_twice() {
        let mut engine = started([Harp, Harp, Club], BetMultiplier::X1);
        for third in [Cauldron, Wolfhound, Shamrock] {
            let nudge = engine.apply_nudge_to(Position::Right, third).unwrap();
            assert!(nudge.success);
            assert_eq!(nudge.additional_winnings, 0);
        }
    }

    #[test]
    fn test_symbol_change_pays_new_amount_exactly() {
        let mut engine = started([Shamrock, Shamrock, Club], BetMultiplier::X5);
        // shamrock pair → club pair
        let nudge = engine.apply_nudge_to(Position::Left, Club).unwrap();
        assert_eq!(nudge.additional_winnings, 3 * 2 * 5);
        assert_eq!(engine.result().unwrap().amount, 30);
    }

    #[test]
    fn test_nudge_exhaustion() {
        let mut engine = started([Harp, Club, Cauldron], BetMultiplier::X1);
        for _ in 0..3 {
            assert!(engine.apply_nudge(Position::Middle).success);
        }
        assert!(!engine.can_nudge());

        let before = engine.symbols();
        let nudge = engine.apply_nudge(Position::Left);
        assert!(!nudge.success);
        assert_eq!(nudge.cost, 0);
        assert_eq!(nudge.additional_winnings, 0);
        assert_eq!(nudge.symbols, before);
        assert_eq!(engine.symbols(), before);
    }

    #[test]
    fn test_nudge_without_session() {
        let mut engine = GameEngine::new();
        let nudge = engine.apply_nudge(Position::Left);
        assert_eq!(nudge, NudgeOutcome::rejected(None));
    }

    #[test]
    fn test_forced_nudge_must_change_slot() {
        let mut engine = started([Harp, Club, Cauldron], BetMultiplier::X1);
        assert_eq!(
            engine.apply_nudge_to(Position::Middle, Club),
            Err(EngineError::NudgeUnchanged {
                position: Position::Middle,
                symbol: Club
            })
        );
        assert_eq!(engine.nudge_info().remaining, 3);
    }

    #[test]
    fn test_random_nudges_change_target_and_never_go_negative() {
        let mut engine = GameEngine::new();
        engine.seed(77);
        for _ in 0..2_000 {
            engine.start_game(BetMultiplier::X1);
            for position in Position::ALL {
                let before = engine.symbols().unwrap();
                let nudge = engine.apply_nudge(position);
                let after = nudge.symbols.unwrap();
                assert_ne!(after.symbol_at(position), before.symbol_at(position));
                if !after.is_win() {
                    assert_eq!(nudge.additional_winnings, 0);
                }
            }
        }
    }

    #[test]
    fn test_settlement() {
        let mut engine = started([Harp, Harp, Club], BetMultiplier::X1);
        engine.apply_nudge_to(Position::Right, Cauldron).unwrap();
        engine.apply_nudge_to(Position::Right, Harp).unwrap();

        let settlement = engine.complete_game().unwrap();
        assert_eq!(settlement.bet_amount, 5);
        assert_eq!(settlement.nudges_used, 2);
        assert_eq!(settlement.nudge_costs, 2);
        assert_eq!(settlement.additional_winnings, 25);
        assert_eq!(settlement.net(), 10 - 5 - 2 + 25);
        assert_eq!(settlement.final_result.win_type, WinType::Jackpot);

        assert!(!engine.is_active());
        assert!(engine.complete_game().is_none());
    }

    #[test]
    fn test_net_winnings() {
        let engine = started([Cauldron, Cauldron, Cauldron], BetMultiplier::X2);
        assert_eq!(engine.net_winnings(), 40 - 10);

        let engine = started([Harp, Club, Cauldron], BetMultiplier::X5);
        assert_eq!(engine.net_winnings(), -25);
    }

    #[test]
    fn test_stats_and_streaks() {
        let mut engine = GameEngine::new();
        engine
            .start_game_with(BetMultiplier::X1, Outcome::new([Harp, Harp, Club]))
            .unwrap();
        engine
            .start_game_with(BetMultiplier::X1, Outcome::new([Club, Club, Club]))
            .unwrap();
        engine
            .start_game_with(BetMultiplier::X1, Outcome::new([Harp, Club, Shamrock]))
            .unwrap();
        engine
            .start_game_with(BetMultiplier::X1, Outcome::new([Shamrock, Shamrock, Club]))
            .unwrap();

        let stats = engine.stats();
        assert_eq!(stats.total_plays, 4);
        assert_eq!(stats.total_wins, 3);
        assert_eq!(stats.total_pie_won, 10 + 15 + 2);
        assert_eq!(stats.total_pie_bet, 20);
        assert_eq!(stats.largest_win, 15);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 2);
        assert!((engine.win_rate() - 75.0).abs() < 1e-9);
        assert!((engine.roi() - 35.0).abs() < 1e-9);

        engine.reset_stats();
        assert_eq!(engine.stats(), &GameStats::default());
    }

    #[test]
    fn test_stats_ignore_nudges() {
        let mut engine = started([Harp, Club, Cauldron], BetMultiplier::X1);
        engine.apply_nudge_to(Position::Middle, Harp).unwrap();
        assert_eq!(engine.stats().total_plays, 1);
        assert_eq!(engine.stats().total_wins, 0);
    }

    #[test]
    fn test_new_game_discards_session() {
        let mut engine = started([Harp, Club, Cauldron], BetMultiplier::X5);
        engine.apply_nudge(Position::Left);
        engine
            .start_game_with(BetMultiplier::X1, Outcome::new([Club, Club, Harp]))
            .unwrap();
        assert_eq!(engine.nudge_info().remaining, 3);
        assert_eq!(engine.bet_amount(), 5);
        assert_eq!(engine.initial_result().unwrap().amount, 6);
    }

    fn three_symbol_engine() -> GameEngine {
        let mut config = CauldronConfig::default();
        config
            .symbols
            .retain(|spec| matches!(spec.symbol, Harp | Club | Cauldron));
        GameEngine::with_config(config).unwrap()
    }

    #[test]
    fn test_forced_outcome_outside_catalog_rejected() {
        let mut engine = three_symbol_engine();
        assert_eq!(
            engine.start_game_with(BetMultiplier::X1, Outcome::new([Shamrock, Shamrock, Harp])),
            Err(EngineError::SymbolNotInCatalog(Shamrock))
        );
        assert!(!engine.is_active());
        assert_eq!(engine.stats(), &GameStats::default());
    }

    #[test]
    fn test_forced_nudge_outside_catalog_rejected() {
        let mut engine = three_symbol_engine();
        engine
            .start_game_with(BetMultiplier::X1, Outcome::new([Harp, Harp, Club]))
            .unwrap();
        assert_eq!(
            engine.apply_nudge_to(Position::Right, Shamrock),
            Err(EngineError::SymbolNotInCatalog(Shamrock))
        );
        assert_eq!(engine.nudge_info().remaining, 3);
        assert_eq!(engine.symbols(), Some(Outcome::new([Harp, Harp, Club])));
        assert_eq!(engine.stats().total_wins, 1);
    }
}
