//! Cauldron table: engine sessions settled against the ledger
//!
//! Every paid step works on a copy of the player's engine and swaps it in
//! only after the balance write succeeded. The daily play is spent before
//! that write, so a failed write loses the play but never starts a session
//! without its debit.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use dagda_cauldron::{
    BetMultiplier, CoinFace, FlipResult, GameEngine, GameResult, NudgeOutcome, Outcome, Position,
    QuickGames, RandomizerPrize, SessionSettlement, Symbol,
};
use dagda_ledger::{
    BalanceStore, Clock, GameHistory, GameHistoryEntry, GameId, KeyValueStore, LimitCheck,
    LimitStore, Player, PlayRecord, PlayerIdentity, SystemClock, UserStats,
};
use serde::Serialize;

use crate::{AppConfig, Result, TableError};

/// A resolved player and where they stand
#[derive(Debug, Clone, Serialize)]
pub struct Seat {
    pub player: Player,
    pub balance: u64,
    /// Set when this visit paid the one-time bonus
    pub bonus_granted: Option<u64>,
    pub limits: LimitCheck,
}

/// Outcome of a paid play
#[derive(Debug, Clone, Serialize)]
pub struct PlayReport {
    pub result: GameResult,
    pub bet_amount: u64,
    pub balance: u64,
    pub remaining_plays: u32,
    pub nudges_remaining: u32,
}

/// Outcome of a paid nudge
#[derive(Debug, Clone, Serialize)]
pub struct NudgeReport {
    pub nudge: NudgeOutcome,
    pub result: Option<GameResult>,
    pub balance: u64,
    pub nudges_remaining: u32,
}

/// Closed session as written to history
#[derive(Debug, Clone, Serialize)]
pub struct CollectReport {
    pub settlement: SessionSettlement,
    pub entry: GameHistoryEntry,
    pub balance: u64,
}

/// Play, nudges and collection in one go
#[derive(Debug)]
pub struct RoundReport {
    pub play: PlayReport,
    pub nudges: Vec<NudgeReport>,
    /// Why nudging stopped early; the session was still collected
    pub nudge_error: Option<TableError>,
    pub collected: CollectReport,
}

/// Settled coinflip, emerald flip or double-or-nothing
#[derive(Debug, Clone, Serialize)]
pub struct FlipReport {
    pub flip: FlipResult,
    pub entry: GameHistoryEntry,
    pub balance: u64,
    pub remaining_plays: u32,
    pub can_double: bool,
}

/// Settled randomizer spin
#[derive(Debug, Clone, Serialize)]
pub struct RandomizerReport {
    pub prize: RandomizerPrize,
    pub entry: GameHistoryEntry,
    pub balance: u64,
    pub remaining_plays: u32,
}

/// Per-player engines over shared ledger stores
pub struct CauldronTable {
    config: AppConfig,
    balances: BalanceStore,
    limits: LimitStore,
    history: GameHistory,
    engines: HashMap<String, GameEngine>,
    quick: HashMap<String, QuickGames>,
    seed: Option<u64>,
}

impl CauldronTable {
    pub fn new(config: AppConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            balances: BalanceStore::new(store.clone(), &config.ledger),
            limits: LimitStore::with_clock(store.clone(), &config.ledger, clock.clone()),
            history: GameHistory::with_clock(store, clock),
            engines: HashMap::new(),
            quick: HashMap::new(),
            seed: None,
            config,
        })
    }

    /// Seed every engine, current and future
    pub fn seed(&mut self, seed: u64) {
        self.seed = Some(seed);
        for engine in self.engines.values_mut() {
            engine.seed(seed);
        }
        for games in self.quick.values_mut() {
            games.seed(seed);
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn balances(&self) -> &BalanceStore {
        &self.balances
    }

    pub fn limits(&self) -> &LimitStore {
        &self.limits
    }

    pub fn history(&self) -> &GameHistory {
        &self.history
    }

    pub fn engine(&self, player: &Player) -> Option<&GameEngine> {
        self.engines.get(&player.user_id)
    }

    pub fn quick_games(&self, player: &Player) -> Option<&QuickGames> {
        self.quick.get(&player.user_id)
    }

    fn engine_mut(&mut self, player: &Player) -> Result<&mut GameEngine> {
        match self.engines.entry(player.user_id.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let mut engine = GameEngine::with_config(self.config.cauldron.clone())?;
                if let Some(seed) = self.seed {
                    engine.seed(seed);
                }
                Ok(entry.insert(engine))
            }
        }
    }

    fn active_engine(&mut self, player: &Player) -> Result<&mut GameEngine> {
        match self.engines.get_mut(&player.user_id) {
            Some(engine) if engine.is_active() => Ok(engine),
            _ => Err(TableError::NoActiveSession(player.user_id.clone())),
        }
    }

    fn quick_mut(&mut self, player: &Player) -> Result<&mut QuickGames> {
        match self.quick.entry(player.user_id.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let mut games = QuickGames::new(self.config.quick.clone())?;
                if let Some(seed) = self.seed {
                    games.seed(seed);
                }
                Ok(entry.insert(games))
            }
        }
    }

    /// Check funds, then spend one of today's plays of `game`
    fn spend_play(&self, player: &Player, game: GameId, needed: u64) -> Result<u32> {
        let balance = self.balances.get_balance(&player.user_id, &player.username)?;
        if balance < needed {
            return Err(TableError::InsufficientFunds { balance, needed });
        }

        let limit = self.limits.check_and_update_limit(
            &player.user_id,
            &player.username,
            game,
            player.bonus_tier,
        )?;
        if !limit.can_play {
            return Err(TableError::DailyLimitReached {
                resets_in: limit.resets_in,
            });
        }
        Ok(limit.remaining_plays)
    }

    fn apply_delta(&self, player: &Player, delta: i64) -> Result<u64> {
        Ok(self
            .balances
            .update_balance(&player.user_id, &player.username, delta)?)
    }

    // ============ Session ============

    /// Resolve the player, create their balance and pay any bonus due
    pub fn sit_down(&mut self, identity: &PlayerIdentity) -> Result<Seat> {
        let player = identity.resolve()?;
        let mut balance = self.balances.get_balance(&player.user_id, &player.username)?;
        let bonus_granted = self.balances.apply_bonus_grant(&player)?;
        if let Some(updated) = bonus_granted {
            balance = updated;
        }
        let limits = self
            .limits
            .check_limit(&player.user_id, GameId::DagdasCauldron, player.bonus_tier)?;

        log::info!(
            "{} ({}) sat down with {balance} PIE, {} plays left",
            player.username,
            player.user_id,
            limits.remaining_plays
        );
        Ok(Seat {
            player,
            balance,
            bonus_granted,
            limits,
        })
    }

    /// Pay the bet and stir the cauldron
    pub fn play(&mut self, player: &Player, multiplier: BetMultiplier) -> Result<PlayReport> {
        self.play_inner(player, multiplier, None)
    }

    /// Pay the bet and play the given reels
    pub fn play_forced(
        &mut self,
        player: &Player,
        multiplier: BetMultiplier,
        outcome: Outcome,
    ) -> Result<PlayReport> {
        self.play_inner(player, multiplier, Some(outcome))
    }

    fn play_inner(
        &mut self,
        player: &Player,
        multiplier: BetMultiplier,
        forced: Option<Outcome>,
    ) -> Result<PlayReport> {
        let bet = self.config.cauldron.base_bet * u64::from(multiplier.factor());
        if self.engine(player).is_some_and(GameEngine::is_active) {
            self.collect(player)?;
        }

        let mut engine = self.engine_mut(player)?.clone();
        let result = match forced {
            Some(outcome) => engine.start_game_with(multiplier, outcome)?,
            None => engine.start_game(multiplier),
        };
        let nudges_remaining = engine.nudge_info().remaining;

        let remaining_plays = self.spend_play(player, GameId::DagdasCauldron, bet)?;
        let balance = self.apply_delta(player, result.amount as i64 - bet as i64)?;
        self.engines.insert(player.user_id.clone(), engine);

        log::info!(
            "{} stirred {} at {multiplier}: {} PIE, balance {balance}",
            player.username,
            result.symbols,
            result.amount
        );
        Ok(PlayReport {
            result,
            bet_amount: bet,
            balance,
            remaining_plays,
            nudges_remaining,
        })
    }

    /// Pay for a nudge on one reel
    pub fn nudge(&mut self, player: &Player, position: Position) -> Result<NudgeReport> {
        self.nudge_inner(player, position, None)
    }

    /// Pay for a nudge landing on a chosen symbol
    pub fn nudge_to(
        &mut self,
        player: &Player,
        position: Position,
        symbol: Symbol,
    ) -> Result<NudgeReport> {
        self.nudge_inner(player, position, Some(symbol))
    }

    fn nudge_inner(
        &mut self,
        player: &Player,
        position: Position,
        symbol: Option<Symbol>,
    ) -> Result<NudgeReport> {
        let balance = self.balances.get_balance(&player.user_id, &player.username)?;
        let mut engine = self.active_engine(player)?.clone();

        let info = engine.nudge_info();
        if info.remaining > 0 && balance < info.cost {
            return Err(TableError::InsufficientFunds {
                balance,
                needed: info.cost,
            });
        }

        let nudge = match symbol {
            Some(symbol) => engine.apply_nudge_to(position, symbol)?,
            None => engine.apply_nudge(position),
        };
        let result = engine.result().copied();
        let nudges_remaining = engine.nudge_info().remaining;

        let balance = if nudge.success {
            let balance =
                self.apply_delta(player, nudge.additional_winnings as i64 - nudge.cost as i64)?;
            self.engines.insert(player.user_id.clone(), engine);
            balance
        } else {
            balance
        };

        Ok(NudgeReport {
            nudge,
            result,
            balance,
            nudges_remaining,
        })
    }

    /// Close the session and write it to history
    pub fn collect(&mut self, player: &Player) -> Result<CollectReport> {
        let settlement = self
            .active_engine(player)?
            .complete_game()
            .ok_or_else(|| TableError::NoActiveSession(player.user_id.clone()))?;

        let record = PlayRecord::new(
            player,
            GameId::DagdasCauldron,
            settlement.bet_amount,
            settlement.total_winnings(),
        )
        .with_symbols(settlement.final_result.symbols)
        .with_net_change(settlement.net());
        let entry = self.history.record(record)?;
        let balance = self.balances.get_balance(&player.user_id, &player.username)?;

        log::info!(
            "{} collected: net {:+} PIE over {} nudges",
            player.username,
            settlement.net(),
            settlement.nudges_used
        );
        Ok(CollectReport {
            settlement,
            entry,
            balance,
        })
    }

    /// Play, nudge the given reels in order, then collect
    ///
    /// Nudging stops at the first refused or failed nudge; whatever
    /// happened, a started session is collected before returning.
    pub fn play_round(
        &mut self,
        player: &Player,
        multiplier: BetMultiplier,
        nudges: &[Position],
    ) -> Result<RoundReport> {
        let play = self.play(player, multiplier)?;
        self.finish_round(player, play, nudges)
    }

    /// [`play_round`](Self::play_round) on given reels
    pub fn play_round_forced(
        &mut self,
        player: &Player,
        multiplier: BetMultiplier,
        outcome: Outcome,
        nudges: &[Position],
    ) -> Result<RoundReport> {
        let play = self.play_forced(player, multiplier, outcome)?;
        self.finish_round(player, play, nudges)
    }

    fn finish_round(
        &mut self,
        player: &Player,
        play: PlayReport,
        positions: &[Position],
    ) -> Result<RoundReport> {
        let mut nudges = Vec::new();
        let mut nudge_error = None;
        for &position in positions {
            match self.nudge(player, position) {
                Ok(report) => {
                    let refused = !report.nudge.success;
                    nudges.push(report);
                    if refused {
                        break;
                    }
                }
                Err(e) => {
                    log::warn!("{} stopped nudging: {e}", player.username);
                    nudge_error = Some(e);
                    break;
                }
            }
        }

        let collected = self.collect(player)?;
        Ok(RoundReport {
            play,
            nudges,
            nudge_error,
            collected,
        })
    }

    // ============ Quick games ============

    /// Call heads or tails for the coinflip stake
    pub fn coinflip(&mut self, player: &Player, call: CoinFace) -> Result<FlipReport> {
        self.coinflip_inner(player, call, None)
    }

    pub fn coinflip_landing(
        &mut self,
        player: &Player,
        call: CoinFace,
        landed: CoinFace,
    ) -> Result<FlipReport> {
        self.coinflip_inner(player, call, Some(landed))
    }

    fn coinflip_inner(
        &mut self,
        player: &Player,
        call: CoinFace,
        landed: Option<CoinFace>,
    ) -> Result<FlipReport> {
        let mut games = self.quick_mut(player)?.clone();
        let flip = match landed {
            Some(landed) => games.coinflip_landing(call, landed),
            None => games.coinflip(call),
        };
        let remaining_plays = self.spend_play(player, GameId::Coinflip, flip.stake)?;
        let label = flip.landed.name();
        self.settle_flip(player, GameId::Coinflip, games, flip, remaining_plays, label)
    }

    /// Emerald flip at a multiplier; a win can be doubled once
    pub fn emerald_flip(
        &mut self,
        player: &Player,
        call: CoinFace,
        multiplier: BetMultiplier,
    ) -> Result<FlipReport> {
        self.emerald_inner(player, call, multiplier, None)
    }

    pub fn emerald_flip_landing(
        &mut self,
        player: &Player,
        call: CoinFace,
        multiplier: BetMultiplier,
        landed: CoinFace,
    ) -> Result<FlipReport> {
        self.emerald_inner(player, call, multiplier, Some(landed))
    }

    fn emerald_inner(
        &mut self,
        player: &Player,
        call: CoinFace,
        multiplier: BetMultiplier,
        landed: Option<CoinFace>,
    ) -> Result<FlipReport> {
        let mut games = self.quick_mut(player)?.clone();
        let flip = match landed {
            Some(landed) => games.emerald_flip_landing(call, multiplier, landed),
            None => games.emerald_flip(call, multiplier),
        };
        let remaining_plays = self.spend_play(player, GameId::EmeraldFlip, flip.stake)?;
        let label = flip.landed.name();
        self.settle_flip(player, GameId::EmeraldFlip, games, flip, remaining_plays, label)
    }

    /// Replay the last winning emerald flip for its stake; spends no daily play
    pub fn double_or_nothing(&mut self, player: &Player) -> Result<FlipReport> {
        self.double_inner(player, None)
    }

    pub fn double_or_nothing_landing(
        &mut self,
        player: &Player,
        landed: CoinFace,
    ) -> Result<FlipReport> {
        self.double_inner(player, Some(landed))
    }

    fn double_inner(&mut self, player: &Player, landed: Option<CoinFace>) -> Result<FlipReport> {
        let mut games = self.quick_mut(player)?.clone();
        let flip = match landed {
            Some(landed) => games.double_or_nothing_landing(landed)?,
            None => games.double_or_nothing()?,
        };

        let balance = self.balances.get_balance(&player.user_id, &player.username)?;
        if balance < flip.stake {
            return Err(TableError::InsufficientFunds {
                balance,
                needed: flip.stake,
            });
        }
        let remaining_plays = self
            .limits
            .check_limit(&player.user_id, GameId::EmeraldFlip, player.bonus_tier)?
            .remaining_plays;
        let label = format!("double-or-nothing {}", flip.landed);
        self.settle_flip(player, GameId::EmeraldFlip, games, flip, remaining_plays, &label)
    }

    fn settle_flip(
        &mut self,
        player: &Player,
        game: GameId,
        games: QuickGames,
        flip: FlipResult,
        remaining_plays: u32,
        label: &str,
    ) -> Result<FlipReport> {
        let balance = self.apply_delta(player, flip.delta())?;
        let can_double = games.pending_double().is_some();
        self.quick.insert(player.user_id.clone(), games);

        let winnings = if flip.won() { flip.stake * 2 } else { 0 };
        let record = PlayRecord::new(player, game, flip.stake, winnings).with_result(label);
        let entry = self.history.record(record)?;

        log::info!(
            "{} {game}: called {}, landed {}, {:+} PIE, balance {balance}",
            player.username,
            flip.call,
            flip.landed,
            flip.delta()
        );
        Ok(FlipReport {
            flip,
            entry,
            balance,
            remaining_plays,
            can_double,
        })
    }

    /// Spin the randomizer wheel
    pub fn randomizer(&mut self, player: &Player) -> Result<RandomizerReport> {
        self.randomizer_inner(player, None)
    }

    /// Spin landing on a given slot of the prize table
    pub fn randomizer_pick(&mut self, player: &Player, index: usize) -> Result<RandomizerReport> {
        self.randomizer_inner(player, Some(index))
    }

    fn randomizer_inner(
        &mut self,
        player: &Player,
        index: Option<usize>,
    ) -> Result<RandomizerReport> {
        let mut games = self.quick_mut(player)?.clone();
        let prize = match index {
            Some(index) => games.randomize_pick(index)?,
            None => games.randomize(),
        };
        let entry_fee = self.config.quick.randomizer_entry();
        let remaining_plays = self.spend_play(player, GameId::Randomizer, entry_fee)?;

        let balance = self.apply_delta(player, prize.amount)?;
        self.quick.insert(player.user_id.clone(), games);

        let lost = prize.amount.min(0).unsigned_abs();
        let won = prize.amount.max(0).unsigned_abs();
        let record = PlayRecord::new(player, GameId::Randomizer, lost, won)
            .with_result(prize.label.clone());
        let entry = self.history.record(record)?;

        log::info!(
            "{} spun the randomizer: {} ({:+} PIE), balance {balance}",
            player.username,
            prize.label,
            prize.amount
        );
        Ok(RandomizerReport {
            prize,
            entry,
            balance,
            remaining_plays,
        })
    }

    // ============ Queries ============

    pub fn balance(&self, player: &Player) -> Result<u64> {
        Ok(self.balances.get_balance(&player.user_id, &player.username)?)
    }

    pub fn remaining_plays(&self, player: &Player) -> Result<LimitCheck> {
        self.remaining_plays_of(player, GameId::DagdasCauldron)
    }

    pub fn remaining_plays_of(&self, player: &Player, game: GameId) -> Result<LimitCheck> {
        Ok(self
            .limits
            .check_limit(&player.user_id, game, player.bonus_tier)?)
    }

    pub fn player_stats(&self, player: &Player) -> Result<Option<UserStats>> {
        Ok(self.history.user_stats(&player.user_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use dagda_cauldron::Symbol::*;
    use dagda_ledger::{LedgerError, MemoryStore};

    /// Memory store whose balance writes can be switched to fail
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_balances: AtomicBool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> dagda_ledger::Result<Option<String>> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> dagda_ledger::Result<()> {
            if key.starts_with("balance/") && self.fail_balances.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.put(key, value)
        }

        fn remove(&self, key: &str) -> dagda_ledger::Result<()> {
            self.inner.remove(key)
        }

        fn scan(&self, prefix: &str) -> dagda_ledger::Result<Vec<(String, String)>> {
            self.inner.scan(prefix)
        }

        fn remove_prefix(&self, prefix: &str) -> dagda_ledger::Result<usize> {
            self.inner.remove_prefix(prefix)
        }
    }

    fn flaky_table() -> (Arc<FlakyStore>, CauldronTable, Player) {
        let store = Arc::new(FlakyStore::default());
        let mut table = CauldronTable::new(AppConfig::default(), store.clone()).unwrap();
        let player = wallet_player(&mut table);
        (store, table, player)
    }

    fn table() -> CauldronTable {
        CauldronTable::new(AppConfig::default(), Arc::new(MemoryStore::new())).unwrap()
    }

    fn wallet_player(table: &mut CauldronTable) -> Player {
        table
            .sit_down(&PlayerIdentity::wallet("0xC0FFEE"))
            .unwrap()
            .player
    }

    #[test]
    fn test_nudge_requires_session() {
        let mut table = table();
        let player = wallet_player(&mut table);
        assert!(matches!(
            table.nudge(&player, Position::Left),
            Err(TableError::NoActiveSession(_))
        ));
        assert!(matches!(
            table.collect(&player),
            Err(TableError::NoActiveSession(_))
        ));
    }

    #[test]
    fn test_new_play_collects_previous_session() {
        let mut table = table();
        let player = wallet_player(&mut table);
        table
            .play_forced(&player, BetMultiplier::X1, Outcome::new([Harp, Harp, Club]))
            .unwrap();
        table
            .play_forced(&player, BetMultiplier::X1, Outcome::new([Harp, Club, Cauldron]))
            .unwrap();

        let history = table.history().user_history(&player.user_id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].winnings, 10);
    }

    #[test]
    fn test_spent_nudges_are_free_noops() {
        let mut table = table();
        let player = wallet_player(&mut table);
        table
            .play_forced(&player, BetMultiplier::X1, Outcome::new([Harp, Club, Cauldron]))
            .unwrap();
        for _ in 0..3 {
            assert!(table.nudge(&player, Position::Left).unwrap().nudge.success);
        }
        let before = table.balance(&player).unwrap();
        let report = table.nudge(&player, Position::Left).unwrap();
        assert!(!report.nudge.success);
        assert_eq!(report.balance, before);
    }

    #[test]
    fn test_failed_debit_starts_no_session() {
        let (store, mut table, player) = flaky_table();
        store.fail_balances.store(true, Ordering::SeqCst);

        assert!(matches!(
            table.play_forced(&player, BetMultiplier::X1, Outcome::new([Harp, Harp, Club])),
            Err(TableError::Ledger(LedgerError::Io(_)))
        ));
        assert!(!table.engine(&player).is_some_and(GameEngine::is_active));
        assert!(matches!(
            table.nudge(&player, Position::Left),
            Err(TableError::NoActiveSession(_))
        ));
        assert_eq!(table.balance(&player).unwrap(), 50);
    }

    #[test]
    fn test_failed_nudge_charge_keeps_reels() {
        let (store, mut table, player) = flaky_table();
        table
            .play_forced(&player, BetMultiplier::X1, Outcome::new([Harp, Harp, Club]))
            .unwrap();
        store.fail_balances.store(true, Ordering::SeqCst);

        assert!(table.nudge_to(&player, Position::Right, Harp).is_err());
        let engine = table.engine(&player).unwrap();
        assert_eq!(engine.symbols(), Some(Outcome::new([Harp, Harp, Club])));
        assert_eq!(engine.nudge_info().remaining, 3);

        store.fail_balances.store(false, Ordering::SeqCst);
        let collected = table.collect(&player).unwrap();
        assert_eq!(collected.settlement.nudges_used, 0);
        assert_eq!(collected.balance, 55);
    }

    #[test]
    fn test_failed_flip_credit_keeps_double_pending() {
        let (store, mut table, player) = flaky_table();
        table
            .emerald_flip_landing(&player, CoinFace::Heads, BetMultiplier::X1, CoinFace::Heads)
            .unwrap();
        store.fail_balances.store(true, Ordering::SeqCst);

        assert!(table.double_or_nothing_landing(&player, CoinFace::Heads).is_err());
        assert!(table.quick_games(&player).unwrap().pending_double().is_some());
        assert_eq!(table.history().user_history(&player.user_id, 10).unwrap().len(), 1);
    }
}
