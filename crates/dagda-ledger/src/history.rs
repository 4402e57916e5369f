//! Play history, per-player statistics and leaderboards
//!
//! Entries are stored one per key under `history/`, keyed by millisecond
//! timestamp so a prefix scan returns them oldest first. Statistics are
//! rebuilt from that scan on demand.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use dagda_cauldron::Outcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Player;
use crate::limits::{Clock, SystemClock};
use crate::storage::{KeyValueStore, save_json, scan_json};
use crate::Result;

const PREFIX: &str = "history/";

/// Games of the Dagda Play hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameId {
    DagdasCauldron,
    EmeraldFlip,
    Coinflip,
    Randomizer,
}

impl GameId {
    pub const ALL: [GameId; 4] = [
        GameId::DagdasCauldron,
        GameId::EmeraldFlip,
        GameId::Coinflip,
        GameId::Randomizer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GameId::DagdasCauldron => "dagdas-cauldron",
            GameId::EmeraldFlip => "emerald-flip",
            GameId::Coinflip => "coinflip",
            GameId::Randomizer => "randomizer",
        }
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GameId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        GameId::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| format!("unknown game '{s}'"))
    }
}

// ============ Entries ============

/// A finished play, before it is stamped and stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRecord {
    pub user_id: String,
    pub username: String,
    pub game: GameId,
    pub bet_amount: u64,
    pub symbols: Option<Outcome>,
    pub result: Option<String>,
    pub winnings: u64,
    pub net_change: i64,
    pub is_win: bool,
}

impl PlayRecord {
    /// Net change defaults to `winnings - bet`; any winnings count as a win
    pub fn new(player: &Player, game: GameId, bet_amount: u64, winnings: u64) -> Self {
        Self {
            user_id: player.user_id.clone(),
            username: player.username.clone(),
            game,
            bet_amount,
            symbols: None,
            result: None,
            winnings,
            net_change: winnings as i64 - bet_amount as i64,
            is_win: winnings > 0,
        }
    }

    pub fn with_symbols(mut self, symbols: Outcome) -> Self {
        self.symbols = Some(symbols);
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_net_change(mut self, net_change: i64) -> Self {
        self.net_change = net_change;
        self
    }
}

/// Stored history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameHistoryEntry {
    pub id: Uuid,
    pub user_id: String,
    pub username: String,
    pub game: GameId,
    /// Unix milliseconds
    pub timestamp: i64,
    pub bet_amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Outcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub winnings: u64,
    pub net_change: i64,
    pub is_win: bool,
}

impl GameHistoryEntry {
    fn key(&self) -> String {
        format!("{PREFIX}{:013}-{}", self.timestamp, self.id)
    }

    pub fn played_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

// ============ Statistics ============

/// Totals for one game
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameTypeStats {
    pub games: u64,
    pub wins: u64,
    pub pie_won: u64,
    pub pie_bet: u64,
}

impl GameTypeStats {
    pub fn win_rate(&self) -> f64 {
        if self.games > 0 {
            (self.wins as f64 / self.games as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Lifetime statistics of one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub username: String,
    pub total_games: u64,
    pub total_wins: u64,
    pub total_pie_won: u64,
    pub total_pie_bet: u64,
    pub largest_win: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_played: i64,
    pub game_stats: BTreeMap<GameId, GameTypeStats>,
}

impl UserStats {
    fn new(user_id: &str, username: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
            total_games: 0,
            total_wins: 0,
            total_pie_won: 0,
            total_pie_bet: 0,
            largest_win: 0,
            current_streak: 0,
            longest_streak: 0,
            last_played: 0,
            game_stats: BTreeMap::new(),
        }
    }

    fn apply(&mut self, entry: &GameHistoryEntry) {
        self.total_games += 1;
        self.total_pie_bet += entry.bet_amount;
        self.last_played = entry.timestamp;

        if entry.is_win {
            self.total_wins += 1;
            self.total_pie_won += entry.winnings;
            self.current_streak += 1;
            self.largest_win = self.largest_win.max(entry.winnings);
            self.longest_streak = self.longest_streak.max(self.current_streak);
        } else {
            self.current_streak = 0;
        }

        let game = self.game_stats.entry(entry.game).or_default();
        game.games += 1;
        game.pie_bet += entry.bet_amount;
        if entry.is_win {
            game.wins += 1;
            game.pie_won += entry.winnings;
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.total_games > 0 {
            (self.total_wins as f64 / self.total_games as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Leaderboard row for a single game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameLeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub games: u64,
    pub wins: u64,
    pub pie_won: u64,
    pub pie_bet: u64,
    pub win_rate: f64,
}

/// Activity on one UTC day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_games: u64,
    pub total_players: u64,
    pub total_pie_bet: u64,
    pub total_pie_won: u64,
    /// `None` when nothing was played
    pub most_played_game: Option<GameId>,
}

/// Activity across all history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalStats {
    pub total_games: u64,
    pub total_players: u64,
    pub total_pie_bet: u64,
    pub total_pie_won: u64,
    pub average_win_rate: f64,
}

// ============ History ============

/// Play history over a key-value backend
pub struct GameHistory {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl GameHistory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Stamp and store a play
    pub fn record(&self, play: PlayRecord) -> Result<GameHistoryEntry> {
        let entry = GameHistoryEntry {
            id: Uuid::new_v4(),
            user_id: play.user_id,
            username: play.username,
            game: play.game,
            timestamp: self.clock.now().timestamp_millis(),
            bet_amount: play.bet_amount,
            symbols: play.symbols,
            result: play.result,
            winnings: play.winnings,
            net_change: play.net_change,
            is_win: play.is_win,
        };
        save_json(self.store.as_ref(), &entry.key(), &entry)?;
        log::debug!(
            "Recorded {} for {}: bet {}, won {}, net {:+}",
            entry.game,
            entry.user_id,
            entry.bet_amount,
            entry.winnings,
            entry.net_change
        );
        Ok(entry)
    }

    /// Everything, oldest first
    fn entries(&self) -> Result<Vec<GameHistoryEntry>> {
        let mut entries: Vec<GameHistoryEntry> = scan_json(self.store.as_ref(), PREFIX)?;
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    fn newest_first<F>(&self, limit: usize, filter: F) -> Result<Vec<GameHistoryEntry>>
    where
        F: Fn(&GameHistoryEntry) -> bool,
    {
        Ok(self
            .entries()?
            .into_iter()
            .rev()
            .filter(|e| filter(e))
            .take(limit)
            .collect())
    }

    /// A player's plays, newest first
    pub fn user_history(&self, user_id: &str, limit: usize) -> Result<Vec<GameHistoryEntry>> {
        self.newest_first(limit, |e| e.user_id == user_id)
    }

    /// All plays, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<GameHistoryEntry>> {
        self.newest_first(limit, |_| true)
    }

    fn all_stats(&self) -> Result<BTreeMap<String, UserStats>> {
        let mut stats: BTreeMap<String, UserStats> = BTreeMap::new();
        for entry in self.entries()? {
            stats
                .entry(entry.user_id.clone())
                .or_insert_with(|| UserStats::new(&entry.user_id, &entry.username))
                .apply(&entry);
        }
        Ok(stats)
    }

    /// Folds only this player's entries
    pub fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        let mut stats: Option<UserStats> = None;
        for entry in self.entries()?.iter().filter(|e| e.user_id == user_id) {
            stats
                .get_or_insert_with(|| UserStats::new(&entry.user_id, &entry.username))
                .apply(entry);
        }
        Ok(stats)
    }

    /// Players by total PIE won
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<UserStats>> {
        let mut players: Vec<UserStats> = self.all_stats()?.into_values().collect();
        players.sort_by(|a, b| b.total_pie_won.cmp(&a.total_pie_won));
        players.truncate(limit);
        Ok(players)
    }

    /// Players of one game by PIE won in it
    pub fn game_leaderboard(&self, game: GameId, limit: usize) -> Result<Vec<GameLeaderboardEntry>> {
        let mut rows: Vec<GameLeaderboardEntry> = self
            .all_stats()?
            .into_values()
            .filter_map(|user| {
                let stats = user.game_stats.get(&game).copied()?;
                Some(GameLeaderboardEntry {
                    win_rate: stats.win_rate(),
                    user_id: user.user_id,
                    username: user.username,
                    games: stats.games,
                    wins: stats.wins,
                    pie_won: stats.pie_won,
                    pie_bet: stats.pie_bet,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.pie_won.cmp(&a.pie_won));
        rows.truncate(limit);
        Ok(rows)
    }

    /// Activity on one UTC day
    pub fn daily_stats(&self, date: NaiveDate) -> Result<DailyStats> {
        let mut counts: BTreeMap<GameId, u64> = BTreeMap::new();
        let mut players = BTreeSet::new();
        let mut stats = DailyStats {
            date,
            total_games: 0,
            total_players: 0,
            total_pie_bet: 0,
            total_pie_won: 0,
            most_played_game: None,
        };

        let on_day = self
            .entries()?
            .into_iter()
            .filter(|e| e.played_at().map(|t| t.date_naive()) == Some(date));
        for entry in on_day {
            stats.total_games += 1;
            stats.total_pie_bet += entry.bet_amount;
            stats.total_pie_won += entry.winnings;
            *counts.entry(entry.game).or_default() += 1;
            players.insert(entry.user_id);
        }

        stats.total_players = players.len() as u64;
        // Ties go to the game listed first
        stats.most_played_game = GameId::ALL
            .into_iter()
            .filter_map(|g| counts.get(&g).map(|&n| (g, n)))
            .fold(None, |best: Option<(GameId, u64)>, (g, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((g, n)),
            })
            .map(|(g, _)| g);
        Ok(stats)
    }

    pub fn total_stats(&self) -> Result<TotalStats> {
        let entries = self.entries()?;
        let players: BTreeSet<&str> = entries.iter().map(|e| e.user_id.as_str()).collect();
        let wins = entries.iter().filter(|e| e.is_win).count();
        let total_games = entries.len() as u64;

        Ok(TotalStats {
            total_games,
            total_players: players.len() as u64,
            total_pie_bet: entries.iter().map(|e| e.bet_amount).sum(),
            total_pie_won: entries.iter().map(|e| e.winnings).sum(),
            average_win_rate: if total_games > 0 {
                (wins as f64 / total_games as f64) * 100.0
            } else {
                0.0
            },
        })
    }

    /// Drop every entry in a single store write
    pub fn clear(&self) -> Result<()> {
        let count = self.store.remove_prefix(PREFIX)?;
        log::info!("Cleared {count} history entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ManualClock;
    use crate::storage::MemoryStore;
    use chrono::{TimeDelta, TimeZone};
    use dagda_cauldron::Symbol::*;

    struct Fixture {
        clock: Arc<ManualClock>,
        history: GameHistory,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 17, 10, 0, 0).unwrap(),
        ));
        let history = GameHistory::with_clock(Arc::new(MemoryStore::new()), clock.clone());
        Fixture { clock, history }
    }

    fn player(id: &str) -> Player {
        Player {
            user_id: id.to_string(),
            username: format!("name-{id}"),
            bonus_tier: false,
        }
    }

    impl Fixture {
        fn play(&self, id: &str, game: GameId, bet: u64, winnings: u64) -> GameHistoryEntry {
            self.clock.advance(TimeDelta::seconds(1));
            self.history
                .record(PlayRecord::new(&player(id), game, bet, winnings))
                .unwrap()
        }
    }

    #[test]
    fn test_record_stamps_entry() {
        let f = fixture();
        let outcome = Outcome::new([Harp, Harp, Club]);
        let entry = f
            .history
            .record(
                PlayRecord::new(&player("a"), GameId::DagdasCauldron, 5, 10)
                    .with_symbols(outcome)
                    .with_net_change(4),
            )
            .unwrap();

        assert_eq!(entry.timestamp, f.clock.now().timestamp_millis());
        assert_eq!(entry.symbols, Some(outcome));
        assert_eq!(entry.net_change, 4);
        assert!(entry.is_win);
        assert_eq!(f.history.recent(10).unwrap(), vec![entry]);
    }

    #[test]
    fn test_newest_first() {
        let f = fixture();
        let first = f.play("a", GameId::DagdasCauldron, 5, 0);
        let second = f.play("b", GameId::Coinflip, 5, 10);
        let third = f.play("a", GameId::DagdasCauldron, 10, 20);

        assert_eq!(f.history.recent(2).unwrap(), vec![third.clone(), second]);
        assert_eq!(f.history.user_history("a", 10).unwrap(), vec![third, first]);
    }

    #[test]
    fn test_user_stats_and_streaks() {
        let f = fixture();
        f.play("a", GameId::DagdasCauldron, 5, 10);
        f.play("a", GameId::DagdasCauldron, 5, 25);
        f.play("a", GameId::Coinflip, 5, 0);
        let last = f.play("a", GameId::DagdasCauldron, 5, 6);

        let stats = f.history.user_stats("a").unwrap().unwrap();
        assert_eq!(stats.total_games, 4);
        assert_eq!(stats.total_wins, 3);
        assert_eq!(stats.total_pie_won, 41);
        assert_eq!(stats.total_pie_bet, 20);
        assert_eq!(stats.largest_win, 25);
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.last_played, last.timestamp);
        assert_eq!(stats.game_stats[&GameId::Coinflip].games, 1);
        assert_eq!(stats.game_stats[&GameId::DagdasCauldron].pie_won, 41);
        assert!((stats.win_rate() - 75.0).abs() < 1e-9);

        assert!(f.history.user_stats("nobody").unwrap().is_none());
    }

    #[test]
    fn test_leaderboards() {
        let f = fixture();
        f.play("a", GameId::DagdasCauldron, 5, 10);
        f.play("b", GameId::DagdasCauldron, 5, 25);
        f.play("b", GameId::DagdasCauldron, 5, 0);
        f.play("c", GameId::Coinflip, 5, 100);

        let board = f.history.leaderboard(2).unwrap();
        let ids: Vec<_> = board.iter().map(|s| s.user_id.as_str()).collect();
        assert_eq!(ids, ["c", "b"]);

        let cauldron = f.history.game_leaderboard(GameId::DagdasCauldron, 10).unwrap();
        assert_eq!(cauldron.len(), 2);
        assert_eq!(cauldron[0].user_id, "b");
        assert!((cauldron[0].win_rate - 50.0).abs() < 1e-9);
        assert_eq!(cauldron[1].pie_won, 10);
    }

    #[test]
    fn test_daily_and_total_stats() {
        let f = fixture();
        f.play("a", GameId::DagdasCauldron, 5, 10);
        f.play("b", GameId::Coinflip, 5, 0);
        f.play("b", GameId::Coinflip, 5, 10);
        f.clock.advance(TimeDelta::days(1));
        f.play("a", GameId::DagdasCauldron, 10, 0);

        let day = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
        let stats = f.history.daily_stats(day).unwrap();
        assert_eq!(stats.total_games, 3);
        assert_eq!(stats.total_players, 2);
        assert_eq!(stats.total_pie_bet, 15);
        assert_eq!(stats.total_pie_won, 20);
        assert_eq!(stats.most_played_game, Some(GameId::Coinflip));

        let empty = f.history.daily_stats(day.pred_opt().unwrap()).unwrap();
        assert_eq!(empty.total_games, 0);
        assert_eq!(empty.most_played_game, None);

        let totals = f.history.total_stats().unwrap();
        assert_eq!(totals.total_games, 4);
        assert_eq!(totals.total_players, 2);
        assert_eq!(totals.total_pie_bet, 25);
        assert!((totals.average_win_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_clear() {
        let f = fixture();
        f.play("a", GameId::Randomizer, 5, 10);
        f.history.clear().unwrap();
        assert!(f.history.recent(10).unwrap().is_empty());
        assert_eq!(f.history.total_stats().unwrap().total_games, 0);
    }

    #[test]
    fn test_clear_on_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let store = Arc::new(crate::storage::JsonFileStore::open(&path).unwrap());
        store.put("balance/a", "{}").unwrap();
        let history = GameHistory::new(store);
        for winnings in [0, 10, 0] {
            history
                .record(PlayRecord::new(&player("a"), GameId::Coinflip, 5, winnings))
                .unwrap();
        }

        history.clear().unwrap();
        let reopened = crate::storage::JsonFileStore::open(&path).unwrap();
        assert!(reopened.scan(PREFIX).unwrap().is_empty());
        assert!(reopened.get("balance/a").unwrap().is_some());
    }

    #[test]
    fn test_result_label_is_stored() {
        let f = fixture();
        let entry = f
            .history
            .record(PlayRecord::new(&player("a"), GameId::Coinflip, 5, 10).with_result("heads"))
            .unwrap();
        assert_eq!(entry.result.as_deref(), Some("heads"));
        assert_eq!(entry.symbols, None);
        assert_eq!(f.history.user_history("a", 1).unwrap()[0].result.as_deref(), Some("heads"));
    }

    #[test]
    fn test_game_id_names() {
        for game in GameId::ALL {
            assert_eq!(game.as_str().parse::<GameId>(), Ok(game));
            assert_eq!(serde_json::to_string(&game).unwrap(), format!("\"{game}\""));
        }
        assert!("poker".parse::<GameId>().is_err());
    }
}
