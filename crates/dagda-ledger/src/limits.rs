//! Daily play limits, reset at UTC midnight

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::history::GameId;
use crate::storage::{KeyValueStore, load_json, save_json};
use crate::{LedgerConfig, Result};

const PREFIX: &str = "limits/";

// ============ Clock ============

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.write();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

/// Time left until the next UTC midnight
pub fn time_until_reset(now: DateTime<Utc>) -> TimeDelta {
    now.date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc() - now)
        .unwrap_or_else(TimeDelta::zero)
}

/// `"{h}h {m}m"`, both truncated
pub fn format_resets_in(delta: TimeDelta) -> String {
    let minutes = delta.num_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

// ============ Records ============

/// Plays counted for one game since `last_reset`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCounter {
    pub count: u32,
    pub last_reset: DateTime<Utc>,
}

/// Stored counters of one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLimit {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub games: BTreeMap<GameId, PlayCounter>,
}

/// Answer to a limit query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitCheck {
    pub can_play: bool,
    pub remaining_plays: u32,
    pub resets_in: String,
}

// ============ Store ============

/// Per-user, per-game daily counters
pub struct LimitStore {
    store: Arc<dyn KeyValueStore>,
    config: LedgerConfig,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl LimitStore {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &LedgerConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        config: &LedgerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config: config.clone(),
            clock,
            write_lock: Mutex::new(()),
        }
    }

    fn key(user_id: &str) -> String {
        format!("{PREFIX}{user_id}")
    }

    /// Plays already used today; a counter from an earlier UTC day counts as zero
    fn used_today(counter: Option<&PlayCounter>, now: DateTime<Utc>) -> u32 {
        match counter {
            Some(c) if c.last_reset.date_naive() >= now.date_naive() => c.count,
            _ => 0,
        }
    }

    /// Read-only check
    pub fn check_limit(&self, user_id: &str, game: GameId, bonus_tier: bool) -> Result<LimitCheck> {
        let now = self.clock.now();
        let record: Option<GameLimit> = load_json(self.store.as_ref(), &Self::key(user_id))?;
        let used = Self::used_today(record.as_ref().and_then(|r| r.games.get(&game)), now);
        let remaining = self.config.daily_cap(game, bonus_tier).saturating_sub(used);

        Ok(LimitCheck {
            can_play: remaining > 0,
            remaining_plays: remaining,
            resets_in: format_resets_in(time_until_reset(now)),
        })
    }

    /// Count one play if the cap allows it
    pub fn check_and_update_limit(
        &self,
        user_id: &str,
        username: &str,
        game: GameId,
        bonus_tier: bool,
    ) -> Result<LimitCheck> {
        let _guard = self.write_lock.lock();
        let now = self.clock.now();
        let key = Self::key(user_id);

        let mut record = load_json::<GameLimit>(self.store.as_ref(), &key)?.unwrap_or_else(|| {
            GameLimit {
                user_id: user_id.to_string(),
                username: username.to_string(),
                games: BTreeMap::new(),
            }
        });

        let counter = record.games.entry(game).or_insert(PlayCounter {
            count: 0,
            last_reset: now,
        });
        if counter.last_reset.date_naive() < now.date_naive() {
            log::debug!("Daily counter for {user_id}/{game} rolled over");
            counter.count = 0;
            counter.last_reset = now;
        }

        let cap = self.config.daily_cap(game, bonus_tier);
        let can_play = counter.count < cap;
        if can_play {
            counter.count += 1;
        }
        let remaining = cap.saturating_sub(counter.count);

        if can_play {
            save_json(self.store.as_ref(), &key, &record)?;
        } else {
            log::info!("{username} ({user_id}) reached the daily {game} cap of {cap}");
        }

        Ok(LimitCheck {
            can_play,
            remaining_plays: remaining,
            resets_in: format_resets_in(time_until_reset(now)),
        })
    }
}
