//! PIE balances

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::identity::Player;
use crate::storage::{KeyValueStore, load_json, save_json, scan_json};
use crate::{LedgerConfig, LedgerError, Result};

const PREFIX: &str = "balance/";

/// Stored balance of one player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: String,
    pub username: String,
    pub balance: u64,
    #[serde(default)]
    pub bonus_granted: bool,
}

/// Balance store over a key-value backend
pub struct BalanceStore {
    store: Arc<dyn KeyValueStore>,
    starting_grant: u64,
    bonus_grant: u64,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl BalanceStore {
    pub fn new(store: Arc<dyn KeyValueStore>, config: &LedgerConfig) -> Self {
        Self {
            store,
            starting_grant: config.starting_grant,
            bonus_grant: config.bonus_grant,
            write_lock: Mutex::new(()),
        }
    }

    fn key(user_id: &str) -> String {
        format!("{PREFIX}{user_id}")
    }

    fn load_or_init(&self, user_id: &str, username: &str) -> Result<UserBalance> {
        let key = Self::key(user_id);
        if let Some(record) = load_json::<UserBalance>(self.store.as_ref(), &key)? {
            return Ok(record);
        }

        let record = UserBalance {
            user_id: user_id.to_string(),
            username: username.to_string(),
            balance: self.starting_grant,
            bonus_granted: false,
        };
        save_json(self.store.as_ref(), &key, &record)?;
        log::info!("New player {username} ({user_id}) granted {} PIE", self.starting_grant);
        Ok(record)
    }

    /// Current balance; unknown players start at the starting grant
    pub fn get_balance(&self, user_id: &str, username: &str) -> Result<u64> {
        let _guard = self.write_lock.lock();
        Ok(self.load_or_init(user_id, username)?.balance)
    }

    /// Apply a signed change; a result below zero is rejected untouched
    pub fn update_balance(&self, user_id: &str, username: &str, delta: i64) -> Result<u64> {
        let _guard = self.write_lock.lock();
        let mut record = self.load_or_init(user_id, username)?;

        let next = match record.balance.checked_add_signed(delta) {
            Some(next) => next,
            None if delta < 0 => {
                return Err(LedgerError::InsufficientBalance {
                    balance: record.balance,
                    delta,
                });
            }
            None => return Err(LedgerError::BalanceOverflow(user_id.to_string())),
        };

        record.balance = next;
        save_json(self.store.as_ref(), &Self::key(user_id), &record)?;
        log::debug!("Balance {user_id}: {delta:+} → {next}");
        Ok(next)
    }

    /// One-time bonus for bonus-tier players; `None` if not eligible or already paid
    pub fn apply_bonus_grant(&self, player: &Player) -> Result<Option<u64>> {
        if !player.bonus_tier {
            return Ok(None);
        }

        let _guard = self.write_lock.lock();
        let mut record = self.load_or_init(&player.user_id, &player.username)?;
        if record.bonus_granted {
            return Ok(None);
        }

        record.balance = record.balance.saturating_add(self.bonus_grant);
        record.bonus_granted = true;
        save_json(self.store.as_ref(), &Self::key(&player.user_id), &record)?;
        log::info!(
            "Bonus grant of {} PIE for {} ({})",
            self.bonus_grant,
            player.username,
            player.user_id
        );
        Ok(Some(record.balance))
    }

    /// Richest players first
    pub fn top_players(&self, limit: usize) -> Result<Vec<UserBalance>> {
        let mut players: Vec<UserBalance> = scan_json(self.store.as_ref(), PREFIX)?;
        players.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.user_id.cmp(&b.user_id)));
        players.truncate(limit);
        Ok(players)
    }
}
