//! Ledger configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::history::GameId;

/// Grants and daily play caps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Balance credited to a player seen for the first time
    pub starting_grant: u64,
    /// One-time extra credit for players with a verified social profile
    pub bonus_grant: u64,
    /// Plays per game per UTC day
    pub daily_plays: u32,
    /// Plays per game per UTC day for bonus-tier players
    pub bonus_daily_plays: u32,
    /// Standard-tier cap overrides per game
    pub game_limits: BTreeMap<GameId, u32>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_grant: 50,
            bonus_grant: 10,
            daily_plays: 3,
            bonus_daily_plays: 5,
            game_limits: BTreeMap::new(),
        }
    }
}

impl LedgerConfig {
    /// Daily cap for a game
    ///
    /// A per-game override replaces `daily_plays`; bonus-tier players get the
    /// same extra plays on top of it as they get on the default cap.
    pub fn daily_cap(&self, game: GameId, bonus_tier: bool) -> u32 {
        let base = self
            .game_limits
            .get(&game)
            .copied()
            .unwrap_or(self.daily_plays);
        if bonus_tier {
            base + self.bonus_daily_plays.saturating_sub(self.daily_plays)
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_caps() {
        let config = LedgerConfig::default();
        assert_eq!(config.daily_cap(GameId::DagdasCauldron, false), 3);
        assert_eq!(config.daily_cap(GameId::DagdasCauldron, true), 5);
    }

    #[test]
    fn test_game_override() {
        let mut config = LedgerConfig::default();
        config.game_limits.insert(GameId::Coinflip, 10);
        assert_eq!(config.daily_cap(GameId::Coinflip, false), 10);
        assert_eq!(config.daily_cap(GameId::Coinflip, true), 12);
        assert_eq!(config.daily_cap(GameId::Randomizer, false), 3);
    }

    #[test]
    fn test_game_limits_serialize_by_name() {
        let mut config = LedgerConfig::default();
        config.game_limits.insert(GameId::EmeraldFlip, 4);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""emerald-flip":4"#));

        let parsed: LedgerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
