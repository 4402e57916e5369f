//! Nudge reward policy

use serde::{Deserialize, Serialize};

use crate::paytable::{GameResult, Outcome};

/// Result of one nudge request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NudgeOutcome {
    /// False when no session is active or the budget is spent
    pub success: bool,
    /// Reels after the nudge (unchanged on failure, `None` without a session)
    pub symbols: Option<Outcome>,
    /// Points the caller charges for this nudge
    pub cost: u64,
    /// Points the caller credits for this nudge
    pub additional_winnings: u64,
}

impl NudgeOutcome {
    pub fn rejected(symbols: Option<Outcome>) -> Self {
        Self {
            success: false,
            symbols,
            cost: 0,
            additional_winnings: 0,
        }
    }
}

/// Remaining nudges and the per-nudge price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NudgeInfo {
    pub remaining: u32,
    pub cost: u64,
}

/// Extra points earned by moving from `previous` to `current`
///
/// The full new amount is paid when the nudge produced a win whose symbol
/// or tier differs from the previous step (a fresh win counts as a tier
/// change). Keeping the same symbol at the same tier pays nothing: that win
/// was already paid. A losing result pays nothing and never claws back.
pub fn nudge_reward(previous: &GameResult, current: &GameResult) -> u64 {
    if !current.is_win {
        return 0;
    }

    let symbol_changed = previous.winning_symbol() != current.winning_symbol();
    let tier_changed = previous.win_type != current.win_type;

    if symbol_changed || tier_changed {
        current.amount
    } else {
        0
    }
}
