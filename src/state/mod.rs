pub mod cooldown;
pub mod history;

pub use cooldown::{AlertKey, CooldownMap};
pub use history::PriceHistory;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::AlertClass;

/// Everything that must survive a restart.
///
/// Loaded once at startup, owned by the scanner, threaded through each cycle
/// by `&mut`, written back at cycle end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub price_history: PriceHistory,
    pub cooldowns_gap: CooldownMap,
    pub cooldowns_move: CooldownMap,
    pub cooldowns_correlation: CooldownMap,
    pub scan_count: u64,
    pub last_run: Option<DateTime<Utc>>,
}

impl PersistedState {
    #[cfg(test)]
    pub fn cooldowns(&self, class: AlertClass) -> &CooldownMap {
        match class {
            AlertClass::Gap => &self.cooldowns_gap,
            AlertClass::Move => &self.cooldowns_move,
            AlertClass::Correlation => &self.cooldowns_correlation,
        }
    }

    pub fn cooldowns_mut(&mut self, class: AlertClass) -> &mut CooldownMap {
        match class {
            AlertClass::Gap => &mut self.cooldowns_gap,
            AlertClass::Move => &mut self.cooldowns_move,
            AlertClass::Correlation => &mut self.cooldowns_correlation,
        }
    }

    /// Apply retention and growth caps ahead of a write.
    pub fn compact(&mut self, now: DateTime<Utc>, limits: &RetentionLimits) {
        self.price_history
            .trim(now, limits.history_window, limits.history_max_points);
        for class in [AlertClass::Gap, AlertClass::Move, AlertClass::Correlation] {
            self.cooldowns_mut(class).cap(limits.max_cooldown_keys);
        }
    }
}

/// Bounds applied when the state is loaded and saved.
#[derive(Debug, Clone)]
pub struct RetentionLimits {
    pub history_window: Duration,
    pub history_max_points: usize,
    pub max_cooldown_keys: usize,
}

impl Default for RetentionLimits {
    fn default() -> Self {
        use crate::config::retention_defaults::*;
        Self {
            history_window: Duration::hours(HISTORY_WINDOW_HOURS),
            history_max_points: HISTORY_MAX_POINTS,
            max_cooldown_keys: MAX_COOLDOWN_KEYS,
        }
    }
}
