use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Logical identity of a signal, stable across cycles.
///
/// Pair keys sort the two participant ids, so (A, B) and (B, A) collapse to
/// the same key. Titles never take part in a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertKey(String);

impl AlertKey {
    pub fn single(market_id: &str) -> Self {
        Self(market_id.to_string())
    }

    pub fn pair(id_a: &str, id_b: &str) -> Self {
        let (lo, hi) = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };
        Self(format!("{lo}|{hi}"))
    }
}

impl std::fmt::Display for AlertKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last-fired timestamps for one alert class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CooldownMap {
    fired: HashMap<AlertKey, DateTime<Utc>>,
}

impl CooldownMap {
    /// True when the key never fired or its cooldown has strictly elapsed.
    pub fn can_fire(&self, key: &AlertKey, cooldown: Duration, now: DateTime<Utc>) -> bool {
        match self.fired.get(key) {
            None => true,
            Some(&last) => now - last > cooldown,
        }
    }

    pub fn mark_fired(&mut self, key: AlertKey, now: DateTime<Utc>) {
        self.fired.insert(key, now);
    }

    #[cfg(test)]
    pub fn last_fired(&self, key: &AlertKey) -> Option<DateTime<Utc>> {
        self.fired.get(key).copied()
    }

    /// Housekeeping: forget keys whose cooldown has already elapsed.
    /// Returns how many were removed.
    pub fn sweep(&mut self, cooldown: Duration, now: DateTime<Utc>) -> usize {
        if self.is_empty() {
            return 0;
        }
        let before = self.fired.len();
        self.fired.retain(|_, last| now - *last <= cooldown);
        before - self.fired.len()
    }

    /// Keep only the `max_keys` most recently fired keys.
    pub fn cap(&mut self, max_keys: usize) {
        if self.len() <= max_keys {
            return;
        }
        let mut by_recency: Vec<(AlertKey, DateTime<Utc>)> = self.fired.drain().collect();
        by_recency.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        by_recency.truncate(max_keys);
        self.fired = by_recency.into_iter().collect();
    }

    pub fn len(&self) -> usize {
        self.fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }
}
